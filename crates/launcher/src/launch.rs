//! The launch orchestration state machine.
//!
//! One `launch()` call walks `Idle → Preparing → Spawning → AwaitingReady →
//! Ready`; `kill()` walks `Ready → Terminating → Terminated`. `Failed` is
//! absorbing from the middle states and always cleans up whatever partial
//! resources the attempt created.

use std::path::PathBuf;
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{FORCE_HEADLESS_ENV, LaunchMode, LaunchOptions, XvfbMode};
use crate::display::{DisplayServer, Xvfb};
use crate::error::{LaunchError, Result};
use crate::probe::{self, PollFailure};
use crate::profile::Profile;
use crate::transport::PipeTransport;
use crate::{flags, locator, port, process, registry};

const LOOPBACK: &str = "127.0.0.1";

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle phase of a managed browser instance.
///
/// `launch()` walks the early phases internally and only returns a handle
/// once the instance is `Ready` (a failure surfaces as an error, not as a
/// `Failed` handle), so [`LaunchedBrowser::state`] reports `Ready`,
/// `Terminating`, or `Terminated`. The full set exists for callers that
/// log or display lifecycle progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Preparing,
	Spawning,
	AwaitingReady,
	Ready,
	Terminating,
	Terminated,
	Failed,
}

/// Shared state behind a `LaunchedBrowser` handle. Teardown fields live in
/// mutexes so `kill()` works through a shared reference and stays
/// idempotent under concurrent callers.
pub(crate) struct Instance {
	pub(crate) id: u64,
	pid: u32,
	port: u16,
	state: Mutex<Phase>,
	child: Mutex<Option<Child>>,
	profile: Mutex<Option<Profile>>,
	display: Mutex<Option<Box<dyn DisplayServer>>>,
	transport: Mutex<Option<PipeTransport>>,
}

impl Instance {
	/// Tears the instance down: display first, then the process group,
	/// then the owned profile directory. Safe to call repeatedly; the
	/// second and later calls are no-ops.
	pub(crate) async fn kill(&self) -> Result<()> {
		{
			let mut state = self.state.lock();
			match *state {
				Phase::Terminating | Phase::Terminated => return Ok(()),
				_ => *state = Phase::Terminating,
			}
		}

		// Registry removal precedes the kill so a racing signal handler
		// never double-frees this instance.
		registry::global().remove(self.id);

		if let Some(mut display) = self.display.lock().take() {
			if let Err(err) = display.stop() {
				warn!(target = "brv", error = %err, "display teardown failed, continuing");
			}
		}

		if let Some(mut child) = self.child.lock().take() {
			process::kill_and_reap(&mut child);
		}
		self.transport.lock().take();

		let result = match self.profile.lock().take() {
			Some(profile) => profile.cleanup(),
			None => Ok(()),
		};

		*self.state.lock() = Phase::Terminated;
		info!(target = "brv", pid = self.pid, port = self.port, "browser instance terminated");
		result
	}
}

/// Live handle to a launched (or attached) browser.
pub struct LaunchedBrowser {
	inner: Arc<Instance>,
}

impl std::fmt::Debug for LaunchedBrowser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LaunchedBrowser")
			.field("id", &self.inner.id)
			.field("pid", &self.inner.pid)
			.field("port", &self.inner.port)
			.field("state", &*self.inner.state.lock())
			.finish_non_exhaustive()
	}
}

impl LaunchedBrowser {
	/// PID of the managed process, or of the pre-existing browser when the
	/// launch attached to a fixed port (0 when that PID is unknowable).
	pub fn pid(&self) -> u32 {
		self.inner.pid
	}

	/// Resolved debugging port. 0 only for the pipe transport.
	pub fn port(&self) -> u16 {
		self.inner.port
	}

	pub fn state(&self) -> Phase {
		*self.inner.state.lock()
	}

	/// True when this instance spawned (and therefore owns) the process.
	pub fn owns_process(&self) -> bool {
		self.inner.child.lock().is_some()
	}

	/// True when the owned process has exited on its own. Always `false`
	/// for attached instances and after teardown.
	pub fn process_exited(&self) -> bool {
		match self.inner.child.lock().as_mut() {
			Some(child) => matches!(child.try_wait(), Ok(Some(_))),
			None => false,
		}
	}

	/// Profile directory, while the instance is live.
	pub fn user_data_dir(&self) -> Option<PathBuf> {
		self.inner.profile.lock().as_ref().map(|p| p.dir().to_path_buf())
	}

	/// Takes the pipe transport handles. Present exactly once, and only
	/// when the launch used `--remote-debugging-pipe`.
	pub fn take_transport(&self) -> Option<PipeTransport> {
		self.inner.transport.lock().take()
	}

	/// Idempotent teardown. See [`Instance::kill`].
	pub async fn kill(&self) -> Result<()> {
		self.inner.kill().await
	}
}

/// Launches a browser (or attaches to one on a fixed port) per `opts`.
pub async fn launch(opts: LaunchOptions) -> Result<LaunchedBrowser> {
	// Idle -> Preparing: validation only, no side effects yet.
	opts.validate()?;
	debug!(target = "brv", url = %opts.starting_url, port = opts.port, "launch: preparing");

	// Display service comes up before anything else so a required-but-
	// broken Xvfb fails the launch with nothing to clean up.
	let mut display = prepare_display(&opts)?;

	// Fixed port: probe first. A live endpoint means "reuse existing
	// browser"; a dead one is fatal only in strict mode.
	if opts.port != 0 {
		match probe::try_connect(LOOPBACK, opts.port).await {
			Ok(()) => {
				info!(target = "brv", port = opts.port, "reusing browser already listening");
				return Ok(finish_attached(opts.port, display));
			}
			Err(err) => {
				if opts.port_strict {
					stop_display(&mut display);
					return Err(LaunchError::NoBrowserAtPort { port: opts.port });
				}
				debug!(target = "brv", port = opts.port, error = %err, "fixed port is free, launching");
			}
		}
	}

	match launch_new(&opts, &mut display).await {
		Ok(instance) => Ok(instance),
		Err(err) => {
			// Failed is absorbing: release whatever Preparing acquired.
			stop_display(&mut display);
			Err(err)
		}
	}
}

async fn launch_new(
	opts: &LaunchOptions,
	display: &mut Option<Box<dyn DisplayServer>>,
) -> Result<LaunchedBrowser> {
	// Preparing, continued: binary, then profile.
	let binary = resolve_binary(opts)?;
	let profile = Profile::prepare(opts.user_data_dir.as_deref(), &opts.prefs)?;

	// Preparing -> Spawning: resolve the channel and compose arguments.
	let pipe = opts.wants_pipe_transport();
	let port = if pipe {
		0
	} else if opts.port != 0 {
		opts.port
	} else {
		match port::allocate() {
			Ok(port) => port,
			Err(err) => {
				cleanup_profile_best_effort(&profile);
				return Err(err);
			}
		}
	};

	let display_handle = display.as_ref().and_then(|d| d.display());
	let headless = resolve_headless(opts, display_handle.as_deref());
	let args = flags::build_args(opts, Some(profile.dir()), port, headless, pipe);
	debug!(target = "brv", binary = %binary.display(), port, headless, pipe, "launch: spawning");

	let spawned = match process::spawn_browser(&binary, &args, &profile, opts, display_handle.as_deref(), pipe) {
		Ok(spawned) => spawned,
		Err(err) => {
			cleanup_profile_best_effort(&profile);
			return Err(err);
		}
	};
	let pid = spawned.child.id();
	profile.write_pid_file(pid);

	// Spawning -> AwaitingReady. The pipe transport has no endpoint to
	// poll; it is ready as soon as the process exists.
	let child = if pipe {
		spawned.child
	} else {
		match await_ready(spawned.child, port, opts, &profile).await {
			Ok(child) => child,
			Err(err) => return Err(err),
		}
	};

	// Ready.
	let instance = Arc::new(Instance {
		id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
		pid,
		port,
		state: Mutex::new(Phase::Ready),
		child: Mutex::new(Some(child)),
		profile: Mutex::new(Some(profile)),
		display: Mutex::new(display.take()),
		transport: Mutex::new(spawned.transport),
	});
	registry::global().add(Arc::clone(&instance));
	info!(target = "brv", pid, port, "browser ready");
	Ok(LaunchedBrowser { inner: instance })
}

/// AwaitingReady poll loop: connect attempts spaced by the poll interval,
/// aborted early when the child dies, bounded by the retry budget.
async fn await_ready(child: Child, port: u16, opts: &LaunchOptions, profile: &Profile) -> Result<Child> {
	let child_slot = Mutex::new(child);
	let slot = &child_slot;

	let outcome = probe::wait_with_retries(
		move || async move {
			if let Ok(Some(status)) = slot.lock().try_wait() {
				return Err(LaunchError::ProcessCrashed {
					status: status.to_string(),
					stderr_tail: String::new(),
				});
			}
			Ok(probe::try_connect(LOOPBACK, port).await.is_ok())
		},
		opts.connection_poll_interval,
		opts.max_connection_retries,
	)
	.await;

	let mut child = child_slot.into_inner();
	match outcome {
		Ok(attempts) => {
			debug!(target = "brv", port, attempts, "debugging endpoint reachable");
			Ok(child)
		}
		Err(failure) => {
			// Failed state: surface stderr for diagnosis, then release the
			// process and the profile this attempt created.
			let stderr_tail = profile.stderr_tail();
			process::kill_and_reap(&mut child);
			cleanup_profile_best_effort(profile);
			Err(match failure {
				PollFailure::BudgetExhausted { attempts } => LaunchError::LaunchTimeout {
					port,
					attempts,
					stderr_tail,
				},
				PollFailure::Aborted {
					error: LaunchError::ProcessCrashed { status, .. },
					..
				} => LaunchError::ProcessCrashed { status, stderr_tail },
				PollFailure::Aborted { error, .. } => error,
			})
		}
	}
}

/// Ready without a spawn: the caller's fixed port already had a browser.
/// The instance borrows that browser; `kill()` will not signal it.
fn finish_attached(port: u16, display: Option<Box<dyn DisplayServer>>) -> LaunchedBrowser {
	let pid = pid_listening_on(port).unwrap_or(0);
	let instance = Arc::new(Instance {
		id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
		pid,
		port,
		state: Mutex::new(Phase::Ready),
		child: Mutex::new(None),
		profile: Mutex::new(None),
		display: Mutex::new(display),
		transport: Mutex::new(None),
	});
	registry::global().add(Arc::clone(&instance));
	LaunchedBrowser { inner: instance }
}

fn resolve_binary(opts: &LaunchOptions) -> Result<PathBuf> {
	if let Some(path) = &opts.browser_path {
		if locator::is_plausible_binary(path) {
			return Ok(path.clone());
		}
		return Err(LaunchError::InvalidBrowserPath { path: path.clone() });
	}
	locator::get_first_installation().ok_or(LaunchError::BrowserNotFound)
}

fn prepare_display(opts: &LaunchOptions) -> Result<Option<Box<dyn DisplayServer>>> {
	match opts.xvfb {
		XvfbMode::Off => Ok(None),
		XvfbMode::Required => {
			if !cfg!(target_os = "linux") {
				return Err(LaunchError::XvfbFailed {
					reason: "virtual display is only supported on Linux".into(),
					required: true,
				});
			}
			let mut xvfb: Box<dyn DisplayServer> = Box::new(Xvfb::new(opts.xvfb_options.clone()));
			xvfb.start().map_err(|err| match err {
				LaunchError::XvfbFailed { reason, .. } => LaunchError::XvfbFailed { reason, required: true },
				other => other,
			})?;
			Ok(Some(xvfb))
		}
		XvfbMode::Auto => {
			let wants_gui = opts.mode != LaunchMode::Headless;
			let headless_host = cfg!(target_os = "linux") && std::env::var_os("DISPLAY").is_none();
			if !(wants_gui && headless_host) {
				return Ok(None);
			}
			let mut xvfb: Box<dyn DisplayServer> = Box::new(Xvfb::new(opts.xvfb_options.clone()));
			match xvfb.start() {
				Ok(()) => Ok(Some(xvfb)),
				Err(err) => {
					warn!(target = "brv", error = %err, "virtual display unavailable, degrading to headless");
					Ok(None)
				}
			}
		}
	}
}

fn stop_display(display: &mut Option<Box<dyn DisplayServer>>) {
	if let Some(mut server) = display.take() {
		if let Err(err) = server.stop() {
			warn!(target = "brv", error = %err, "display teardown failed");
		}
	}
}

fn cleanup_profile_best_effort(profile: &Profile) {
	if let Err(err) = profile.cleanup() {
		warn!(target = "brv", error = %err, "profile cleanup failed after launch failure");
	}
}

/// Effective headless decision for this launch.
fn resolve_headless(opts: &LaunchOptions, display_handle: Option<&str>) -> bool {
	match opts.mode {
		LaunchMode::Headless => true,
		LaunchMode::Gui => false,
		LaunchMode::Auto => {
			if std::env::var(FORCE_HEADLESS_ENV).is_ok_and(|v| !v.is_empty() && v != "0") {
				return true;
			}
			if display_handle.is_some() {
				return false;
			}
			cfg!(target_os = "linux") && std::env::var_os("DISPLAY").is_none()
		}
	}
}

/// Best-effort PID lookup for a browser someone else started on `port`.
#[cfg(unix)]
fn pid_listening_on(port: u16) -> Option<u32> {
	let output = std::process::Command::new("lsof")
		.args(["-ti", &format!(":{port}")])
		.output()
		.ok()?;
	if !output.status.success() || output.stdout.is_empty() {
		return None;
	}
	std::str::from_utf8(&output.stdout).ok()?.trim().lines().next()?.trim().parse().ok()
}

#[cfg(windows)]
fn pid_listening_on(port: u16) -> Option<u32> {
	let output = std::process::Command::new("netstat").args(["-ano"]).output().ok()?;
	let stdout = String::from_utf8_lossy(&output.stdout);
	let needle = format!(":{port}");
	for line in stdout.lines() {
		if line.contains(&needle) && line.contains("LISTENING") {
			if let Some(pid) = line.split_whitespace().last() {
				return pid.parse().ok();
			}
		}
	}
	None
}

#[cfg(not(any(unix, windows)))]
fn pid_listening_on(_port: u16) -> Option<u32> {
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_headless_mode_wins() {
		let opts = LaunchOptions {
			mode: LaunchMode::Headless,
			..Default::default()
		};
		assert!(resolve_headless(&opts, Some(":99")));
	}

	#[test]
	fn explicit_gui_mode_wins() {
		let opts = LaunchOptions {
			mode: LaunchMode::Gui,
			..Default::default()
		};
		assert!(!resolve_headless(&opts, None));
	}

	#[test]
	fn auto_mode_prefers_an_active_virtual_display() {
		let opts = LaunchOptions::default();
		assert!(!resolve_headless(&opts, Some(":99")));
	}

	#[test]
	fn missing_binary_path_is_reported_as_invalid() {
		let opts = LaunchOptions {
			browser_path: Some(PathBuf::from("/definitely/not/a/browser")),
			..Default::default()
		};
		assert!(matches!(
			resolve_binary(&opts),
			Err(LaunchError::InvalidBrowserPath { .. })
		));
	}
}
