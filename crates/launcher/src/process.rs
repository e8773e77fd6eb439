//! Process spawn and termination.
//!
//! The browser is spawned detached into its own process group so teardown
//! can take the whole tree (renderers, gpu process) in one signal. The
//! platform-specific kill strategy sits behind `ProcessTerminator`, picked
//! once at startup rather than branched at each call site.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::config::LaunchOptions;
use crate::error::{LaunchError, Result};
use crate::profile::Profile;
use crate::transport::PipeTransport;

/// A freshly spawned browser process plus its optional pipe transport.
pub(crate) struct SpawnedBrowser {
	pub child: Child,
	pub transport: Option<PipeTransport>,
}

/// Spawns the browser detached, stdio redirected into the profile's log
/// files, with the caller's environment overrides applied. When `pipe` is
/// set, the debugging pipes are wired onto child fds 3/4.
pub(crate) fn spawn_browser(
	binary: &Path,
	args: &[String],
	profile: &Profile,
	opts: &LaunchOptions,
	display: Option<&str>,
	pipe: bool,
) -> Result<SpawnedBrowser> {
	let (stdout_log, stderr_log) = profile.open_log_files()?;

	let mut cmd = Command::new(binary);
	cmd.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::from(stdout_log))
		.stderr(Stdio::from(stderr_log));

	for (key, value) in &opts.env {
		cmd.env(key, value);
	}
	if let Some(display) = display {
		cmd.env("DISPLAY", display);
	}

	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

	// Child pipe ends must outlive the spawn; the pre_exec dup2 reads them
	// by raw fd. Dropped right after, closing the parent's copies.
	let pipe_state = if pipe { Some(wire_pipe_transport(&mut cmd)?) } else { None };

	let child = match cmd.spawn() {
		Ok(child) => child,
		Err(source) if source.kind() == std::io::ErrorKind::PermissionDenied => {
			return Err(LaunchError::InsufficientPermissions(source.to_string()));
		}
		Err(source) => return Err(LaunchError::LaunchFailed { source }),
	};

	let transport = pipe_state.map(|(transport, child_ends)| {
		drop(child_ends);
		transport
	});

	debug!(target = "brv", pid = child.id(), binary = %binary.display(), "browser process spawned");
	Ok(SpawnedBrowser { child, transport })
}

#[cfg(unix)]
fn wire_pipe_transport(cmd: &mut Command) -> Result<(PipeTransport, crate::transport::ChildPipeEnds)> {
	use std::os::fd::AsRawFd;
	use std::os::unix::process::CommandExt;

	let (transport, child_ends) = crate::transport::create()?;
	let read_fd = child_ends.read_fd.as_raw_fd();
	let write_fd = child_ends.write_fd.as_raw_fd();

	// dup2 clears CLOEXEC on the duplicates, so fds 3/4 survive the exec.
	unsafe {
		cmd.pre_exec(move || {
			if libc::dup2(read_fd, 3) == -1 || libc::dup2(write_fd, 4) == -1 {
				return Err(std::io::Error::last_os_error());
			}
			Ok(())
		});
	}

	Ok((transport, child_ends))
}

#[cfg(not(unix))]
fn wire_pipe_transport(_cmd: &mut Command) -> Result<(PipeTransport, ())> {
	Err(LaunchError::PlatformUnsupported(
		"pipe debugging transport is only available on Unix".into(),
	))
}

/// Platform-specific whole-tree termination.
pub(crate) trait ProcessTerminator: Send + Sync {
	/// Kills the process (group) rooted at `pid`. Tolerates the process
	/// being gone already.
	fn terminate(&self, pid: u32) -> Result<()>;
}

/// Unix: one signal to the negative PID takes the whole process group.
#[cfg(unix)]
struct GroupSignalTerminator;

#[cfg(unix)]
impl ProcessTerminator for GroupSignalTerminator {
	fn terminate(&self, pid: u32) -> Result<()> {
		use nix::sys::signal::{Signal, killpg};
		use nix::unistd::Pid;

		match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
			Ok(()) => {
				debug!(target = "brv", pid, "SIGKILL sent to process group");
				Ok(())
			}
			Err(nix::errno::Errno::ESRCH) => {
				debug!(target = "brv", pid, "process group already gone");
				Ok(())
			}
			Err(nix::errno::Errno::EPERM) => Err(LaunchError::InsufficientPermissions(format!(
				"not allowed to signal process group {pid}"
			))),
			Err(err) => Err(LaunchError::Io(std::io::Error::from(err))),
		}
	}
}

/// Windows: taskkill walks the tree for us.
#[cfg(windows)]
struct TaskkillTerminator;

#[cfg(windows)]
impl ProcessTerminator for TaskkillTerminator {
	fn terminate(&self, pid: u32) -> Result<()> {
		let status = Command::new("taskkill")
			.args(["/PID", &pid.to_string(), "/T", "/F"])
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.status()
			.map_err(LaunchError::Io)?;
		if !status.success() {
			// Non-zero usually means the process was already gone.
			debug!(target = "brv", pid, code = ?status.code(), "taskkill returned non-zero");
		}
		Ok(())
	}
}

/// The terminator for this platform, selected once.
pub(crate) fn platform_terminator() -> &'static dyn ProcessTerminator {
	#[cfg(unix)]
	{
		static TERMINATOR: GroupSignalTerminator = GroupSignalTerminator;
		&TERMINATOR
	}
	#[cfg(windows)]
	{
		static TERMINATOR: TaskkillTerminator = TaskkillTerminator;
		&TERMINATOR
	}
	#[cfg(not(any(unix, windows)))]
	{
		struct UnsupportedTerminator;
		impl ProcessTerminator for UnsupportedTerminator {
			fn terminate(&self, _pid: u32) -> Result<()> {
				Err(LaunchError::PlatformUnsupported("process termination".into()))
			}
		}
		static TERMINATOR: UnsupportedTerminator = UnsupportedTerminator;
		&TERMINATOR
	}
}

/// Kills the child's group and reaps the direct child.
pub(crate) fn kill_and_reap(child: &mut Child) {
	let pid = child.id();
	if let Err(err) = platform_terminator().terminate(pid) {
		warn!(target = "brv", pid, error = %err, "terminate failed, continuing teardown");
	}
	match child.wait() {
		Ok(status) => debug!(target = "brv", pid, %status, "browser process reaped"),
		Err(err) => warn!(target = "brv", pid, error = %err, "could not reap browser process"),
	}
}

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}
		use nix::sys::signal::kill;
		use nix::unistd::Pid;
		// Signal 0 checks existence without delivering anything.
		kill(Pid::from_raw(pid as i32), None).is_ok()
	}

	#[cfg(windows)]
	{
		let filter = format!("PID eq {pid}");
		if let Ok(output) = Command::new("tasklist").args(["/FI", &filter, "/FO", "CSV", "/NH"]).output() {
			if output.status.success() {
				let stdout = String::from_utf8_lossy(&output.stdout);
				return tasklist_has_pid(stdout.as_ref(), pid);
			}
		}
		pid == std::process::id()
	}

	#[cfg(not(any(unix, windows)))]
	{
		pid == std::process::id()
	}
}

#[cfg(any(test, windows))]
fn tasklist_has_pid(output: &str, pid: u32) -> bool {
	let pid_str = pid.to_string();
	output.lines().any(|line| {
		let line = line.trim();
		if !line.starts_with('"') {
			return false;
		}
		line.trim_matches('"')
			.split("\",\"")
			.nth(1)
			.is_some_and(|field| field.trim() == pid_str.as_str())
	})
}
