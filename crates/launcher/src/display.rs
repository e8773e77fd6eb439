//! Virtual display support for GUI launches on display-less hosts.
//!
//! The orchestrator only knows the `DisplayServer` seam; the default
//! implementation spawns an Xvfb child and waits for its X11 socket.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::XvfbOptions;
use crate::error::{LaunchError, Result};

/// Start/stop seam for the virtual display. `display()` yields the value
/// to put in the child's `DISPLAY` environment variable.
pub trait DisplayServer: Send {
	fn start(&mut self) -> Result<()>;
	fn stop(&mut self) -> Result<()>;
	fn display(&self) -> Option<String>;
}

const SOCKET_POLL_ATTEMPTS: u32 = 50;
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DISPLAY_SCAN_START: u32 = 99;
const DISPLAY_SCAN_END: u32 = 199;

/// Xvfb-backed display server.
pub struct Xvfb {
	options: XvfbOptions,
	child: Option<Child>,
	display_num: Option<u32>,
}

impl Xvfb {
	pub fn new(options: XvfbOptions) -> Self {
		Self {
			options,
			child: None,
			display_num: None,
		}
	}

	fn pick_display(&self) -> Result<u32> {
		if let Some(num) = self.options.display {
			return Ok(num);
		}
		for num in DISPLAY_SCAN_START..DISPLAY_SCAN_END {
			if !PathBuf::from(format!("/tmp/.X{num}-lock")).exists() {
				return Ok(num);
			}
		}
		Err(LaunchError::XvfbFailed {
			reason: "no free X display number found".into(),
			required: false,
		})
	}
}

impl DisplayServer for Xvfb {
	fn start(&mut self) -> Result<()> {
		if self.child.is_some() {
			return Ok(());
		}

		let num = self.pick_display()?;
		let mut child = Command::new("Xvfb")
			.arg(format!(":{num}"))
			.args(["-screen", "0", &self.options.screen])
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|e| LaunchError::XvfbFailed {
				reason: format!("could not spawn Xvfb: {e}"),
				required: false,
			})?;

		// Ready once the X11 socket exists; bail early if Xvfb dies first.
		let socket = PathBuf::from(format!("/tmp/.X11-unix/X{num}"));
		for _ in 0..SOCKET_POLL_ATTEMPTS {
			if socket.exists() {
				debug!(target = "brv", display = num, "Xvfb ready");
				self.child = Some(child);
				self.display_num = Some(num);
				return Ok(());
			}
			if let Ok(Some(status)) = child.try_wait() {
				return Err(LaunchError::XvfbFailed {
					reason: format!("Xvfb exited during startup ({status})"),
					required: false,
				});
			}
			std::thread::sleep(SOCKET_POLL_INTERVAL);
		}

		let _ = child.kill();
		let _ = child.wait();
		Err(LaunchError::XvfbFailed {
			reason: format!("Xvfb socket {} never appeared", socket.display()),
			required: false,
		})
	}

	fn stop(&mut self) -> Result<()> {
		if let Some(mut child) = self.child.take() {
			if let Err(err) = child.kill() {
				warn!(target = "brv", error = %err, "Xvfb kill failed");
			}
			let _ = child.wait();
			debug!(target = "brv", display = ?self.display_num, "Xvfb stopped");
		}
		self.display_num = None;
		Ok(())
	}

	fn display(&self) -> Option<String> {
		self.display_num.map(|num| format!(":{num}"))
	}
}

impl Drop for Xvfb {
	fn drop(&mut self) {
		let _ = self.stop();
	}
}
