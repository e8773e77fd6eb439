//! Error taxonomy for launch, readiness, and teardown failures.

use std::path::PathBuf;

pub type Result<T, E = LaunchError> = std::result::Result<T, E>;

/// How bad a failure is from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	/// Retrying the launch (possibly with adjusted options) may succeed.
	Recoverable,
	/// The environment or configuration must change first.
	Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
	#[error("no Brave/Chromium installation found")]
	BrowserNotFound,

	#[error("browser path does not exist: {path}")]
	InvalidBrowserPath { path: PathBuf },

	#[error("failed to spawn browser process: {source}")]
	LaunchFailed {
		#[source]
		source: std::io::Error,
	},

	#[error("browser never opened port {port} ({attempts} connection attempts)")]
	LaunchTimeout {
		port: u16,
		attempts: u32,
		stderr_tail: String,
	},

	#[error("could not allocate a free debugging port after {attempts} attempts")]
	PortAllocationFailed { attempts: u32 },

	#[error("no browser listening on port {port}")]
	NoBrowserAtPort { port: u16 },

	#[error("browser process exited during startup ({status})")]
	ProcessCrashed { status: String, stderr_tail: String },

	#[error("unsupported on this platform: {0}")]
	PlatformUnsupported(String),

	#[error("virtual display failed to start: {reason}")]
	XvfbFailed { reason: String, required: bool },

	#[error("permission denied: {0}")]
	InsufficientPermissions(String),

	#[error("invalid launch configuration: {0}")]
	InvalidConfig(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl LaunchError {
	pub fn severity(&self) -> Severity {
		match self {
			LaunchError::LaunchFailed { .. }
			| LaunchError::LaunchTimeout { .. }
			| LaunchError::PortAllocationFailed { .. }
			| LaunchError::NoBrowserAtPort { .. }
			| LaunchError::ProcessCrashed { .. }
			| LaunchError::Io(_) => Severity::Recoverable,
			LaunchError::XvfbFailed { required, .. } => {
				if *required {
					Severity::Fatal
				} else {
					Severity::Recoverable
				}
			}
			LaunchError::BrowserNotFound
			| LaunchError::InvalidBrowserPath { .. }
			| LaunchError::PlatformUnsupported(_)
			| LaunchError::InsufficientPermissions(_)
			| LaunchError::InvalidConfig(_) => Severity::Fatal,
		}
	}

	pub fn is_recoverable(&self) -> bool {
		self.severity() == Severity::Recoverable
	}

	/// Machine-readable category, stable across releases.
	pub fn category(&self) -> &'static str {
		match self {
			LaunchError::BrowserNotFound => "BROWSER_NOT_FOUND",
			LaunchError::InvalidBrowserPath { .. } => "INVALID_BROWSER_PATH",
			LaunchError::LaunchFailed { .. } => "LAUNCH_FAILED",
			LaunchError::LaunchTimeout { .. } => "LAUNCH_TIMEOUT",
			LaunchError::PortAllocationFailed { .. } => "PORT_ALLOCATION_FAILED",
			LaunchError::NoBrowserAtPort { .. } => "PORT_NO_BROWSER",
			LaunchError::ProcessCrashed { .. } => "PROCESS_CRASHED",
			LaunchError::PlatformUnsupported(_) => "PLATFORM_UNSUPPORTED",
			LaunchError::XvfbFailed { .. } => "XVFB_FAILED",
			LaunchError::InsufficientPermissions(_) => "INSUFFICIENT_PERMISSIONS",
			LaunchError::InvalidConfig(_) => "INVALID_CONFIG",
			LaunchError::Io(_) => "IO",
		}
	}

	/// Suggested next step for a human reading the error.
	pub fn remediation(&self) -> &'static str {
		match self {
			LaunchError::BrowserNotFound => {
				"install Brave or Chromium, or point BRAVE_PATH at an existing binary"
			}
			LaunchError::InvalidBrowserPath { .. } => "check the configured browser path",
			LaunchError::LaunchFailed { .. } => "retry the launch; check the binary is executable",
			LaunchError::LaunchTimeout { .. } => {
				"retry with a longer poll interval or higher retry count; inspect the stderr tail"
			}
			LaunchError::PortAllocationFailed { .. } => "retry; the ephemeral port range may be exhausted",
			LaunchError::NoBrowserAtPort { .. } => {
				"start a browser with --remote-debugging-port on that port, or disable strict port mode"
			}
			LaunchError::ProcessCrashed { .. } => "relaunch; inspect the stderr tail for the crash reason",
			LaunchError::PlatformUnsupported(_) => "run on Linux, macOS, or Windows",
			LaunchError::XvfbFailed { required, .. } => {
				if *required {
					"install Xvfb or disable the virtual display requirement"
				} else {
					"retry; the launch degraded to a plain headless run"
				}
			}
			LaunchError::InsufficientPermissions(_) => "fix filesystem/process permissions and retry",
			LaunchError::InvalidConfig(_) => "fix the launch options; nothing was started",
			LaunchError::Io(_) => "retry; transient filesystem or network error",
		}
	}

	/// Human-readable rendering: category, severity, message, remediation.
	pub fn explain(&self) -> String {
		let severity = match self.severity() {
			Severity::Recoverable => "recoverable",
			Severity::Fatal => "fatal",
		};
		format!("[{} {severity}] {self}. {}", self.category(), self.remediation())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strict_port_failure_is_recoverable() {
		let err = LaunchError::NoBrowserAtPort { port: 9999 };
		assert!(err.is_recoverable());
		assert!(err.category().starts_with("PORT_"));
		assert!(err.to_string().contains("9999"));
	}

	#[test]
	fn missing_browser_is_fatal() {
		assert_eq!(LaunchError::BrowserNotFound.severity(), Severity::Fatal);
	}

	#[test]
	fn required_display_failure_is_fatal_auto_detected_is_not() {
		let required = LaunchError::XvfbFailed {
			reason: "spawn".into(),
			required: true,
		};
		let degraded = LaunchError::XvfbFailed {
			reason: "spawn".into(),
			required: false,
		};
		assert!(!required.is_recoverable());
		assert!(degraded.is_recoverable());
	}

	#[test]
	fn explain_includes_category_severity_and_remediation() {
		let err = LaunchError::InvalidConfig("port and pipe transport both requested".into());
		let rendered = err.explain();
		assert!(rendered.contains("INVALID_CONFIG"));
		assert!(rendered.contains("fatal"));
		assert!(rendered.contains("nothing was started"));
	}
}
