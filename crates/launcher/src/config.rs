//! Launch options with explicit defaults and up-front validation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{LaunchError, Result};

/// Flag the caller passes to switch the debugging channel from a TCP port to
/// inherited pipe file descriptors.
pub const PIPE_TRANSPORT_FLAG: &str = "--remote-debugging-pipe";

/// Binary path override consumed from the environment.
pub const BROWSER_PATH_ENV: &str = "BRAVE_PATH";

/// Forces headless detection regardless of the display server state.
pub const FORCE_HEADLESS_ENV: &str = "BRV_FORCE_HEADLESS";

/// Whether the browser window is requested, suppressed, or auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
	/// Headless when no display server is reachable, GUI otherwise.
	#[default]
	Auto,
	Headless,
	Gui,
}

/// Virtual display policy for GUI launches on display-less hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XvfbMode {
	/// Never start a virtual display.
	#[default]
	Off,
	/// Start one when no display server is present; degrade to headless on failure.
	Auto,
	/// Start one unconditionally; failure aborts the launch.
	Required,
}

/// Screen geometry and display-number hint for the Xvfb child.
#[derive(Debug, Clone)]
pub struct XvfbOptions {
	/// `WxHxDEPTH` string passed to `-screen 0`.
	pub screen: String,
	/// Explicit display number; scanned from 99 upward when `None`.
	pub display: Option<u32>,
}

impl Default for XvfbOptions {
	fn default() -> Self {
		Self {
			screen: "1280x1024x24".to_string(),
			display: None,
		}
	}
}

/// Everything a launch needs, immutable once `launch()` starts.
///
/// Every field has a documented default; `LaunchOptions::default()` is the
/// single place defaults are applied.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// First page the browser opens. Default `about:blank`.
	pub starting_url: String,
	/// Caller flags, appended after the composed flag list.
	pub browser_flags: Vec<String>,
	/// Preference overrides merged into `Default/Preferences`.
	pub prefs: Map<String, Value>,
	/// Requested debugging port; `0` auto-allocates an ephemeral one.
	pub port: u16,
	/// With a fixed port: fail instead of launching when nothing listens there.
	pub port_strict: bool,
	/// Profile directory; `None` creates a disposable one owned by the launcher.
	pub user_data_dir: Option<PathBuf>,
	/// Explicit browser binary; discovery runs when `None`.
	pub browser_path: Option<PathBuf>,
	/// Suppress the built-in default flag list.
	pub ignore_default_flags: bool,
	/// Delay between readiness probes. Default 500 ms.
	pub connection_poll_interval: Duration,
	/// Retries after the initial probe. Default 50.
	pub max_connection_retries: u32,
	/// Extra environment variables for the child process.
	pub env: HashMap<String, String>,
	pub mode: LaunchMode,
	pub xvfb: XvfbMode,
	pub xvfb_options: XvfbOptions,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			starting_url: "about:blank".to_string(),
			browser_flags: Vec::new(),
			prefs: Map::new(),
			port: 0,
			port_strict: false,
			user_data_dir: None,
			browser_path: None,
			ignore_default_flags: false,
			connection_poll_interval: Duration::from_millis(500),
			max_connection_retries: 50,
			env: HashMap::new(),
			mode: LaunchMode::Auto,
			xvfb: XvfbMode::Off,
			xvfb_options: XvfbOptions::default(),
		}
	}
}

impl LaunchOptions {
	/// True when the caller opted into the fd-based debugging channel.
	pub fn wants_pipe_transport(&self) -> bool {
		self.browser_flags.iter().any(|f| f == PIPE_TRANSPORT_FLAG)
	}

	/// Rejects contradictory options before any resource is touched.
	pub fn validate(&self) -> Result<()> {
		if self.wants_pipe_transport() && self.port != 0 {
			return Err(LaunchError::InvalidConfig(
				"a fixed port and the pipe transport are mutually exclusive".into(),
			));
		}
		if self.port_strict && self.port == 0 {
			return Err(LaunchError::InvalidConfig(
				"strict port mode requires a fixed port".into(),
			));
		}
		if self.starting_url.is_empty() {
			return Err(LaunchError::InvalidConfig("starting URL must not be empty".into()));
		}
		if let Some(dir) = &self.user_data_dir {
			if dir.as_os_str().is_empty() {
				return Err(LaunchError::InvalidConfig("user data dir must not be empty".into()));
			}
		}
		Ok(())
	}
}
