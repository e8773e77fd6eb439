//! Brave/Chromium launch orchestration.
//!
//! Finds a browser binary, prepares a disposable profile, spawns the
//! process detached with a remote-debugging channel (TCP port or pipe
//! fds), polls the endpoint until it is reachable, and hands back a
//! [`LaunchedBrowser`] whose `kill()` tears everything down again.
//!
//! ```no_run
//! use brv_launcher::{LaunchOptions, launch};
//!
//! # async fn run() -> Result<(), brv_launcher::LaunchError> {
//! let browser = launch(LaunchOptions::default()).await?;
//! println!("debugging on 127.0.0.1:{}", browser.port());
//! browser.kill().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod flags;
pub mod launch;
pub mod locator;
pub mod port;
pub mod probe;
pub mod process;
pub mod profile;
pub mod registry;
pub mod transport;

pub use config::{LaunchMode, LaunchOptions, XvfbMode, XvfbOptions};
pub use error::{LaunchError, Result, Severity};
pub use flags::default_flags;
pub use launch::{LaunchedBrowser, Phase, launch};
pub use locator::{get_first_installation, get_installations};
pub use process::pid_is_alive;
pub use registry::{SIGNAL_EXIT_CODE, kill_all};
pub use transport::PipeTransport;
