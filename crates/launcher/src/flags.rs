//! Default flag list and final argument composition.

use std::path::Path;

use crate::config::LaunchOptions;

/// Flags applied to every launch unless `ignore_default_flags` is set.
///
/// Mostly noise reduction: no first-run dialogs, no background networking,
/// no component updates fighting the test run.
pub const DEFAULT_FLAGS: &[&str] = &[
	"--disable-features=Translate,OptimizationHints,MediaRouter",
	"--disable-extensions",
	"--disable-component-extensions-with-background-pages",
	"--disable-background-networking",
	"--disable-component-update",
	"--disable-client-side-phishing-detection",
	"--disable-sync",
	"--metrics-recording-only",
	"--disable-default-apps",
	"--mute-audio",
	"--no-default-browser-check",
	"--no-first-run",
	"--disable-backgrounding-occluded-windows",
	"--disable-renderer-backgrounding",
	"--disable-background-timer-throttling",
	"--disable-ipc-flooding-protection",
	"--password-store=basic",
	"--use-mock-keychain",
];

/// The built-in defaults, in application order.
pub fn default_flags() -> &'static [&'static str] {
	DEFAULT_FLAGS
}

/// Composes the final argument list for the spawn.
///
/// Order: defaults (unless suppressed), platform flags, debugging channel,
/// profile flag, headless flags, caller flags, starting URL last.
pub(crate) fn build_args(
	opts: &LaunchOptions,
	profile_dir: Option<&Path>,
	port: u16,
	headless: bool,
	pipe: bool,
) -> Vec<String> {
	let mut args: Vec<String> = Vec::new();

	if !opts.ignore_default_flags {
		args.extend(DEFAULT_FLAGS.iter().map(|f| f.to_string()));
		if cfg!(target_os = "linux") {
			args.push("--disable-setuid-sandbox".to_string());
		}
	}

	// The pipe flag itself arrives via the caller flags; only the TCP
	// channel needs an argument from us.
	if !pipe {
		args.push(format!("--remote-debugging-port={port}"));
	}

	if let Some(dir) = profile_dir {
		args.push(format!("--user-data-dir={}", dir.display()));
	}

	if headless {
		args.push("--headless=new".to_string());
		args.push("--disable-gpu".to_string());
	}

	args.extend(opts.browser_flags.iter().cloned());
	args.push(opts.starting_url.clone());
	args
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;
	use crate::config::PIPE_TRANSPORT_FLAG;

	#[test]
	fn suppressed_defaults_keep_only_caller_flags_and_url() {
		let opts = LaunchOptions {
			ignore_default_flags: true,
			browser_flags: vec!["--a".to_string()],
			..Default::default()
		};
		let args = build_args(&opts, None, 9222, false, false);
		assert!(args.contains(&"--a".to_string()));
		assert_eq!(args.last().unwrap(), "about:blank");
		for flag in DEFAULT_FLAGS {
			assert!(!args.contains(&flag.to_string()), "unexpected default flag {flag}");
		}
	}

	#[test]
	fn url_is_the_final_positional_argument() {
		let opts = LaunchOptions {
			starting_url: "https://example.com".to_string(),
			browser_flags: vec!["--a".to_string(), "--b".to_string()],
			..Default::default()
		};
		let args = build_args(&opts, None, 9222, false, false);
		assert_eq!(args.last().unwrap(), "https://example.com");
	}

	#[test]
	fn tcp_channel_includes_port_flag() {
		let opts = LaunchOptions::default();
		let args = build_args(&opts, None, 4567, false, false);
		assert!(args.contains(&"--remote-debugging-port=4567".to_string()));
	}

	#[test]
	fn pipe_transport_omits_port_flag() {
		let opts = LaunchOptions {
			browser_flags: vec![PIPE_TRANSPORT_FLAG.to_string()],
			..Default::default()
		};
		let args = build_args(&opts, None, 0, false, true);
		assert!(!args.iter().any(|a| a.starts_with("--remote-debugging-port")));
		assert!(args.contains(&PIPE_TRANSPORT_FLAG.to_string()));
	}

	#[test]
	fn profile_flag_points_at_the_profile_dir() {
		let opts = LaunchOptions::default();
		let dir = PathBuf::from("/tmp/brv-profile-x");
		let args = build_args(&opts, Some(&dir), 9222, false, false);
		assert!(args.contains(&"--user-data-dir=/tmp/brv-profile-x".to_string()));
	}

	#[test]
	fn headless_adds_headless_flags() {
		let opts = LaunchOptions::default();
		let args = build_args(&opts, None, 9222, true, false);
		assert!(args.contains(&"--headless=new".to_string()));
	}
}
