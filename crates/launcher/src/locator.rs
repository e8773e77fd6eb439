//! Browser installation discovery.
//!
//! Produces a priority-ordered candidate list per platform: stable before
//! beta before nightly, system-wide locations before user-local ones, ties
//! broken by list order. Absolute candidates are checked on disk, bare
//! command names through `PATH` lookup.

use std::path::{Path, PathBuf};

use crate::config::BROWSER_PATH_ENV;

/// All installations found on this machine, highest priority first.
pub fn get_installations() -> Vec<PathBuf> {
	let mut found = Vec::new();

	if let Ok(explicit) = std::env::var(BROWSER_PATH_ENV) {
		let path = PathBuf::from(explicit);
		if path.exists() {
			found.push(path);
		}
	}

	for candidate in platform_candidates() {
		let resolved = if candidate.is_absolute() {
			candidate.exists().then_some(candidate)
		} else {
			which::which(&candidate).ok()
		};
		if let Some(path) = resolved {
			if !found.contains(&path) {
				found.push(path);
			}
		}
	}

	found
}

/// Highest-priority installation, if any.
pub fn get_first_installation() -> Option<PathBuf> {
	get_installations().into_iter().next()
}

fn platform_candidates() -> Vec<PathBuf> {
	if cfg!(target_os = "macos") {
		macos_candidates()
	} else if cfg!(target_os = "windows") {
		windows_candidates()
	} else {
		linux_candidates()
	}
}

fn linux_candidates() -> Vec<PathBuf> {
	let mut candidates: Vec<PathBuf> = [
		// Stable, system-wide.
		"/usr/bin/brave-browser",
		"/usr/bin/brave",
		"/opt/brave.com/brave/brave-browser",
		"/snap/bin/brave",
		// Beta, then nightly.
		"/usr/bin/brave-browser-beta",
		"/usr/bin/brave-browser-nightly",
		// Chromium-family fallbacks.
		"/usr/bin/google-chrome-stable",
		"/usr/bin/google-chrome",
		"/usr/bin/chromium-browser",
		"/usr/bin/chromium",
		"/snap/bin/chromium",
	]
	.into_iter()
	.map(PathBuf::from)
	.collect();

	if let Some(home) = dirs::home_dir() {
		candidates.push(home.join(".local/bin/brave-browser"));
		candidates.push(home.join(".local/bin/brave"));
	}

	// PATH lookups last within each family.
	for name in [
		"brave-browser",
		"brave",
		"brave-browser-beta",
		"brave-browser-nightly",
		"google-chrome-stable",
		"google-chrome",
		"chromium-browser",
		"chromium",
	] {
		candidates.push(PathBuf::from(name));
	}

	candidates
}

fn macos_candidates() -> Vec<PathBuf> {
	let bundles = [
		("Brave Browser.app", "Brave Browser"),
		("Brave Browser Beta.app", "Brave Browser Beta"),
		("Brave Browser Nightly.app", "Brave Browser Nightly"),
		("Google Chrome.app", "Google Chrome"),
		("Chromium.app", "Chromium"),
	];

	let mut candidates = Vec::new();
	// System-wide /Applications first, then the user's.
	for root in [Some(PathBuf::from("/Applications")), dirs::home_dir().map(|h| h.join("Applications"))]
		.into_iter()
		.flatten()
	{
		for (bundle, binary) in bundles {
			candidates.push(root.join(bundle).join("Contents/MacOS").join(binary));
		}
	}
	candidates
}

fn windows_candidates() -> Vec<PathBuf> {
	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["BraveSoftware", "Brave-Browser", "Application", "brave.exe"],
		&["BraveSoftware", "Brave-Browser-Beta", "Application", "brave.exe"],
		&["BraveSoftware", "Brave-Browser-Nightly", "Application", "brave.exe"],
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates = Vec::new();
	for root in &roots {
		for suffix in suffixes {
			let mut path = root.clone();
			for component in *suffix {
				path.push(component);
			}
			candidates.push(path);
		}
	}

	for name in ["brave", "brave.exe", "chrome", "chrome.exe", "chromium", "chromium.exe"] {
		candidates.push(PathBuf::from(name));
	}

	candidates
}

/// True when `path` looks like something we can hand to `Command::new`.
pub(crate) fn is_plausible_binary(path: &Path) -> bool {
	path.exists() && path.is_file()
}
