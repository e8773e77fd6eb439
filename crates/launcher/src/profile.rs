//! Profile directory lifecycle: creation, preference merge, logs, cleanup.
//!
//! Layout inside the profile:
//!
//! ```text
//! <profile>/
//!   brave-out.log         child stdout
//!   brave-err.log         child stderr
//!   brave.pid             child PID as decimal text (best-effort)
//!   Default/Preferences   merged JSON preference overrides
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{LaunchError, Result};

pub const STDOUT_LOG: &str = "brave-out.log";
pub const STDERR_LOG: &str = "brave-err.log";
pub const PID_FILE: &str = "brave.pid";
const PREFERENCES_FILE: &str = "Default/Preferences";

const CLEANUP_ATTEMPTS: u32 = 5;
const CLEANUP_BACKOFF: Duration = Duration::from_millis(100);
const STDERR_TAIL_BYTES: u64 = 4096;

/// A materialized profile directory.
///
/// `owned` records whether this launcher generated the directory; only owned
/// profiles are deleted on teardown.
#[derive(Debug)]
pub struct Profile {
	dir: PathBuf,
	owned: bool,
}

impl Profile {
	/// Materializes the profile: the directory itself plus merged
	/// preference overrides. Preference failures are logged, not fatal.
	pub fn prepare(user_data_dir: Option<&Path>, prefs: &Map<String, Value>) -> Result<Self> {
		let (dir, owned) = match user_data_dir {
			Some(dir) => {
				fs::create_dir_all(dir).map_err(classify_fs_error)?;
				(dir.to_path_buf(), false)
			}
			None => {
				let dir = tempfile::Builder::new()
					.prefix("brv-profile-")
					.tempdir()
					.map_err(classify_fs_error)?
					.keep();
				(dir, true)
			}
		};

		let profile = Self { dir, owned };
		if !prefs.is_empty() {
			if let Err(err) = profile.merge_preferences(prefs) {
				warn!(target = "brv", error = %err, "failed to write preference overrides");
			}
		}
		Ok(profile)
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn owned(&self) -> bool {
		self.owned
	}

	/// Opens (truncating) the child's stdout/stderr log files.
	pub fn open_log_files(&self) -> Result<(File, File)> {
		let open = |name: &str| {
			OpenOptions::new()
				.create(true)
				.write(true)
				.truncate(true)
				.open(self.dir.join(name))
				.map_err(classify_fs_error)
		};
		Ok((open(STDOUT_LOG)?, open(STDERR_LOG)?))
	}

	/// Persists the child PID. Best-effort: failure is logged and ignored.
	pub fn write_pid_file(&self, pid: u32) {
		if let Err(err) = fs::write(self.dir.join(PID_FILE), format!("{pid}\n")) {
			warn!(target = "brv", pid, error = %err, "could not write pid file");
		}
	}

	/// Last few KB of the child's stderr log, for failure diagnostics.
	pub fn stderr_tail(&self) -> String {
		let path = self.dir.join(STDERR_LOG);
		let Ok(mut file) = File::open(&path) else {
			return String::new();
		};
		let len = file.metadata().map(|m| m.len()).unwrap_or(0);
		if len > STDERR_TAIL_BYTES {
			use std::io::Seek;
			let _ = file.seek(std::io::SeekFrom::End(-(STDERR_TAIL_BYTES as i64)));
		}
		let mut buf = String::new();
		let _ = file.read_to_string(&mut buf);
		buf
	}

	/// Merges `overrides` into `Default/Preferences`, keeping anything
	/// already present that the overrides do not touch.
	fn merge_preferences(&self, overrides: &Map<String, Value>) -> Result<()> {
		let path = self.dir.join(PREFERENCES_FILE);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}

		let mut existing = match fs::read_to_string(&path) {
			Ok(content) => match serde_json::from_str::<Value>(&content) {
				Ok(Value::Object(map)) => map,
				Ok(_) | Err(_) => {
					warn!(target = "brv", path = %path.display(), "existing preferences unreadable, overwriting");
					Map::new()
				}
			},
			Err(_) => Map::new(),
		};

		merge_into(&mut existing, overrides);
		fs::write(
			&path,
			serde_json::to_string_pretty(&Value::Object(existing)).map_err(std::io::Error::from)?,
		)?;
		debug!(target = "brv", path = %path.display(), "preference overrides written");
		Ok(())
	}

	/// Deletes the directory when owned, retrying transient filesystem
	/// errors a bounded number of times. Caller-supplied directories are
	/// left untouched.
	pub fn cleanup(&self) -> Result<()> {
		if !self.owned {
			debug!(target = "brv", dir = %self.dir.display(), "leaving caller-supplied profile in place");
			return Ok(());
		}

		let mut attempt = 0;
		loop {
			attempt += 1;
			match fs::remove_dir_all(&self.dir) {
				Ok(()) => {
					debug!(target = "brv", dir = %self.dir.display(), "profile removed");
					return Ok(());
				}
				Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
				Err(err) if attempt >= CLEANUP_ATTEMPTS => return Err(classify_fs_error(err)),
				Err(err) => {
					debug!(target = "brv", attempt, error = %err, "profile removal failed, retrying");
					std::thread::sleep(CLEANUP_BACKOFF);
				}
			}
		}
	}
}

/// Recursive JSON object merge; overrides win on scalar conflicts.
fn merge_into(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
	for (key, value) in overrides {
		match (base.get_mut(key), value) {
			(Some(Value::Object(existing)), Value::Object(incoming)) => merge_into(existing, incoming),
			_ => {
				base.insert(key.clone(), value.clone());
			}
		}
	}
}

fn classify_fs_error(err: std::io::Error) -> LaunchError {
	if err.kind() == std::io::ErrorKind::PermissionDenied {
		LaunchError::InsufficientPermissions(err.to_string())
	} else {
		LaunchError::Io(err)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use tempfile::TempDir;

	use super::*;

	fn prefs(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected object"),
		}
	}

	#[test]
	fn generated_profile_is_owned_and_cleanup_removes_it() {
		let profile = Profile::prepare(None, &Map::new()).unwrap();
		assert!(profile.owned());
		let dir = profile.dir().to_path_buf();
		assert!(dir.exists());
		profile.cleanup().unwrap();
		assert!(!dir.exists());
	}

	#[test]
	fn supplied_profile_is_borrowed_and_survives_cleanup() {
		let temp = TempDir::new().unwrap();
		let profile = Profile::prepare(Some(temp.path()), &Map::new()).unwrap();
		assert!(!profile.owned());
		profile.cleanup().unwrap();
		assert!(temp.path().exists());
	}

	#[test]
	fn preferences_merge_keeps_existing_keys() {
		let temp = TempDir::new().unwrap();
		let prefs_path = temp.path().join("Default/Preferences");
		fs::create_dir_all(prefs_path.parent().unwrap()).unwrap();
		fs::write(
			&prefs_path,
			r#"{"homepage":"https://old.example","download":{"prompt_for_download":true}}"#,
		)
		.unwrap();

		let overrides = prefs(json!({"download": {"default_directory": "/tmp/dl"}, "bookmarks_bar": true}));
		let profile = Profile::prepare(Some(temp.path()), &overrides).unwrap();
		drop(profile);

		let written: Value = serde_json::from_str(&fs::read_to_string(&prefs_path).unwrap()).unwrap();
		assert_eq!(written["homepage"], "https://old.example");
		assert_eq!(written["download"]["prompt_for_download"], true);
		assert_eq!(written["download"]["default_directory"], "/tmp/dl");
		assert_eq!(written["bookmarks_bar"], true);
	}

	#[test]
	fn corrupt_preferences_are_overwritten_not_fatal() {
		let temp = TempDir::new().unwrap();
		let prefs_path = temp.path().join("Default/Preferences");
		fs::create_dir_all(prefs_path.parent().unwrap()).unwrap();
		fs::write(&prefs_path, "not json at all {{{").unwrap();

		let overrides = prefs(json!({"homepage": "https://new.example"}));
		Profile::prepare(Some(temp.path()), &overrides).unwrap();

		let written: Value = serde_json::from_str(&fs::read_to_string(&prefs_path).unwrap()).unwrap();
		assert_eq!(written["homepage"], "https://new.example");
	}

	#[test]
	fn stderr_tail_returns_recent_log_content() {
		let temp = TempDir::new().unwrap();
		let profile = Profile::prepare(Some(temp.path()), &Map::new()).unwrap();
		fs::write(temp.path().join(STDERR_LOG), "boom: gpu process died\n").unwrap();
		assert!(profile.stderr_tail().contains("gpu process died"));
	}

	#[test]
	fn pid_file_holds_decimal_pid() {
		let temp = TempDir::new().unwrap();
		let profile = Profile::prepare(Some(temp.path()), &Map::new()).unwrap();
		profile.write_pid_file(4321);
		let content = fs::read_to_string(temp.path().join(PID_FILE)).unwrap();
		assert_eq!(content.trim(), "4321");
	}
}
