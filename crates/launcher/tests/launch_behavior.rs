//! End-to-end launch/teardown behavior against stub binaries and listeners.

use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Duration;

use brv_launcher::{LaunchError, LaunchOptions, Phase, launch};

// Launches share the global instance registry and the temp-dir namespace;
// serialize them so assertions about leftover profiles stay meaningful.
static LAUNCH_LOCK: Mutex<()> = Mutex::new(());

fn lock_launches() -> std::sync::MutexGuard<'static, ()> {
	LAUNCH_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn free_port() -> u16 {
	let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
	let port = listener.local_addr().unwrap().port();
	drop(listener);
	port
}

fn fast_poll(opts: &mut LaunchOptions) {
	opts.connection_poll_interval = Duration::from_millis(50);
	opts.max_connection_retries = 2;
}

#[tokio::test]
async fn fixed_port_with_live_listener_attaches_without_spawning() {
	let _guard = lock_launches();
	let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
	let port = listener.local_addr().unwrap().port();

	let opts = LaunchOptions {
		port,
		..Default::default()
	};
	let browser = launch(opts).await.expect("attach to existing listener");

	assert_eq!(browser.port(), port);
	assert_eq!(browser.state(), Phase::Ready);
	assert!(!browser.owns_process(), "attached instance must not own a process");
	assert!(browser.user_data_dir().is_none(), "attached instance has no profile");

	browser.kill().await.expect("first kill");
	assert_eq!(browser.state(), Phase::Terminated);
	browser.kill().await.expect("second kill is a no-op");
}

#[tokio::test]
async fn strict_port_mode_fails_fast_when_nothing_listens() {
	let _guard = lock_launches();
	let port = free_port();

	let opts = LaunchOptions {
		port,
		port_strict: true,
		..Default::default()
	};
	let err = launch(opts).await.expect_err("strict mode must reject");

	match err {
		LaunchError::NoBrowserAtPort { port: reported } => assert_eq!(reported, port),
		other => panic!("expected NoBrowserAtPort, got {other:?}"),
	}
	assert!(err.is_recoverable());
	assert!(err.category().starts_with("PORT_"));
}

#[tokio::test]
async fn kill_all_collects_no_errors_and_empties_the_registry() {
	let _guard = lock_launches();
	let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
	let port = listener.local_addr().unwrap().port();

	let browser = launch(LaunchOptions {
		port,
		..Default::default()
	})
	.await
	.unwrap();

	let errors = brv_launcher::kill_all().await;
	assert!(errors.is_empty(), "teardown errors: {errors:?}");
	assert_eq!(browser.state(), Phase::Terminated);

	// Registry already empty: a second sweep has nothing to do.
	assert!(brv_launcher::kill_all().await.is_empty());
}

#[cfg(unix)]
mod unix {
	use std::fs;
	use std::os::unix::fs::PermissionsExt;
	use std::path::PathBuf;

	use brv_launcher::config::PIPE_TRANSPORT_FLAG;
	use brv_launcher::pid_is_alive;
	use tempfile::TempDir;

	use super::*;

	/// Writes an executable stub standing in for the browser binary.
	fn stub_binary(dir: &TempDir, body: &str) -> PathBuf {
		let path = dir.path().join("stub-browser");
		fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
		fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
		path
	}

	fn profiles_in_temp() -> Vec<PathBuf> {
		let mut found: Vec<PathBuf> = fs::read_dir(std::env::temp_dir())
			.unwrap()
			.filter_map(|e| e.ok())
			.map(|e| e.path())
			.filter(|p| {
				p.file_name()
					.and_then(|n| n.to_str())
					.is_some_and(|n| n.starts_with("brv-profile-"))
			})
			.collect();
		found.sort();
		found
	}

	#[tokio::test]
	async fn unreachable_endpoint_times_out_after_the_retry_budget() {
		let _guard = lock_launches();
		let scratch = TempDir::new().unwrap();
		let stub = stub_binary(&scratch, "exec sleep 30");

		let before = profiles_in_temp();

		let mut opts = LaunchOptions {
			browser_path: Some(stub),
			..Default::default()
		};
		fast_poll(&mut opts);
		let err = launch(opts).await.expect_err("stub never listens");

		match err {
			LaunchError::LaunchTimeout { attempts, .. } => {
				// Initial attempt plus max_connection_retries retries.
				assert_eq!(attempts, 3);
			}
			other => panic!("expected LaunchTimeout, got {other:?}"),
		}

		// The failure path must remove the generated profile again.
		assert_eq!(profiles_in_temp(), before);
	}

	#[tokio::test]
	async fn crashing_child_aborts_the_poll_loop_with_its_stderr() {
		let _guard = lock_launches();
		let scratch = TempDir::new().unwrap();
		let stub = stub_binary(&scratch, "echo 'boom from stub' >&2\nexit 3");

		let mut opts = LaunchOptions {
			browser_path: Some(stub),
			..Default::default()
		};
		opts.connection_poll_interval = Duration::from_millis(50);
		opts.max_connection_retries = 20;

		let err = launch(opts).await.expect_err("stub exits immediately");
		match err {
			LaunchError::ProcessCrashed { status, stderr_tail } => {
				assert!(status.contains("3"), "unexpected status: {status}");
				assert!(stderr_tail.contains("boom from stub"), "tail was: {stderr_tail}");
			}
			other => panic!("expected ProcessCrashed, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn caller_supplied_profile_survives_a_failed_launch() {
		let _guard = lock_launches();
		let scratch = TempDir::new().unwrap();
		let stub = stub_binary(&scratch, "exec sleep 30");
		let profile_dir = TempDir::new().unwrap();

		let mut opts = LaunchOptions {
			browser_path: Some(stub),
			user_data_dir: Some(profile_dir.path().to_path_buf()),
			..Default::default()
		};
		fast_poll(&mut opts);
		launch(opts).await.expect_err("stub never listens");

		assert!(profile_dir.path().exists(), "borrowed profile must be left intact");
		assert!(
			profile_dir.path().join("brave-err.log").exists(),
			"log files belong to the profile"
		);
		assert!(
			profile_dir.path().join("brave.pid").exists(),
			"pid file is written before polling"
		);
	}

	#[tokio::test]
	async fn pipe_transport_is_ready_without_a_port_and_cleans_its_profile() {
		let _guard = lock_launches();
		let scratch = TempDir::new().unwrap();
		let stub = stub_binary(&scratch, "exec sleep 30");

		let opts = LaunchOptions {
			browser_path: Some(stub),
			browser_flags: vec![PIPE_TRANSPORT_FLAG.to_string()],
			..Default::default()
		};
		let browser = launch(opts).await.expect("pipe launch");

		assert_eq!(browser.port(), 0, "pipe transport never reports a TCP port");
		assert!(browser.pid() > 0);
		assert!(browser.owns_process());
		assert_eq!(browser.state(), Phase::Ready);

		let transport = browser.take_transport().expect("pipe handles present");
		assert!(browser.take_transport().is_none(), "transport is handed out once");
		drop(transport);

		let pid = browser.pid();
		let profile = browser.user_data_dir().expect("owned profile while live");
		assert!(profile.exists());

		browser.kill().await.expect("kill");
		assert!(!profile.exists(), "owned profile removed on teardown");
		assert!(!pid_is_alive(pid), "process group must be gone");
		browser.kill().await.expect("idempotent kill");
	}

	#[tokio::test]
	async fn preference_overrides_land_in_the_profile() {
		let _guard = lock_launches();
		let scratch = TempDir::new().unwrap();
		let stub = stub_binary(&scratch, "exec sleep 30");
		let profile_dir = TempDir::new().unwrap();

		let mut prefs = serde_json::Map::new();
		prefs.insert("bookmarks_bar".into(), serde_json::json!({"show_on_all_tabs": true}));

		let mut opts = LaunchOptions {
			browser_path: Some(stub),
			user_data_dir: Some(profile_dir.path().to_path_buf()),
			prefs,
			..Default::default()
		};
		fast_poll(&mut opts);
		launch(opts).await.expect_err("stub never listens");

		let written = fs::read_to_string(profile_dir.path().join("Default/Preferences")).unwrap();
		let value: serde_json::Value = serde_json::from_str(&written).unwrap();
		assert_eq!(value["bookmarks_bar"]["show_on_all_tabs"], true);
	}
}
