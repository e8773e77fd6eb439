//! Readiness probing: one TCP connect attempt per call.
//!
//! Retry policy lives in the orchestrator; the probe only reports whether a
//! single handshake succeeded. `wait_with_retries` is the shared retry
//! driver so the budget arithmetic exists in exactly one place.

use std::time::Duration;

use crate::error::LaunchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Attempts a single TCP connection to `(host, port)`.
pub async fn try_connect(host: &str, port: u16) -> std::io::Result<()> {
	let attempt = tokio::net::TcpStream::connect((host, port));
	match tokio::time::timeout(CONNECT_TIMEOUT, attempt).await {
		Ok(Ok(_stream)) => Ok(()),
		Ok(Err(err)) => Err(err),
		Err(_elapsed) => Err(std::io::Error::new(
			std::io::ErrorKind::TimedOut,
			"connect attempt timed out",
		)),
	}
}

/// Why a poll loop stopped without the endpoint becoming ready.
#[derive(Debug)]
pub(crate) enum PollFailure {
	/// Initial attempt plus `max_retries` retries all failed.
	BudgetExhausted { attempts: u32 },
	/// The probe reported a condition that makes retrying pointless.
	Aborted { attempts: u32, error: LaunchError },
}

/// Drives `probe` until it reports ready, aborts, or the budget runs out.
///
/// The probe returns `Ok(true)` for ready, `Ok(false)` for not-yet, and
/// `Err` to abort immediately (e.g. the child died). Total attempts on
/// exhaustion are always `max_retries + 1`.
pub(crate) async fn wait_with_retries<F, Fut>(
	mut probe: F,
	interval: Duration,
	max_retries: u32,
) -> Result<u32, PollFailure>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<bool, LaunchError>>,
{
	let mut attempts = 0u32;
	loop {
		attempts += 1;
		match probe().await {
			Ok(true) => return Ok(attempts),
			Ok(false) => {}
			Err(error) => return Err(PollFailure::Aborted { attempts, error }),
		}
		if attempts > max_retries {
			return Err(PollFailure::BudgetExhausted { attempts });
		}
		tokio::time::sleep(interval).await;
	}
}

#[cfg(test)]
mod tests {
	use std::net::TcpListener;
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	#[tokio::test]
	async fn connect_succeeds_against_a_listener() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(try_connect("127.0.0.1", port).await.is_ok());
	}

	#[tokio::test]
	async fn connect_fails_against_a_closed_port() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);
		assert!(try_connect("127.0.0.1", port).await.is_err());
	}

	#[tokio::test]
	async fn exhausted_budget_makes_exactly_initial_plus_retries_attempts() {
		let calls = AtomicU32::new(0);
		let result = wait_with_retries(
			|| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Ok(false) }
			},
			Duration::from_millis(1),
			5,
		)
		.await;

		assert_eq!(calls.load(Ordering::SeqCst), 6);
		match result {
			Err(PollFailure::BudgetExhausted { attempts }) => assert_eq!(attempts, 6),
			other => panic!("expected budget exhaustion, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn ready_probe_stops_the_loop_early() {
		let calls = AtomicU32::new(0);
		let result = wait_with_retries(
			|| {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move { Ok(n >= 2) }
			},
			Duration::from_millis(1),
			50,
		)
		.await;
		assert_eq!(result.unwrap(), 3);
	}

	#[tokio::test]
	async fn probe_error_aborts_without_further_attempts() {
		let calls = AtomicU32::new(0);
		let result = wait_with_retries(
			|| {
				calls.fetch_add(1, Ordering::SeqCst);
				async {
					Err(LaunchError::ProcessCrashed {
						status: "exit 1".into(),
						stderr_tail: String::new(),
					})
				}
			},
			Duration::from_millis(1),
			50,
		)
		.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(matches!(result, Err(PollFailure::Aborted { attempts: 1, .. })));
	}
}
