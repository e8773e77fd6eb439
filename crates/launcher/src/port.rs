//! Ephemeral port allocation for the debugging endpoint.

use std::net::TcpListener;

use tracing::debug;

use crate::error::{LaunchError, Result};

const MAX_ATTEMPTS: u32 = 10;

/// Returns a port that was unbound on loopback a moment ago.
///
/// Inherent TOCTOU: nothing keeps the port free between allocation and the
/// browser binding it. Acceptable because the spawn follows immediately and
/// a lost race surfaces as an ordinary readiness failure.
pub fn allocate() -> Result<u16> {
	for attempt in 1..=MAX_ATTEMPTS {
		match TcpListener::bind(("127.0.0.1", 0)) {
			Ok(listener) => {
				let port = listener.local_addr()?.port();
				debug!(target = "brv", port, "allocated ephemeral debugging port");
				return Ok(port);
			}
			Err(err) => {
				debug!(target = "brv", attempt, error = %err, "ephemeral bind failed");
			}
		}
	}
	Err(LaunchError::PortAllocationFailed { attempts: MAX_ATTEMPTS })
}

/// Returns `true` when `port` can currently be bound on localhost.
pub fn port_available(port: u16) -> bool {
	TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn allocated_port_is_nonzero_and_bindable() {
		let port = allocate().unwrap();
		assert_ne!(port, 0);
		assert!(port_available(port));
	}

	#[test]
	fn bound_port_is_reported_unavailable() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(!port_available(port));
		drop(listener);
		assert!(port_available(port));
	}

	#[test]
	fn consecutive_allocations_yield_usable_ports() {
		let a = allocate().unwrap();
		let b = allocate().unwrap();
		assert!(port_available(a));
		assert!(port_available(b));
	}

	// Two concurrently live instances must end up on distinct ports; the
	// held listener stands in for the first browser.
	#[test]
	fn allocation_skips_a_port_held_by_a_live_instance() {
		let first = allocate().unwrap();
		let _holder = TcpListener::bind(("127.0.0.1", first)).unwrap();
		let second = allocate().unwrap();
		assert_ne!(first, second);
		assert!(port_available(second));
	}
}
