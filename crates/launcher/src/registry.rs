//! Process-wide set of live browser instances.
//!
//! The registry exists for signal-driven mass teardown. The first
//! registration installs a Ctrl-C listener for the rest of the process
//! lifetime; tokio replaces the default SIGINT disposition as soon as any
//! listener is registered and never restores it, so the listener cannot be
//! installed and torn down per transition. Instead the decision is made at
//! signal time: instances registered means kill everything and exit with
//! [`SIGNAL_EXIT_CODE`], an empty registry means exit the way a default
//! SIGINT would have. Instances register on reaching `Ready` and
//! deregister at the start of their own teardown.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::LaunchError;
use crate::launch::Instance;

/// Exit status used when a termination signal arrives while instances are
/// live. Distinct from the shell's ordinary Ctrl-C status so scripts can
/// tell "killed during active launch" from a plain interrupt.
pub const SIGNAL_EXIT_CODE: i32 = 86;

/// Exit status for an interrupt that finds nothing to tear down: the
/// conventional 128 + SIGINT, matching the default disposition the
/// listener displaced.
const PLAIN_INTERRUPT_EXIT_CODE: i32 = 130;

pub(crate) struct InstanceRegistry {
	instances: Mutex<HashMap<u64, Arc<Instance>>>,
	sigint_listener: OnceLock<JoinHandle<()>>,
}

pub(crate) fn global() -> &'static InstanceRegistry {
	static REGISTRY: OnceLock<InstanceRegistry> = OnceLock::new();
	REGISTRY.get_or_init(|| InstanceRegistry {
		instances: Mutex::new(HashMap::new()),
		sigint_listener: OnceLock::new(),
	})
}

impl InstanceRegistry {
	/// Registers an instance. Keyed by instance id, so re-adding the same
	/// instance is idempotent rather than a duplicate.
	pub fn add(&self, instance: Arc<Instance>) {
		self.instances.lock().insert(instance.id, instance);
		self.ensure_signal_listener();
	}

	pub fn remove(&self, id: u64) {
		self.instances.lock().remove(&id);
	}

	fn snapshot(&self) -> Vec<Arc<Instance>> {
		self.instances.lock().values().cloned().collect()
	}

	fn has_instances(&self) -> bool {
		!self.instances.lock().is_empty()
	}

	/// Spawns the Ctrl-C listener, once per process.
	fn ensure_signal_listener(&self) {
		self.sigint_listener.get_or_init(|| {
			tokio::spawn(async {
				if tokio::signal::ctrl_c().await.is_err() {
					return;
				}
				let live = global().has_instances();
				if live {
					warn!(target = "brv", "interrupt received, killing registered browsers");
					for err in kill_all().await {
						warn!(target = "brv", error = %err, "teardown error during interrupt");
					}
				}
				std::process::exit(interrupt_exit_code(live));
			})
		});
	}
}

/// Exit code for a Ctrl-C, chosen by whether instances were live when the
/// signal arrived.
fn interrupt_exit_code(instances_live: bool) -> i32 {
	if instances_live {
		SIGNAL_EXIT_CODE
	} else {
		PLAIN_INTERRUPT_EXIT_CODE
	}
}

/// Kills every registered instance, best-effort. Individual teardown
/// failures are collected and returned as data, never raised; an
/// instance leaves the registry even when its teardown errors, so a
/// failing profile deletion cannot leave an unkillable zombie entry.
pub async fn kill_all() -> Vec<LaunchError> {
	let instances = global().snapshot();
	let mut errors = Vec::new();
	for instance in instances {
		if let Err(err) = instance.kill().await {
			errors.push(err);
		}
	}
	errors
}
