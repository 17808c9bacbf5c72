//! Signal-driven lifecycle.
//!
//! Registers `SIGTERM`/`SIGINT`/`SIGQUIT` against a shared flag, then
//! polls it from a background thread and invokes `Balancer::teardown`
//! once. The single process-wide weak handle exists only so the signal
//! handler has a way to reach the running balancer; every other code
//! path takes the balancer as a parameter instead of reaching for this.

use std::{
    sync::{OnceLock, Weak},
    thread,
    time::Duration,
};

use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use tracing::{error, info};

use crate::balancer::Balancer;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

static GLOBAL_BALANCER: OnceLock<Weak<Balancer>> = OnceLock::new();

/// Registers the process signal handlers and spawns the background
/// poll thread. Only the first call in a process wins the global
/// handle; subsequent calls still register the signal flag (each
/// balancer observes its own `stop_flag`) but only the first
/// balancer's teardown is reachable from a signal, under the assumption
/// that a process runs a single balancer.
pub fn install_signal_handlers(balancer: &std::sync::Arc<Balancer>) {
    let stop_flag = std::sync::Arc::clone(&balancer.stop_flag);

    for signal in [SIGTERM, SIGINT, SIGQUIT] {
        if let Err(e) = signal_hook::flag::register(signal, std::sync::Arc::clone(&stop_flag)) {
            error!(signal, error = %e, "failed to register signal handler");
        }
    }

    let _ = GLOBAL_BALANCER.set(std::sync::Arc::downgrade(balancer));

    thread::spawn(move || loop {
        if stop_flag.load(std::sync::atomic::Ordering::Relaxed) {
            if let Some(balancer) = GLOBAL_BALANCER.get().and_then(Weak::upgrade) {
                info!("stop flag observed, tearing down");
                balancer.teardown();
            }
            break;
        }
        thread::sleep(POLL_INTERVAL);
    });
}
