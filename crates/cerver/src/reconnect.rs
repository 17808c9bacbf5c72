//! Reconnect supervisor.
//!
//! One supervisor thread per service transitioning to `Disconnected`,
//! guarded by [`Service::begin_reconnect`] so a second arming edge is a
//! no-op rather than a second thread. Retries indefinitely with a fixed
//! per-service delay; there is no retry cap, so a service that never
//! comes back simply stays `Disconnected` forever rather than being
//! given up on.

use std::{sync::Arc, time::Duration};

use cerver_timing::Repeater;
use tracing::{info, warn};

use crate::{balancer::Balancer, connector::connect_service, service::Service};

/// How often the supervisor wakes to re-check the stop flag while
/// waiting out `reconnect_wait`, so teardown is observed promptly
/// rather than only at the end of a long sleep.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn supervise(service: Arc<Service>, balancer: Arc<Balancer>) {
    if !service.begin_reconnect() {
        return;
    }

    loop {
        if !sleep_respecting_stop(service.reconnect_wait, &balancer) {
            break;
        }

        match connect_service(&service, &balancer) {
            Ok(()) => {
                info!(service = %service.name, "reconnect succeeded");
                break;
            }
            Err(e) => {
                warn!(service = %service.name, error = %e, "reconnect attempt failed, retrying");
            }
        }
    }

    service.end_reconnect();
}

/// Sleeps for `wait`, polling the stop flag every [`POLL_INTERVAL`].
/// Returns `false` if teardown was observed mid-sleep, in which case the
/// caller must exit without opening any socket rather than race a
/// reconnect against shutdown.
///
/// Gated by a [`Repeater`] rather than a hand-rolled duration countdown:
/// `reset` arms it against `wait`, and the poll loop just asks whether it
/// has fired yet.
fn sleep_respecting_stop(wait: Duration, balancer: &Balancer) -> bool {
    let mut gate = Repeater::every(wait.into());
    gate.reset();
    loop {
        if balancer.is_stopping() {
            return false;
        }
        if gate.fired() {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
