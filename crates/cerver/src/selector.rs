//! Round-robin selector.
//!
//! The bounds check below is an invariant, not user-facing validation —
//! `cursor` is only ever touched here, under this lock, so an
//! out-of-bounds value means a logic bug in this function. Guarded with
//! `cerver_utils::safe_assert!` rather than a bare `assert!`: panic in
//! debug builds, log and carry on in release rather than take the
//! balancer down over a data-plane invariant.

use std::sync::{Arc, Mutex};

use crate::service::{Service, ServiceStatus};

/// Advances `cursor` under its lock and returns the next `Working`
/// service, probing at most `services.len()` times before giving up.
/// Ties are broken by strict round-robin registration order. The lock
/// is released before this function returns; no I/O happens while it
/// is held.
pub fn pick(cursor: &Mutex<usize>, services: &[Arc<Service>]) -> Option<Arc<Service>> {
    if services.is_empty() {
        return None;
    }

    let mut guard = cursor.lock().unwrap_or_else(|e| e.into_inner());
    for _ in 0..services.len() {
        *guard = (*guard + 1) % services.len();
        cerver_utils::safe_assert!(*guard < services.len(), "selector cursor {guard} out of bounds for {} services", services.len());
        let candidate = &services[*guard];
        if candidate.status() == ServiceStatus::Working {
            return Some(Arc::clone(candidate));
        }
    }
    None
}
