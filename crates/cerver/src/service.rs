//! Service identity and status state machine.
//!
//! A [`Service`] is immutable identity plus a mutable status and an
//! optional live egress connection. A service is eligible for selection
//! iff `status == Working`; the status mutex also guards the service's
//! live connection slot, so a status change and the connection it
//! describes never observably disagree.

use std::{
    net::TcpStream,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::stats::ServiceStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceStatus {
    None,
    Connecting,
    Ready,
    Working,
    Unavailable,
    Disconnected,
}

/// The live egress connection to a `WORKING` service: a read half owned
/// exclusively by the egress reader thread and a write half shared
/// (behind a mutex) by every ingress thread that routes to this service.
pub struct EgressConn {
    pub read_half: TcpStream,
    pub write_half: Mutex<TcpStream>,
}

impl EgressConn {
    pub fn new(stream: TcpStream) -> Result<Self, std::io::Error> {
        let write_half = stream.try_clone()?;
        Ok(Self { read_half: stream, write_half: Mutex::new(write_half) })
    }
}

pub struct Service {
    pub index: usize,
    pub address: String,
    pub port: u16,
    pub name: String,
    pub reconnect_wait: Duration,
    status: Mutex<ServiceStatus>,
    conn: Mutex<Option<Arc<EgressConn>>>,
    reconnecting: AtomicBool,
    pub stats: ServiceStats,
}

impl Service {
    pub fn new(index: usize, address: String, port: u16, name: String, reconnect_wait: Duration) -> Self {
        Self {
            index,
            address,
            port,
            name,
            reconnect_wait,
            status: Mutex::new(ServiceStatus::None),
            conn: Mutex::new(None),
            reconnecting: AtomicBool::new(false),
            stats: ServiceStats::new(),
        }
    }

    /// Claims the right to run this service's reconnect supervisor.
    /// Returns `false` if a supervisor is already running, so a second
    /// arming edge (e.g. a racing egress failure) never starts a
    /// duplicate supervisor thread for the same service.
    pub fn begin_reconnect(&self) -> bool {
        self.reconnecting.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Releases the reconnect-supervisor claim, called when the
    /// supervisor exits (on success or on teardown).
    pub fn end_reconnect(&self) {
        self.reconnecting.store(false, Ordering::Release);
    }

    pub fn status(&self) -> ServiceStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, status: ServiceStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Installs the live egress connection and flips status to `Working`.
    /// Called once, by `connect_service` on a successful health check, or
    /// by the reconnect supervisor after a successful reconnect.
    pub fn install_connection(&self, conn: Arc<EgressConn>) {
        let prior = self.status();
        cerver_utils::safe_assert!(
            prior == ServiceStatus::Ready,
            "install_connection called from {prior:?}, expected Ready ({name})",
            name = self.name
        );
        *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = Some(conn);
        self.set_status(ServiceStatus::Working);
    }

    /// Returns a clone of the live egress connection handle, if any.
    /// Used by the ingress handler to splice without holding this lock
    /// for the duration of the I/O.
    pub fn connection(&self) -> Option<Arc<EgressConn>> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Tears down the egress connection and marks the service
    /// `Disconnected`. Idempotent: a second call with no live connection
    /// is a no-op beyond re-asserting the status.
    pub fn mark_disconnected(&self) {
        *self.conn.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_status(ServiceStatus::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_service_starts_in_none_status() {
        let s = Service::new(0, "127.0.0.1".into(), 9000, "svc-0".into(), Duration::from_secs(20));
        assert_eq!(s.status(), ServiceStatus::None);
        assert!(s.connection().is_none());
    }

    #[test]
    fn mark_disconnected_clears_connection_and_sets_status() {
        let s = Service::new(0, "127.0.0.1".into(), 9000, "svc-0".into(), Duration::from_secs(20));
        s.set_status(ServiceStatus::Working);
        s.mark_disconnected();
        assert_eq!(s.status(), ServiceStatus::Disconnected);
        assert!(s.connection().is_none());
    }
}
