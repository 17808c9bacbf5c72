//! The balancer singleton: shared state plus lifecycle, stats reporting,
//! and orchestration for every connector/ingress/egress/reconnect
//! worker thread it spawns.

use std::{
    collections::HashMap,
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
    time::Duration,
};

use cerver_timing::{Nanos, Repeater};
use tracing::{info, warn};

use crate::{
    config::{BalancerConfig, Policy, StartPolicy},
    connector::connect_service,
    egress::run_egress,
    error::{ConfigError, StartError},
    ingress::{run_ingress, IngressConn},
    reconnect::supervise,
    registry::ServiceRegistry,
    service::{EgressConn, Service, ServiceStatus},
    stats::BalancerStats,
};

/// How long the accept loop sleeps between non-blocking `accept` polls
/// while no connection is pending. Keeps the accept thread able to
/// observe the stop flag promptly without a dedicated wakeup mechanism.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How often the accept loop logs rolling `BalancerStats`/`ServiceStats`
/// counters, independent of the one-shot dump `teardown` does on exit.
const STATS_LOG_INTERVAL: cerver_timing::Duration = cerver_timing::Duration::from_secs(30);

pub struct Balancer {
    pub name: String,
    pub policy: Policy,
    pub registry: ServiceRegistry,
    pub cursor: Mutex<usize>,
    pub stats: BalancerStats,
    pub stop_flag: Arc<AtomicBool>,
    torn_down: AtomicBool,
    start_policy: StartPolicy,
    port: u16,
    backlog: i32,
    core_pins: Vec<usize>,
    next_worker: AtomicUsize,
    clients: Mutex<HashMap<i32, Arc<IngressConn>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stats_repeater: Mutex<Repeater>,
    started_at: Nanos,
}

impl Balancer {
    pub fn new(config: BalancerConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let capacity = config.n_services();
        let mut registry = ServiceRegistry::with_capacity(capacity);
        for service_config in &config.services {
            if !registry.register(service_config) {
                return Err(ConfigError::TooManyServices { configured: capacity, capacity: registry.capacity() });
            }
        }

        Ok(Arc::new(Self {
            name: config.name,
            policy: config.policy,
            registry,
            cursor: Mutex::new(0),
            stats: BalancerStats::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            torn_down: AtomicBool::new(false),
            start_policy: config.start_policy,
            port: config.port,
            backlog: config.backlog,
            core_pins: config.core_pins,
            next_worker: AtomicUsize::new(0),
            clients: Mutex::new(HashMap::new()),
            handles: Mutex::new(Vec::new()),
            stats_repeater: Mutex::new(Repeater::every(STATS_LOG_INTERVAL)),
            started_at: Nanos::now(),
        }))
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Spawns `body` on a new OS thread, pinning it to the next entry of
    /// `core_pins` (consumed in spawn order) when the balancer was
    /// configured with explicit pins, and leaving it on the OS default
    /// scheduler otherwise. Every connector, ingress, egress, and
    /// reconnect worker thread goes through this instead of a bare
    /// `std::thread::spawn`.
    fn spawn_worker<F>(&self, body: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let core = {
            let idx = self.next_worker.fetch_add(1, Ordering::Relaxed);
            self.core_pins.get(idx).copied()
        };
        std::thread::spawn(move || {
            cerver_utils::thread_boot(core);
            body();
        })
    }

    /// Connects every registered service, then binds the listening
    /// socket and spawns the accept loop. Fails per `start_policy`
    /// without leaving a partially-running balancer: the caller should
    /// drop the `Arc` (or call `teardown`) on error.
    pub fn start(self: &Arc<Self>, bind_addr: &str) -> Result<SocketAddr, StartError> {
        self.registry.ensure_full()?;

        for service in self.registry.as_slice() {
            if let Err(e) = connect_service(service, self) {
                warn!(service = %service.name, error = %e, "initial connect failed");
            }
        }

        if !self.meets_start_policy() {
            return Err(StartError::NoServiceReachable);
        }

        let socket_addr: SocketAddr = format!("{bind_addr}:{}", self.port)
            .parse()
            .map_err(|_| StartError::ListenFailed(std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid bind address")))?;
        let listener = cerver_network::bind_with_backlog(socket_addr, self.backlog)?;
        listener.set_nonblocking(true)?;
        let bound_addr = listener.local_addr()?;
        info!(name = %self.name, %bound_addr, backlog = self.backlog, "balancer listening");

        let balancer = Arc::clone(self);
        let handle = self.spawn_worker(move || accept_loop(listener, balancer));
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).push(handle);

        Ok(bound_addr)
    }

    fn meets_start_policy(&self) -> bool {
        let working = self.registry.as_slice().iter().filter(|s| s.status() == ServiceStatus::Working).count();
        match self.start_policy {
            StartPolicy::RequireAny => working >= 1,
            StartPolicy::RequireAll => working == self.registry.len(),
        }
    }

    pub fn spawn_egress_reader(self: &Arc<Self>, service: Arc<Service>, conn: Arc<EgressConn>) {
        let balancer = Arc::clone(self);
        let handle = self.spawn_worker(move || run_egress(service, conn, balancer));
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
    }

    pub fn spawn_reconnect(self: &Arc<Self>, service: Arc<Service>) {
        if self.is_stopping() {
            return;
        }
        let balancer = Arc::clone(self);
        let handle = self.spawn_worker(move || supervise(service, balancer));
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
    }

    pub fn register_client(&self, fd: i32, conn: Arc<IngressConn>) {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).insert(fd, conn);
    }

    pub fn remove_client(&self, fd: i32) {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).remove(&fd);
    }

    pub fn lookup_client(&self, fd: i32) -> Option<Arc<IngressConn>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).get(&fd).cloned()
    }

    /// Ordered shutdown: stop accepting, close every ingress and egress
    /// connection, then log final counters.
    /// Idempotent and safe to call from the signal-poll thread.
    pub fn teardown(self: &Arc<Self>) {
        if self.torn_down.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }

        info!(name = %self.name, "tearing down balancer");
        self.stop_flag.store(true, Ordering::Relaxed);

        for (_, client) in self.clients.lock().unwrap_or_else(|e| e.into_inner()).drain() {
            shutdown_write_half(&client.write_half);
        }

        for service in self.registry.as_slice() {
            if let Some(conn) = service.connection() {
                let _ = conn.read_half.shutdown(Shutdown::Both);
            }
            service.mark_disconnected();
        }

        self.log_stats();
    }

    /// Joins every thread this balancer has spawned. Used by tests and
    /// optionally by the binary before process exit. Threads should
    /// already be exiting by the time this is called, since `teardown`
    /// closes every socket they block on.
    pub fn join(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Logs the rolling counters once per [`STATS_LOG_INTERVAL`], called
    /// from the accept loop's poll cycle. A no-op between intervals.
    fn maybe_log_stats(&self) {
        if self.stats_repeater.lock().unwrap_or_else(|e| e.into_inner()).fired() {
            self.log_stats();
        }
    }

    /// Formats and logs `BalancerStats` and each service's `ServiceStats`,
    /// mirroring `balancer_stats_print`/`balancer_service_stats_print` in
    /// the original C implementation.
    pub fn log_stats(&self) {
        info!(
            name = %self.name,
            uptime = %(Nanos::now() - self.started_at),
            receives_done = self.stats.receives_done.load(Ordering::Relaxed),
            packets_received = self.stats.packets_received.load(Ordering::Relaxed),
            bytes_received = self.stats.bytes_received.load(Ordering::Relaxed),
            packets_routed = self.stats.packets_routed.load(Ordering::Relaxed),
            bytes_routed = self.stats.bytes_routed.load(Ordering::Relaxed),
            packets_sent = self.stats.packets_sent.load(Ordering::Relaxed),
            bytes_sent = self.stats.bytes_sent.load(Ordering::Relaxed),
            unhandled_packets = self.stats.unhandled_packets.load(Ordering::Relaxed),
            bad_packets_received = self.stats.bad_packets_received.load(Ordering::Relaxed),
            "balancer stats"
        );
        for service in self.registry.as_slice() {
            info!(
                service = %service.name,
                status = ?service.status(),
                packets_routed = service.stats.packets_routed.load(Ordering::Relaxed),
                packets_received = service.stats.packets_received.load(Ordering::Relaxed),
                bad_packets_received = service.stats.bad_packets_received.load(Ordering::Relaxed),
                "service stats"
            );
        }
    }
}

fn shutdown_write_half(write_half: &Mutex<TcpStream>) {
    let guard = write_half.lock().unwrap_or_else(|e| e.into_inner());
    let _ = guard.shutdown(Shutdown::Both);
}

fn accept_loop(listener: TcpListener, balancer: Arc<Balancer>) {
    loop {
        if balancer.is_stopping() {
            break;
        }
        balancer.maybe_log_stats();
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "client connected");
                let ingress_balancer = Arc::clone(&balancer);
                let handle = balancer.spawn_worker(move || run_ingress(stream, ingress_balancer));
                balancer.handles.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}
