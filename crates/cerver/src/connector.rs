//! Service connector.
//!
//! `connect_service` drives a single service through
//! `None -> Connecting -> Ready -> Working` (or `-> Unavailable` on any
//! failure along the way), sends the one-shot `TEST` health check, and —
//! on success — installs the egress connection and spawns its reader
//! thread.

use std::{net::TcpStream, sync::Arc, time::Duration};

use cerver_network::{PacketHeader, PacketType};
use tracing::{debug, warn};

use crate::{
    balancer::Balancer,
    error::ConnectError,
    service::{EgressConn, Service, ServiceStatus},
};

/// Connect-and-health-check timeout for the TCP handshake, chosen so a
/// dead address fails fast instead of wedging the calling thread
/// indefinitely.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn connect_service(service: &Arc<Service>, balancer: &Arc<Balancer>) -> Result<(), ConnectError> {
    service.set_status(ServiceStatus::Connecting);

    let addr = format!("{}:{}", service.address, service.port);
    let stream = resolve_and_connect(&addr).map_err(|e| {
        service.set_status(ServiceStatus::Unavailable);
        ConnectError::Connect(e)
    })?;

    service.set_status(ServiceStatus::Ready);

    if let Err(e) = health_check(&stream) {
        service.set_status(ServiceStatus::Unavailable);
        return Err(e);
    }

    let conn = Arc::new(EgressConn::new(stream).map_err(|e| {
        service.set_status(ServiceStatus::Unavailable);
        ConnectError::Connect(e)
    })?);

    service.install_connection(Arc::clone(&conn));
    debug!(service = %service.name, address = %addr, "service reached WORKING");

    balancer.spawn_egress_reader(Arc::clone(service), conn);

    Ok(())
}

fn resolve_and_connect(addr: &str) -> std::io::Result<TcpStream> {
    use std::net::ToSocketAddrs;

    let mut last_err = None;
    for socket_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no addresses")))
}

/// Sends a single empty-body `TEST` packet and waits for any reply on
/// the same socket.
fn health_check(stream: &TcpStream) -> Result<(), ConnectError> {
    let header = PacketHeader::new(PacketType::Test, 0, 0);
    cerver_network::write_full(stream, &header.encode()).map_err(ConnectError::HealthCheckIo)?;

    let mut reply = [0u8; cerver_network::HEADER_SIZE];
    let ok = cerver_network::read_full(stream, &mut reply).map_err(ConnectError::HealthCheckIo)?;
    if !ok {
        warn!("service closed the connection before replying to the TEST packet");
        return Err(ConnectError::HealthCheckFailed);
    }

    let reply_header = PacketHeader::decode(&reply);
    if reply_header.has_valid_size() && reply_header.body_len() > 0 {
        // Drain the reply body, if any, so the connection starts the
        // egress reader loop aligned on the next header.
        if cerver_network::drain(stream, u64::from(reply_header.body_len())).is_err() {
            return Err(ConnectError::HealthCheckFailed);
        }
    }

    Ok(())
}
