//! Client ingress handler.
//!
//! Runs as the body of one OS thread per accepted client connection,
//! spawned by the accept loop in `balancer.rs`. Reads one header at a
//! time, picks a service, and either splices the packet through or
//! responds with the balancer-generated error packet.

use std::{
    net::TcpStream,
    os::fd::AsRawFd,
    sync::{Arc, Mutex},
};

use cerver_network::{PacketHeader, PacketType};
use tracing::{debug, warn};

use crate::{balancer::Balancer, selector};

/// Subcode carried in the balancer-generated error packet's
/// `request_type` field when no `WORKING` service is available.
pub const REQUEST_TYPE_SERVICES_UNAVAILABLE: u16 = 1;
const SERVICES_UNAVAILABLE_MESSAGE: &[u8] = b"Services unavailable";

/// A client's connection to the balancer. The read half lives on the
/// stack of `run_ingress`'s own thread; the write half is shared (via
/// this struct, behind a mutex) with whichever egress thread ends up
/// routing a response back to this client.
pub struct IngressConn {
    pub write_half: Mutex<TcpStream>,
}

pub fn run_ingress(stream: TcpStream, balancer: Arc<Balancer>) {
    let fd = stream.as_raw_fd();
    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to clone ingress socket for its write half");
            return;
        }
    };
    let conn = Arc::new(IngressConn { write_half: Mutex::new(write_half) });
    balancer.register_client(fd, Arc::clone(&conn));
    debug!(fd, "client connected");

    loop {
        let mut buf = [0u8; cerver_network::HEADER_SIZE];
        match cerver_network::read_full(&stream, &mut buf) {
            Ok(true) => {}
            Ok(false) => {
                debug!(fd, "client closed connection");
                break;
            }
            Err(e) => {
                debug!(fd, error = %e, "ingress read error, closing connection");
                break;
            }
        }

        let header = PacketHeader::decode(&buf);
        if !header.has_valid_size() {
            balancer.stats.bad_packets_received.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            warn!(fd, packet_size = header.packet_size, "packet_size smaller than header, closing connection");
            break;
        }

        balancer.stats.record_received(u64::from(header.packet_size), header.packet_type);

        if !handle_packet(&stream, &header, fd, &conn, &balancer) {
            break;
        }
    }

    balancer.remove_client(fd);
}

/// Returns `false` if the ingress connection must be closed as a result
/// of handling this packet (splice failure, unrecoverable drain error).
fn handle_packet(
    stream: &TcpStream,
    header: &PacketHeader,
    client_fd: i32,
    conn: &Arc<IngressConn>,
    balancer: &Arc<Balancer>,
) -> bool {
    let Some(service) = selector::pick(&balancer.cursor, balancer.registry.as_slice()) else {
        balancer.stats.record_unhandled(u64::from(header.packet_size));
        return respond_services_unavailable(stream, header, conn);
    };

    let Some(egress_conn) = service.connection() else {
        // Status said WORKING but the connection was torn down concurrently;
        // treat exactly like "no service" for this packet.
        balancer.stats.record_unhandled(u64::from(header.packet_size));
        return respond_services_unavailable(stream, header, conn);
    };

    let routed_header = header.with_sock_fd(client_fd as u32);
    let write_guard = egress_conn.write_half.lock().unwrap_or_else(|e| e.into_inner());
    match cerver_network::splice(stream, &write_guard, &routed_header) {
        Ok(_) => {
            drop(write_guard);
            balancer.stats.record_routed(u64::from(header.packet_size), header.packet_type);
            service.stats.record_routed(u64::from(header.packet_size), header.packet_type);
            true
        }
        Err(e) => {
            drop(write_guard);
            warn!(service = %service.name, error = %e, "splice to service failed, marking it disconnected");
            service.mark_disconnected();
            balancer.spawn_reconnect(Arc::clone(&service));
            balancer.stats.record_unhandled(u64::from(header.packet_size));
            // Body framing on the client socket cannot be trusted to be
            // intact after a failed mid-transfer splice, so the ingress
            // connection is closed rather than risked.
            false
        }
    }
}

fn respond_services_unavailable(stream: &TcpStream, header: &PacketHeader, conn: &Arc<IngressConn>) -> bool {
    let error_header = PacketHeader::new(
        PacketType::Error,
        REQUEST_TYPE_SERVICES_UNAVAILABLE,
        SERVICES_UNAVAILABLE_MESSAGE.len() as u32,
    );
    let write_guard = conn.write_half.lock().unwrap_or_else(|e| e.into_inner());
    let sent = cerver_network::write_full(&*write_guard, &error_header.encode())
        .and_then(|()| cerver_network::write_full(&*write_guard, SERVICES_UNAVAILABLE_MESSAGE));
    drop(write_guard);
    if let Err(e) = sent {
        warn!(error = %e, "failed to send SERVICES_UNAVAILABLE error packet to client");
        return false;
    }

    match cerver_network::drain(stream, u64::from(header.body_len())) {
        Ok(cerver_network::ConnState::Alive) => true,
        _ => false,
    }
}
