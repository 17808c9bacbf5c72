//! Service egress handler.
//!
//! Runs as the body of one OS thread per `WORKING` service, spawned by
//! `connect_service` (and again by the reconnect supervisor on a
//! successful reconnect). Demultiplexes responses by the `sock_fd`
//! routing tag and forwards them to the originating client.

use std::sync::Arc;

use cerver_network::PacketType;
use tracing::{debug, warn};

use crate::{balancer::Balancer, service::{EgressConn, Service}};

pub fn run_egress(service: Arc<Service>, conn: Arc<EgressConn>, balancer: Arc<Balancer>) {
    debug!(service = %service.name, "egress reader started");

    loop {
        let mut buf = [0u8; cerver_network::HEADER_SIZE];
        match cerver_network::read_full(&conn.read_half, &mut buf) {
            Ok(true) => {}
            Ok(false) => {
                debug!(service = %service.name, "service closed connection");
                break;
            }
            Err(e) => {
                warn!(service = %service.name, error = %e, "egress read error");
                break;
            }
        }

        let header = cerver_network::PacketHeader::decode(&buf);
        if !header.has_valid_size() {
            service.stats.record_bad(u64::from(header.packet_size));
            warn!(service = %service.name, "service sent a packet with an invalid size, closing");
            break;
        }

        service.stats.record_received(u64::from(header.packet_size), header.packet_type);

        dispatch(&header, &conn, &service, &balancer);
    }

    service_failed(&service, &balancer);
}

fn dispatch(header: &cerver_network::PacketHeader, conn: &EgressConn, service: &Arc<Service>, balancer: &Arc<Balancer>) {
    match header.packet_type {
        PacketType::Client | PacketType::Auth | PacketType::Test => {
            let _ = cerver_network::drain(&conn.read_half, u64::from(header.body_len()));
        }
        PacketType::Cerver
        | PacketType::Error
        | PacketType::Request
        | PacketType::Game
        | PacketType::App
        | PacketType::AppError
        | PacketType::Custom => {
            route_to_client(header, conn, balancer);
        }
        PacketType::None | PacketType::Bad => {
            service.stats.record_bad(u64::from(header.packet_size));
            let _ = cerver_network::drain(&conn.read_half, u64::from(header.body_len()));
        }
    }
}

fn route_to_client(header: &cerver_network::PacketHeader, conn: &EgressConn, balancer: &Arc<Balancer>) {
    let client_fd = header.sock_fd as i32;
    let Some(client) = balancer.lookup_client(client_fd) else {
        balancer.stats.record_unhandled(u64::from(header.packet_size));
        let _ = cerver_network::drain(&conn.read_half, u64::from(header.body_len()));
        return;
    };

    let write_guard = client.write_half.lock().unwrap_or_else(|e| e.into_inner());
    match cerver_network::splice(&conn.read_half, &write_guard, header) {
        Ok(_) => {
            drop(write_guard);
            balancer.stats.record_sent(u64::from(header.packet_size), header.packet_type);
        }
        Err(e) => {
            drop(write_guard);
            debug!(fd = client_fd, error = %e, "failed delivering response to client, client likely vanished");
            let _ = cerver_network::drain(&conn.read_half, u64::from(header.body_len()));
            balancer.remove_client(client_fd);
            balancer.stats.record_unhandled(u64::from(header.packet_size));
        }
    }
}

/// Tears down a service whose egress reader exited, and arms the
/// reconnect supervisor. Never propagates a panic or aborts the
/// balancer.
fn service_failed(service: &Arc<Service>, balancer: &Arc<Balancer>) {
    service.mark_disconnected();
    balancer.spawn_reconnect(Arc::clone(service));
}
