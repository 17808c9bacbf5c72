//! End-to-end framing + splice tests over real loopback sockets: no
//! mocked streams, a background thread plays one side of the
//! connection.

use std::{
    net::{TcpListener, TcpStream},
    thread,
};

use cerver_network::{bind_with_backlog, drain, read_full, splice, write_full, ConnState, PacketHeader, PacketType, HEADER_SIZE};

fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    (server, client.join().unwrap())
}

/// A full header-then-body packet arrives on one socket and is spliced
/// verbatim onto a second, independent loopback connection — the same
/// shape `cerver::ingress`/`cerver::egress` exercise in production, just
/// without the balancer wrapped around it.
#[test]
fn splice_forwards_a_real_packet_between_two_independent_connections() {
    let (mut upstream_server, upstream_client) = loopback_pair();
    let (downstream_server, mut downstream_client) = loopback_pair();

    let header = PacketHeader::new(PacketType::App, 0, 5).with_sock_fd(42);
    let sender = thread::spawn(move || {
        write_full(&upstream_client, &header.encode()).unwrap();
        write_full(&upstream_client, b"hello").unwrap();
    });

    let mut incoming = [0u8; HEADER_SIZE];
    assert!(read_full(&mut upstream_server, &mut incoming).unwrap());
    let incoming_header = PacketHeader::decode(&incoming);
    assert_eq!(incoming_header.sock_fd, 42);

    splice(&upstream_server, &downstream_server, &incoming_header).unwrap();
    sender.join().unwrap();

    let mut out = [0u8; HEADER_SIZE];
    assert!(read_full(&mut downstream_client, &mut out).unwrap());
    let out_header = PacketHeader::decode(&out);
    assert_eq!(out_header, incoming_header);

    let mut body = [0u8; 5];
    assert!(read_full(&mut downstream_client, &mut body).unwrap());
    assert_eq!(&body, b"hello");
}

#[test]
fn splice_of_an_empty_body_packet_forwards_header_only() {
    let (upstream_server, upstream_client) = loopback_pair();
    let (downstream_server, mut downstream_client) = loopback_pair();

    let header = PacketHeader::new(PacketType::Test, 0, 0);
    write_full(&upstream_client, &header.encode()).unwrap();

    let mut incoming = [0u8; HEADER_SIZE];
    assert!(read_full(&upstream_server, &mut incoming).unwrap());

    splice(&upstream_server, &downstream_server, &header).unwrap();

    let mut out = [0u8; HEADER_SIZE];
    assert!(read_full(&mut downstream_client, &mut out).unwrap());
    assert_eq!(PacketHeader::decode(&out), header);
}

#[test]
fn drain_restores_alignment_after_a_packet_is_rejected() {
    let (mut server, client) = loopback_pair();

    let first = PacketHeader::new(PacketType::App, 0, 4);
    let second = PacketHeader::new(PacketType::App, 0, 0);
    let writer = thread::spawn(move || {
        write_full(&client, &first.encode()).unwrap();
        write_full(&client, b"xxxx").unwrap();
        write_full(&client, &second.encode()).unwrap();
    });

    let mut buf = [0u8; HEADER_SIZE];
    assert!(read_full(&mut server, &mut buf).unwrap());
    let decoded = PacketHeader::decode(&buf);
    assert_eq!(drain(&mut server, u64::from(decoded.body_len())).unwrap(), ConnState::Alive);

    // Framing realigned: the next header read lands on `second`, not on
    // leftover body bytes from the drained packet.
    assert!(read_full(&mut server, &mut buf).unwrap());
    assert_eq!(PacketHeader::decode(&buf), second);

    writer.join().unwrap();
}

#[test]
fn bind_with_backlog_serves_a_real_accept_loop() {
    let listener = bind_with_backlog("127.0.0.1:0".parse().unwrap(), 16).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 3];
        read_full(&stream, &mut buf).unwrap();
        buf
    });

    let client = TcpStream::connect(addr).unwrap();
    write_full(&client, b"hey").unwrap();

    assert_eq!(server.join().unwrap(), *b"hey");
}
