//! Retry-until-complete blocking I/O helpers.
//!
//! Short reads and short writes are routine on a TCP stream; a header or
//! body is only usable once every byte of it has landed. These helpers
//! retry on `EINTR` and on partial transfers so callers never have to
//! reassemble a frame across multiple calls themselves.

use std::io::{self, Read, Write};

/// Result of an I/O operation against a peer that may have gone away.
///
/// `Alive` means the connection is still usable; `Disconnected` means the
/// peer is gone (EOF or a non-retryable error) and the caller must treat
/// the connection as dead.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

/// Reads exactly `buf.len()` bytes, retrying on `EINTR` and on short
/// reads. Returns `Ok(false)` the moment the peer closes — whether that
/// happens at a clean frame boundary or mid-header — so the caller can
/// close the connection uniformly either way.
pub fn read_full<R: Read>(mut r: R, buf: &mut [u8]) -> io::Result<bool> {
    let mut have = 0;
    while have < buf.len() {
        match r.read(&mut buf[have..]) {
            Ok(0) => return Ok(false),
            Ok(n) => have += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Writes every byte in `buf`, retrying on `EINTR` and on short writes.
pub fn write_full<W: Write>(mut w: W, buf: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match w.write(&buf[sent..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "peer closed mid-write"));
            }
            Ok(n) => sent += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Reads and discards exactly `n` bytes, restoring stream alignment after
/// a packet the caller has decided not to forward (the "drain"
/// discipline used by both the ingress and egress handlers).
pub fn drain<R: Read>(mut r: R, mut n: u64) -> io::Result<ConnState> {
    let mut buf = [0u8; 8192];
    while n > 0 {
        let want = n.min(buf.len() as u64) as usize;
        match r.read(&mut buf[..want]) {
            Ok(0) => return Ok(ConnState::Disconnected),
            Ok(read) => n -= read as u64,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Ok(ConnState::Disconnected),
        }
    }
    Ok(ConnState::Alive)
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use super::*;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        (server, client.join().unwrap())
    }

    #[test]
    fn read_full_assembles_a_header_sent_in_two_writes() {
        let (mut server, mut client) = loopback_pair();
        let writer = thread::spawn(move || {
            client.write_all(&[1, 2, 3]).unwrap();
            thread::sleep(std::time::Duration::from_millis(20));
            client.write_all(&[4, 5]).unwrap();
        });

        let mut buf = [0u8; 5];
        assert!(read_full(&mut server, &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4, 5]);
        writer.join().unwrap();
    }

    #[test]
    fn read_full_reports_clean_eof_at_boundary() {
        let (server, client) = loopback_pair();
        drop(client);
        let mut buf = [0u8; 4];
        assert!(!read_full(&server, &mut buf).unwrap());
    }

    #[test]
    fn drain_discards_exact_body_length() {
        let (mut server, mut client) = loopback_pair();
        let body = vec![0xAAu8; 100];
        let sent = body.clone();
        let writer = thread::spawn(move || client.write_all(&sent).unwrap());
        assert_eq!(drain(&mut server, 100).unwrap(), ConnState::Alive);
        writer.join().unwrap();
    }
}
