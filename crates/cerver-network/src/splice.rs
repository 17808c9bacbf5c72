//! Zero-copy socket-to-socket forwarding.
//!
//! Writes a 16-byte header verbatim to the destination, then transfers
//! exactly `n` body bytes from source to destination. The body transfer
//! prefers the kernel `splice(2)` primitive through a pipe pair on
//! Linux and falls back to a bounded 64 KiB `Read`/`Write` copy loop
//! everywhere else, or when `splice` itself reports a non-transient
//! failure.
//!
//! Once header bytes are committed to `dst`, the body must be delivered
//! in full or `dst` must be considered severed: half-delivered packets
//! cannot be recovered on a stream socket.

use std::{
    io::{self, Read, Write},
    net::TcpStream,
    os::fd::AsRawFd,
};

use thiserror::Error;
use tracing::debug;

use crate::header::PacketHeader;

const COPY_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum SpliceError {
    #[error("failed writing header to destination: {0}")]
    HeaderWrite(#[source] io::Error),
    #[error("failed transferring body to destination: {0}")]
    BodyTransfer(#[source] io::Error),
    #[error("peer closed before the full packet was delivered")]
    PeerClosed,
}

/// Writes `header` followed by exactly `header.body_len()` bytes copied
/// from `src` to `dst`. Returns the number of body bytes transferred.
pub fn splice(src: &TcpStream, dst: &TcpStream, header: &PacketHeader) -> Result<u64, SpliceError> {
    write_header(dst, header)?;

    let n = u64::from(header.body_len());
    if n == 0 {
        return Ok(0);
    }

    copy_body(src, dst, n)
}

fn write_header(dst: &TcpStream, header: &PacketHeader) -> Result<(), SpliceError> {
    let bytes = header.encode();
    crate::io::write_full(dst, &bytes).map_err(SpliceError::HeaderWrite)
}

#[cfg(target_os = "linux")]
fn copy_body(src: &TcpStream, dst: &TcpStream, n: u64) -> Result<u64, SpliceError> {
    match splice_via_pipe(src, dst, n) {
        Ok(sent) => Ok(sent),
        Err(e) => {
            debug!(error = %e, "kernel splice unavailable, falling back to buffered copy");
            copy_body_buffered(src, dst, n)
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn copy_body(src: &TcpStream, dst: &TcpStream, n: u64) -> Result<u64, SpliceError> {
    copy_body_buffered(src, dst, n)
}

fn copy_body_buffered(mut src: &TcpStream, mut dst: &TcpStream, mut n: u64) -> Result<u64, SpliceError> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut sent = 0u64;
    while n > 0 {
        let want = n.min(COPY_BUF_SIZE as u64) as usize;
        let read = match src.read(&mut buf[..want]) {
            Ok(0) => return Err(SpliceError::PeerClosed),
            Ok(r) => r,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SpliceError::BodyTransfer(e)),
        };
        crate::io::write_full(&mut dst, &buf[..read]).map_err(SpliceError::BodyTransfer)?;
        sent += read as u64;
        n -= read as u64;
    }
    Ok(sent)
}

/// Transfers `n` bytes from `src` to `dst` via `splice(2)` through an
/// intermediate pipe, without copying through userspace. Returns an
/// `io::Error` (rather than `SpliceError`) so the caller can fall back
/// to the buffered copy on any failure, including `ENOSYS` on kernels
/// built without splice support.
#[cfg(target_os = "linux")]
fn splice_via_pipe(src: &TcpStream, dst: &TcpStream, n: u64) -> io::Result<u64> {
    let (pipe_r, pipe_w) = new_pipe()?;
    let src_fd = src.as_raw_fd();
    let dst_fd = dst.as_raw_fd();

    let mut remaining = n;
    let mut sent = 0u64;
    while remaining > 0 {
        let want = remaining.min(COPY_BUF_SIZE as u64);
        let moved_in = raw_splice(src_fd, pipe_w, want)?;
        if moved_in == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "source closed mid-body"));
        }

        let mut pending = moved_in as u64;
        while pending > 0 {
            let moved_out = raw_splice(pipe_r, dst_fd, pending)?;
            if moved_out == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "destination closed mid-body"));
            }
            pending -= moved_out as u64;
            sent += moved_out as u64;
        }
        remaining -= moved_in as u64;
    }

    unsafe {
        libc::close(pipe_r);
        libc::close(pipe_w);
    }

    Ok(sent)
}

#[cfg(target_os = "linux")]
fn new_pipe() -> io::Result<(libc::c_int, libc::c_int)> {
    let mut fds = [0 as libc::c_int; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

#[cfg(target_os = "linux")]
fn raw_splice(from: libc::c_int, to: libc::c_int, len: u64) -> io::Result<usize> {
    loop {
        let rc = unsafe {
            libc::splice(
                from,
                std::ptr::null_mut(),
                to,
                std::ptr::null_mut(),
                len as usize,
                libc::SPLICE_F_MOVE,
            )
        };
        if rc >= 0 {
            return Ok(rc as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(err);
    }
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use super::*;
    use crate::header::PacketType;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        (server, client.join().unwrap())
    }

    #[test]
    fn splices_header_and_body_verbatim() {
        let (src_read_side, mut src_write_side) = loopback_pair();
        let (dst_write_side, mut dst_read_side) = loopback_pair();

        let body = b"hello again".to_vec();
        let header = PacketHeader::new(PacketType::App, 0, body.len() as u32);

        let writer = thread::spawn({
            let body = body.clone();
            move || {
                src_write_side.write_all(&body).unwrap();
            }
        });

        let sent = splice(&src_read_side, &dst_write_side, &header).unwrap();
        assert_eq!(sent, body.len() as u64);
        writer.join().unwrap();

        let mut received_header = [0u8; crate::header::HEADER_SIZE];
        crate::io::read_full(&dst_read_side, &mut received_header).unwrap();
        assert_eq!(PacketHeader::decode(&received_header), header);

        let mut received_body = vec![0u8; body.len()];
        crate::io::read_full(&mut dst_read_side, &mut received_body).unwrap();
        assert_eq!(received_body, body);
    }

    #[test]
    fn zero_length_body_forwards_header_only() {
        let (src_read_side, _src_write_side) = loopback_pair();
        let (dst_write_side, mut dst_read_side) = loopback_pair();

        let header = PacketHeader::new(PacketType::Test, 0, 0);
        let sent = splice(&src_read_side, &dst_write_side, &header).unwrap();
        assert_eq!(sent, 0);

        let mut received_header = [0u8; crate::header::HEADER_SIZE];
        crate::io::read_full(&mut dst_read_side, &mut received_header).unwrap();
        assert_eq!(PacketHeader::decode(&received_header), header);
    }
}
