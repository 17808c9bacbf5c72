//! Listening-socket setup with an explicit backlog.
//!
//! `std::net::TcpListener::bind` always asks the kernel for a fixed
//! backlog (128 on Linux), with no way to override it. A balancer facing
//! a bursty accept rate needs that knob, so this goes around `std` the
//! same way the splicer does: raw `libc` socket calls, wrapped back into
//! a `std::net::TcpListener` once `listen(2)` succeeds.

use std::{
    io,
    net::{SocketAddr, TcpListener},
    os::fd::FromRawFd,
};

/// Binds and listens on `addr` with the given `backlog`, returning a
/// standard `TcpListener` once the raw socket is ready to `accept`.
pub fn bind_with_backlog(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { libc::AF_INET6 } else { libc::AF_INET };
    let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let listener = unsafe { TcpListener::from_raw_fd(fd) };

    let one: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            std::ptr::from_ref(&one).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    bind_raw(fd, addr)?;

    let rc = unsafe { libc::listen(fd, backlog) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(listener)
}

fn bind_raw(fd: libc::c_int, addr: SocketAddr) -> io::Result<()> {
    match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr { s_addr: u32::from_ne_bytes(v4.ip().octets()) },
                sin_zero: [0; 8],
            };
            let rc = unsafe {
                libc::bind(
                    fd,
                    std::ptr::from_ref(&sin).cast(),
                    std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                )
            };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: 0,
                sin6_addr: libc::in6_addr { s6_addr: v6.ip().octets() },
                sin6_scope_id: 0,
            };
            let rc = unsafe {
                libc::bind(
                    fd,
                    std::ptr::from_ref(&sin6).cast(),
                    std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                )
            };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }
    Ok(())
}
