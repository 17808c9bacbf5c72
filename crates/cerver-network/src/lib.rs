//! Wire framing and socket-transfer primitives shared by the balancer's
//! ingress and egress handlers.
//!
//! This crate owns the three concerns that sit directly on top of raw
//! sockets: decoding/encoding the fixed packet header ([`header`]),
//! retrying partial reads and writes to completion ([`io`]), and
//! forwarding a packet's body from one socket to another without an
//! extra userspace copy where the platform allows it ([`splice`]).

pub mod header;
pub mod io;
pub mod listen;
pub mod splice;

pub use header::{PacketHeader, PacketType, HEADER_SIZE};
pub use io::{drain, read_full, write_full, ConnState};
pub use listen::bind_with_backlog;
pub use splice::{splice, SpliceError};
