//! Fixed 16-byte packet header codec.
//!
//! The wire layout matches the balancer protocol exactly:
//!
//! ```text
//! offset  size  field
//! 0       2     packet_type
//! 2       2     request_type
//! 4       4     packet_size   (total bytes, including header; must be >= 16)
//! 8       4     sock_fd       (routing tag)
//! 12      4     reserved      (zero on send, ignored on receive)
//! ```
//!
//! No endianness swap is performed: the balancer and every service it
//! fronts are assumed to run on the same machine architecture, so the
//! wire byte order is simply the host's native order.

/// Size of the packet header on the wire, in bytes.
pub const HEADER_SIZE: usize = 16;

/// Enumerates the packet kinds carried in [`PacketHeader::packet_type`].
///
/// Decoding is total: any `u16` outside this set (or the literal `BAD`
/// discriminant) decodes to [`PacketType::Bad`] rather than failing, so
/// [`PacketHeader::decode`] never has to reject a header on this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketType {
    None = 0,
    Cerver = 1,
    Client = 2,
    Error = 3,
    Auth = 4,
    Request = 5,
    Game = 6,
    App = 7,
    AppError = 8,
    Custom = 9,
    Test = 10,
    Bad = 11,
}

impl PacketType {
    /// Number of distinct variants, used to size per-packet-type counter
    /// arrays in `cerver::stats`.
    pub const COUNT: usize = 12;

    /// Stable index into a `[T; PacketType::COUNT]` counter array.
    #[inline]
    pub fn index(self) -> usize {
        self as u16 as usize
    }

    #[inline]
    fn from_wire(v: u16) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Cerver,
            2 => Self::Client,
            3 => Self::Error,
            4 => Self::Auth,
            5 => Self::Request,
            6 => Self::Game,
            7 => Self::App,
            8 => Self::AppError,
            9 => Self::Custom,
            10 => Self::Test,
            _ => Self::Bad,
        }
    }

    #[inline]
    const fn to_wire(self) -> u16 {
        self as u16
    }

    /// Packets of these types are only ever consumed locally by the
    /// balancer (auth, control chatter); they are never spliced onward.
    #[inline]
    pub fn is_balancer_local(self) -> bool {
        matches!(self, Self::Client | Self::Auth)
    }

    /// Packets of these types are forwarded between client and service
    /// verbatim once a route is established.
    #[inline]
    pub fn is_routable(self) -> bool {
        matches!(
            self,
            Self::Cerver
                | Self::Error
                | Self::Request
                | Self::Game
                | Self::App
                | Self::AppError
                | Self::Custom
        )
    }
}

/// A fully decoded 16-byte packet header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    pub request_type: u16,
    pub packet_size: u32,
    pub sock_fd: u32,
    pub reserved: u32,
}

impl PacketHeader {
    /// Builds a header for a packet with no body (e.g. the `TEST` health
    /// check, or an error packet before its message bytes are appended).
    pub fn new(packet_type: PacketType, request_type: u16, body_len: u32) -> Self {
        Self {
            packet_type,
            request_type,
            packet_size: HEADER_SIZE as u32 + body_len,
            sock_fd: 0,
            reserved: 0,
        }
    }

    /// Total over any 16-byte slice; never fails, never allocates.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let packet_type = PacketType::from_wire(u16::from_ne_bytes([buf[0], buf[1]]));
        let request_type = u16::from_ne_bytes([buf[2], buf[3]]);
        let packet_size = u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let sock_fd = u32::from_ne_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let reserved = u32::from_ne_bytes([buf[12], buf[13], buf[14], buf[15]]);
        Self { packet_type, request_type, packet_size, sock_fd, reserved }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..2].copy_from_slice(&self.packet_type.to_wire().to_ne_bytes());
        out[2..4].copy_from_slice(&self.request_type.to_ne_bytes());
        out[4..8].copy_from_slice(&self.packet_size.to_ne_bytes());
        out[8..12].copy_from_slice(&self.sock_fd.to_ne_bytes());
        out[12..16].copy_from_slice(&self.reserved.to_ne_bytes());
        out
    }

    /// `packet_size < 16` is a protocol violation: the header claims a
    /// packet smaller than itself.
    #[inline]
    pub fn has_valid_size(&self) -> bool {
        self.packet_size as usize >= HEADER_SIZE
    }

    /// Number of body bytes following the header, per `packet_size`.
    ///
    /// Only meaningful when [`has_valid_size`](Self::has_valid_size) is `true`.
    #[inline]
    pub fn body_len(&self) -> u32 {
        self.packet_size.saturating_sub(HEADER_SIZE as u32)
    }

    /// Returns a copy of this header with `sock_fd` overwritten, used by
    /// the ingress handler to tag a packet with the originating client's
    /// socket before routing it to a service.
    #[inline]
    #[must_use]
    pub fn with_sock_fd(mut self, sock_fd: u32) -> Self {
        self.sock_fd = sock_fd;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let header = PacketHeader { packet_type: PacketType::App, request_type: 42, packet_size: 32, sock_fd: 7, reserved: 0 };
        let decoded = PacketHeader::decode(&header.encode());
        assert_eq!(header, decoded);
    }

    #[test]
    fn decode_is_total_for_unknown_packet_type() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&255u16.to_ne_bytes());
        let decoded = PacketHeader::decode(&buf);
        assert_eq!(decoded.packet_type, PacketType::Bad);
    }

    #[test]
    fn rejects_packet_size_smaller_than_header() {
        let header = PacketHeader::new(PacketType::App, 0, 0);
        assert!(header.has_valid_size());

        let mut too_small = header;
        too_small.packet_size = 4;
        assert!(!too_small.has_valid_size());
    }

    #[test]
    fn body_len_is_packet_size_minus_header() {
        let header = PacketHeader::new(PacketType::App, 0, 16);
        assert_eq!(header.body_len(), 16);
    }

    #[test]
    fn with_sock_fd_overwrites_routing_tag() {
        let header = PacketHeader::new(PacketType::App, 0, 0).with_sock_fd(9);
        assert_eq!(header.sock_fd, 9);
    }
}
