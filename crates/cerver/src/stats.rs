//! Balancer- and service-level counters (`Balancer::log_stats` does the
//! reporting).
//!
//! Balancer-wide aggregates are written from many threads (every ingress
//! and egress handler) and so are plain `AtomicU64`s, updated with
//! ordinary atomic adds rather than a shared lock. Per-service counters
//! are likewise atomic: although each service has exactly one egress
//! reader, the ingress side also increments `packets_routed`/
//! `bytes_routed` on that same `ServiceStats` from whichever client
//! thread last picked it.

use std::sync::atomic::{AtomicU64, Ordering};

use cerver_network::PacketType;

const REL: Ordering = Ordering::Relaxed;

#[derive(Debug, Default)]
pub struct PacketTypeCounts {
    counts: [AtomicU64; PacketType::COUNT],
}

impl PacketTypeCounts {
    pub fn new() -> Self {
        Self { counts: std::array::from_fn(|_| AtomicU64::new(0)) }
    }

    pub fn incr(&self, packet_type: PacketType) {
        self.counts[packet_type.index()].fetch_add(1, REL);
    }

    pub fn get(&self, packet_type: PacketType) -> u64 {
        self.counts[packet_type.index()].load(REL)
    }
}

#[derive(Debug, Default)]
pub struct ServiceStats {
    pub packets_routed: AtomicU64,
    pub bytes_routed: AtomicU64,
    pub packets_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bad_packets_received: AtomicU64,
    pub bad_bytes_received: AtomicU64,
    pub routed_by_type: PacketTypeCounts,
    pub received_by_type: PacketTypeCounts,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_routed(&self, bytes: u64, packet_type: PacketType) {
        self.packets_routed.fetch_add(1, REL);
        self.bytes_routed.fetch_add(bytes, REL);
        self.routed_by_type.incr(packet_type);
    }

    pub fn record_received(&self, bytes: u64, packet_type: PacketType) {
        self.packets_received.fetch_add(1, REL);
        self.bytes_received.fetch_add(bytes, REL);
        self.received_by_type.incr(packet_type);
    }

    /// Egress-side badness (an invalid header, or a `None`/`Bad` packet
    /// type from the service) is kept separate from the balancer-wide
    /// `bad_*` counters, which track only client-ingress receipt — the
    /// quiescence invariant `bytes_received == bytes_routed +
    /// unhandled_bytes + bad_bytes_received` is defined over that
    /// ingress accounting alone, so folding service-side badness into it
    /// would make the invariant fail on healthy traffic.
    pub fn record_bad(&self, bytes: u64) {
        self.bad_packets_received.fetch_add(1, REL);
        self.bad_bytes_received.fetch_add(bytes, REL);
    }
}

#[derive(Debug, Default)]
pub struct BalancerStats {
    pub receives_done: AtomicU64,
    pub packets_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bad_packets_received: AtomicU64,
    pub bad_bytes_received: AtomicU64,
    pub packets_routed: AtomicU64,
    pub bytes_routed: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub unhandled_packets: AtomicU64,
    pub unhandled_bytes: AtomicU64,
    pub received_by_type: PacketTypeCounts,
    pub routed_by_type: PacketTypeCounts,
    pub sent_by_type: PacketTypeCounts,
}

impl BalancerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, bytes: u64, packet_type: PacketType) {
        self.receives_done.fetch_add(1, REL);
        self.packets_received.fetch_add(1, REL);
        self.bytes_received.fetch_add(bytes, REL);
        self.received_by_type.incr(packet_type);
    }

    pub fn record_bad(&self, bytes: u64) {
        self.bad_packets_received.fetch_add(1, REL);
        self.bad_bytes_received.fetch_add(bytes, REL);
    }

    pub fn record_routed(&self, bytes: u64, packet_type: PacketType) {
        self.packets_routed.fetch_add(1, REL);
        self.bytes_routed.fetch_add(bytes, REL);
        self.routed_by_type.incr(packet_type);
    }

    pub fn record_sent(&self, bytes: u64, packet_type: PacketType) {
        self.packets_sent.fetch_add(1, REL);
        self.bytes_sent.fetch_add(bytes, REL);
        self.sent_by_type.incr(packet_type);
    }

    pub fn record_unhandled(&self, bytes: u64) {
        self.unhandled_packets.fetch_add(1, REL);
        self.unhandled_bytes.fetch_add(bytes, REL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balancer_stats_accumulate_across_records() {
        let stats = BalancerStats::new();
        stats.record_received(32, PacketType::App);
        stats.record_routed(32, PacketType::App);
        stats.record_unhandled(16);

        assert_eq!(stats.packets_received.load(REL), 1);
        assert_eq!(stats.bytes_received.load(REL), 32);
        assert_eq!(stats.packets_routed.load(REL), 1);
        assert_eq!(stats.unhandled_packets.load(REL), 1);
        assert_eq!(stats.unhandled_bytes.load(REL), 16);
        assert_eq!(stats.received_by_type.get(PacketType::App), 1);
    }

    #[test]
    fn service_stats_record_routed_and_received_independently() {
        let stats = ServiceStats::new();
        stats.record_routed(10, PacketType::App);
        stats.record_received(20, PacketType::Test);

        assert_eq!(stats.packets_routed.load(REL), 1);
        assert_eq!(stats.bytes_routed.load(REL), 10);
        assert_eq!(stats.routed_by_type.get(PacketType::App), 1);
        assert_eq!(stats.packets_received.load(REL), 1);
        assert_eq!(stats.bytes_received.load(REL), 20);
        assert_eq!(stats.received_by_type.get(PacketType::Test), 1);
    }

    #[test]
    fn service_stats_record_bad_is_independent_of_received() {
        let stats = ServiceStats::new();
        stats.record_bad(8);

        assert_eq!(stats.bad_packets_received.load(REL), 1);
        assert_eq!(stats.bad_bytes_received.load(REL), 8);
        assert_eq!(stats.packets_received.load(REL), 0);
    }
}
