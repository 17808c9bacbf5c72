use core_affinity::CoreId;
use tracing::warn;

/// Pins the calling thread to `core`, if given. Every worker thread the
/// balancer spawns (connector, ingress, egress, reconnect) goes through
/// this so that `BalancerConfig::core_pins` has a single place it takes
/// effect, rather than each spawn site calling `core_affinity` itself.
pub fn thread_boot(core: Option<usize>) {
    let Some(core) = core else {
        return;
    };
    if !core_affinity::set_for_current(CoreId { id: core }) {
        warn!(?core, "couldn't set core affinity");
    }
}
