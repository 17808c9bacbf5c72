use std::{
    ops::Sub,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::Duration;

/// Nanoseconds since the Unix epoch.
///
/// Used to timestamp log lines and to measure send-to-receive latency for
/// a routed packet. Good till the year 2554 or so.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nanos(pub u64);

impl Nanos {
    pub const ZERO: Nanos = Nanos(0);

    #[inline]
    pub fn now() -> Self {
        let since_epoch =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(std::time::Duration::ZERO);
        Self(since_epoch.as_nanos() as u64)
    }

    #[inline]
    pub const fn from_secs(s: u64) -> Self {
        Self(s * 1_000_000_000)
    }
}

impl Sub for Nanos {
    type Output = Duration;
    fn sub(self, rhs: Nanos) -> Self::Output {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Display for Nanos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonically_nondecreasing() {
        let a = Nanos::now();
        let b = Nanos::now();
        assert!(b >= a);
    }

    #[test]
    fn subtraction_saturates_instead_of_underflowing() {
        let earlier = Nanos(100);
        let later = Nanos(50);
        assert_eq!(earlier - later, Duration::ZERO);
    }
}
