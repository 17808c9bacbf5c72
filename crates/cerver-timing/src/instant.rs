use std::time::Instant as StdInstant;

use crate::Duration;

/// Monotonic point in time, backed by [`std::time::Instant`].
///
/// `std::time::Instant` has no meaningful "zero" value to use as a
/// sentinel, so [`Repeater`](crate::Repeater) tracks "never fired" with
/// `Option<Instant>` instead of an `Instant::ZERO` constant.
#[derive(Copy, Clone, Debug)]
pub struct Instant(StdInstant);

impl Instant {
    #[inline]
    pub fn now() -> Self {
        Self(StdInstant::now())
    }

    #[inline]
    pub fn elapsed(self) -> Duration {
        Duration::from(self.0.elapsed())
    }

    #[inline]
    pub fn duration_since(self, earlier: Instant) -> Duration {
        Duration::from(self.0.saturating_duration_since(earlier.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_nonzero_after_sleep() {
        let t0 = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(t0.elapsed().0 > 0);
    }
}
