use crate::{Duration, Instant};

/// Fires at most once per `interval`, used to gate the reconnect
/// supervisor's retry attempts without a dedicated timer thread.
///
/// `last_acted: None` means "never fired yet" and is always due. A
/// zero-value sentinel doesn't work here since `std::time::Instant` has
/// no representable zero value.
#[derive(Clone, Copy, Debug)]
pub struct Repeater {
    interval: Duration,
    last_acted: Option<Instant>,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Duration) -> Self {
        Self { interval, last_acted: None }
    }

    /// Returns `true` and resets the timer if `interval` has elapsed (or
    /// this is the first call).
    #[inline]
    pub fn fired(&mut self) -> bool {
        let due = match self.last_acted {
            None => true,
            Some(t) => t.elapsed() >= self.interval,
        };
        if due {
            self.last_acted = Some(Instant::now());
        }
        due
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn reset(&mut self) {
        self.last_acted = Some(Instant::now());
    }

    /// Forces the next `fired()` call to return `true`.
    pub fn force_fire(&mut self) {
        self.last_acted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_immediately_on_first_call() {
        let mut r = Repeater::every(Duration::from_secs(1));
        assert!(r.fired());
    }

    #[test]
    fn does_not_fire_again_before_interval_elapses() {
        let mut r = Repeater::every(Duration::from_secs(1));
        assert!(r.fired());
        assert!(!r.fired());
    }

    #[test]
    fn force_fire_makes_next_call_due() {
        let mut r = Repeater::every(Duration::from_secs(1));
        assert!(r.fired());
        r.force_fire();
        assert!(r.fired());
    }
}
