//! Timing utilities for the frame loop.
//!
//! The overlay cache is re-rasterized on a fixed cadence that is decoupled
//! from the source frame rate. [`RefreshTimer`] decides, per loop iteration,
//! whether that cadence has elapsed.

use std::time::{Duration, Instant};

/// Interval-based trigger for periodic work inside a hot loop.
#[derive(Debug)]
pub struct RefreshTimer {
    interval: Duration,
    last_fire: Option<Instant>,
}

impl RefreshTimer {
    /// Shortest interval the timer accepts. Rebuilding overlays more often
    /// than this would put rasterization back on the per-frame path.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Create a timer firing at most once per `interval`.
    ///
    /// Intervals below [`Self::MIN_INTERVAL`] are raised to it.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Self::MIN_INTERVAL),
            last_fire: None,
        }
    }

    /// Check whether the interval has elapsed at `now`.
    /// Returns true and records the fire time if so.
    /// The first call always returns true.
    pub fn should_fire_at(&mut self, now: Instant) -> bool {
        match self.last_fire {
            None => {
                self.last_fire = Some(now);
                true
            }
            Some(last) if now.saturating_duration_since(last) >= self.interval => {
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Record an out-of-band fire (e.g. an on-demand rebuild) so the next
    /// periodic fire is measured from `now`.
    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fire = Some(now);
    }

    /// Effective interval after clamping.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_check_fires() {
        let mut timer = RefreshTimer::new(Duration::from_millis(1000));
        assert!(timer.should_fire_at(Instant::now()));
    }

    #[test]
    fn test_fires_only_after_interval() {
        let start = Instant::now();
        let mut timer = RefreshTimer::new(Duration::from_millis(1000));
        assert!(timer.should_fire_at(start));
        assert!(!timer.should_fire_at(start + Duration::from_millis(10)));
        assert!(!timer.should_fire_at(start + Duration::from_millis(999)));
        assert!(timer.should_fire_at(start + Duration::from_millis(1000)));
        assert!(!timer.should_fire_at(start + Duration::from_millis(1500)));
        assert!(timer.should_fire_at(start + Duration::from_millis(2100)));
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let timer = RefreshTimer::new(Duration::from_millis(50));
        assert_eq!(timer.interval(), RefreshTimer::MIN_INTERVAL);

        let timer = RefreshTimer::new(Duration::from_millis(2500));
        assert_eq!(timer.interval(), Duration::from_millis(2500));
    }

    #[test]
    fn test_mark_fired_defers_next_fire() {
        let start = Instant::now();
        let mut timer = RefreshTimer::new(Duration::from_millis(1000));
        assert!(timer.should_fire_at(start));
        timer.mark_fired(start + Duration::from_millis(800));
        assert!(!timer.should_fire_at(start + Duration::from_millis(1200)));
        assert!(timer.should_fire_at(start + Duration::from_millis(1800)));
    }
}
