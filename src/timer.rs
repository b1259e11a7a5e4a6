//! Debounce timers for charge start/stop hysteresis
//!
//! A condition must hold continuously for a configured dwell time before the
//! controller acts on it, so a single noisy sample never flips the charge
//! state.

use tokio::time::{Duration, Instant};

/// A small arm-on-first-true / due-after-delay / clear-on-false timer.
///
/// The first tick where the condition is true arms the timer and reports not
/// yet due. Subsequent ticks with the condition held report due once `now`
/// reaches the deadline, and keep reporting due until the condition drops.
/// Any tick with the condition false disarms the timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebounceTimer {
    deadline: Option<Instant>,
}

impl DebounceTimer {
    /// Create a disarmed timer
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Advance the timer with the current condition and report whether the
    /// dwell time has elapsed
    pub fn poll(&mut self, condition: bool, delay: Duration, now: Instant) -> bool {
        if !condition {
            self.deadline = None;
            return false;
        }
        match self.deadline {
            None => {
                self.deadline = Some(now + delay);
                false
            }
            Some(deadline) => now >= deadline,
        }
    }

    /// Disarm the timer so the next true condition starts a fresh dwell
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Whether the timer is currently armed
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_true_arms_without_reporting_due() {
        let mut timer = DebounceTimer::new();
        let now = Instant::now();
        assert!(!timer.poll(true, Duration::from_secs(10), now));
        assert!(timer.is_armed());
    }

    #[test]
    fn due_after_delay_and_stays_due() {
        let mut timer = DebounceTimer::new();
        let now = Instant::now();
        let delay = Duration::from_secs(10);
        assert!(!timer.poll(true, delay, now));
        assert!(!timer.poll(true, delay, now + Duration::from_secs(5)));
        assert!(timer.poll(true, delay, now + Duration::from_secs(10)));
        assert!(timer.poll(true, delay, now + Duration::from_secs(60)));
    }

    #[test]
    fn false_condition_disarms_and_restarts_dwell() {
        let mut timer = DebounceTimer::new();
        let now = Instant::now();
        let delay = Duration::from_secs(10);
        assert!(!timer.poll(true, delay, now));
        assert!(!timer.poll(false, delay, now + Duration::from_secs(20)));
        assert!(!timer.is_armed());
        // The next true arms a fresh dwell from that instant
        assert!(!timer.poll(true, delay, now + Duration::from_secs(21)));
        assert!(!timer.poll(true, delay, now + Duration::from_secs(30)));
        assert!(timer.poll(true, delay, now + Duration::from_secs(31)));
    }

    #[test]
    fn clear_disarms() {
        let mut timer = DebounceTimer::new();
        let now = Instant::now();
        timer.poll(true, Duration::from_secs(1), now);
        timer.clear();
        assert!(!timer.is_armed());
        assert!(!timer.poll(true, Duration::from_secs(1), now + Duration::from_secs(5)));
    }

    #[test]
    fn zero_delay_is_due_on_second_tick() {
        let mut timer = DebounceTimer::new();
        let now = Instant::now();
        assert!(!timer.poll(true, Duration::ZERO, now));
        assert!(timer.poll(true, Duration::ZERO, now));
    }
}
