//! Periodic status reporting
//!
//! Formats a compact snapshot of the controller's view and decides, on its
//! own elapsed-time cadence, when the next one is owed. Publishing is left
//! to the caller so this stays side-effect free.

use tokio::time::{Duration, Instant};

/// The fields carried by one status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFields {
    /// Charging is allowed by the external policy state
    pub enabled: bool,

    /// A charge-delay window is active
    pub delayed: bool,

    /// The controller believes current is flowing
    pub charging: bool,

    /// Rounded metered charge current in amps
    pub metered_a: i64,

    /// Floored target rate from the latest estimate in amps
    pub target_a: i64,
}

/// Render the status line published to the event bus
pub fn format_status(fields: &StatusFields) -> String {
    format!(
        "Status: En:{} Dly:{} Chg:{} Cur:{} New:{}",
        fields.enabled as u8,
        fields.delayed as u8,
        fields.charging as u8,
        fields.metered_a,
        fields.target_a
    )
}

/// Tracks when the next status line is due, independent of the tick rate
#[derive(Debug)]
pub struct StatusReporter {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl StatusReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Whether a status line is owed now. The first call is always due so a
    /// fresh process reports immediately.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now < last + self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_format() {
        let line = format_status(&StatusFields {
            enabled: true,
            delayed: false,
            charging: true,
            metered_a: 12,
            target_a: 13,
        });
        assert_eq!(line, "Status: En:1 Dly:0 Chg:1 Cur:12 New:13");

        let line = format_status(&StatusFields::default());
        assert_eq!(line, "Status: En:0 Dly:0 Chg:0 Cur:0 New:0");
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_is_independent_of_call_rate() {
        let mut reporter = StatusReporter::new(Duration::from_secs(60));
        let start = Instant::now();
        assert!(reporter.due(start));
        assert!(!reporter.due(start + Duration::from_secs(1)));
        assert!(!reporter.due(start + Duration::from_secs(59)));
        assert!(reporter.due(start + Duration::from_secs(60)));
        assert!(!reporter.due(start + Duration::from_secs(61)));
        assert!(reporter.due(start + Duration::from_secs(125)));
    }
}
