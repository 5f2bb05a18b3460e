//! Reconnect delay schedule.

use std::time::Duration;

/// Delay before reconnect attempt `attempt` (1-based).
///
/// Grows linearly with the attempt number and is capped:
/// `min(attempt × base_ms, cap_ms)`. The attempt counter restarts after a
/// successful reconnect, so every outage pays the schedule from the start.
pub fn reconnect_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }
    let delay_ms = u64::from(attempt).saturating_mul(base_ms);
    Duration::from_millis(delay_ms.min(cap_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_linearly() {
        assert_eq!(
            reconnect_delay(1, 1000, 10_000),
            Duration::from_millis(1000)
        );
        assert_eq!(
            reconnect_delay(3, 1000, 10_000),
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn test_delay_is_capped() {
        assert_eq!(
            reconnect_delay(50, 1000, 10_000),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            reconnect_delay(u32::MAX, u64::MAX, 7),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn test_zero_attempt_has_no_delay() {
        assert_eq!(reconnect_delay(0, 1000, 10_000), Duration::from_millis(0));
    }
}
