use std::sync::atomic::{AtomicU32, Ordering};

/// Consecutive empty windows tolerated before the meter is considered faulted.
/// A live installation sees at least some pulses per window, so a long silent
/// streak points at the sensor or its cabling.
const MISSING_PULSES_THRESHOLD: u32 = 10;

/// Tracks consecutive measurement windows that drained zero pulses.
///
/// Written once per window by the periodic context, read at any time by
/// status queries.
pub struct FailureDetector {
    consecutive_empty_windows: AtomicU32,
    threshold: u32,
}

impl FailureDetector {
    pub fn new() -> Self {
        Self::with_threshold(MISSING_PULSES_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            consecutive_empty_windows: AtomicU32::new(0),
            threshold,
        }
    }

    /// Feeds the pulse count drained by one completed window.
    pub fn on_window_pulses(&self, window_pulses: u64) {
        if window_pulses == 0 {
            self.consecutive_empty_windows.fetch_add(1, Ordering::Relaxed);
        } else {
            self.consecutive_empty_windows.store(0, Ordering::Relaxed);
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.consecutive_empty_windows.load(Ordering::Relaxed) > self.threshold
    }

    pub fn consecutive_empty_windows(&self) -> u32 {
        self.consecutive_empty_windows.load(Ordering::Relaxed)
    }
}

impl Default for FailureDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_detector_is_healthy() {
        let detector = FailureDetector::new();
        assert!(!detector.is_faulted());
        assert_eq!(detector.consecutive_empty_windows(), 0);
    }

    #[test]
    fn test_empty_window_increments_by_one() {
        let detector = FailureDetector::new();
        detector.on_window_pulses(0);
        assert_eq!(detector.consecutive_empty_windows(), 1);
        detector.on_window_pulses(0);
        assert_eq!(detector.consecutive_empty_windows(), 2);
    }

    #[test]
    fn test_pulses_reset_the_streak() {
        let detector = FailureDetector::new();
        for _ in 0..5 {
            detector.on_window_pulses(0);
        }
        detector.on_window_pulses(1);
        assert_eq!(detector.consecutive_empty_windows(), 0);
        assert!(!detector.is_faulted());
    }

    #[test]
    fn test_fault_raised_strictly_above_threshold() {
        let detector = FailureDetector::new();

        for _ in 0..10 {
            detector.on_window_pulses(0);
        }
        assert!(!detector.is_faulted());

        detector.on_window_pulses(0);
        assert!(detector.is_faulted());
    }

    #[test]
    fn test_fault_clears_once_pulses_return() {
        let detector = FailureDetector::new();
        for _ in 0..20 {
            detector.on_window_pulses(0);
        }
        assert!(detector.is_faulted());

        detector.on_window_pulses(37);
        assert!(!detector.is_faulted());
    }
}
