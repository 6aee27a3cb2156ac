use std::sync::atomic::{AtomicU64, Ordering};

/// Pulses observed since the last window drain.
///
/// Incremented from the edge-event context, drained exactly once per
/// measurement window by the periodic task. The count never decreases except
/// through `drain_and_reset`.
pub struct PulseCounter {
    count: AtomicU64,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    /// Counts one rising edge. Safe to call from the edge-event context: a
    /// single atomic add, no blocking, no allocation.
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Reads the current count and resets it to zero in one atomic step, so
    /// increments racing the drain land in the next window instead of being
    /// lost.
    pub fn drain_and_reset(&self) -> u64 {
        self.count.swap(0, Ordering::Acquire)
    }

    /// Current count without draining.
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_counter_is_zero() {
        let counter = PulseCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.drain_and_reset(), 0);
    }

    #[test]
    fn test_increment_and_drain() {
        let counter = PulseCounter::new();
        for _ in 0..100 {
            counter.increment();
        }
        assert_eq!(counter.current(), 100);
        assert_eq!(counter.drain_and_reset(), 100);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_drain_resets_for_next_window() {
        let counter = PulseCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.drain_and_reset(), 2);
        counter.increment();
        assert_eq!(counter.drain_and_reset(), 1);
    }

    #[test]
    fn test_concurrent_increments_are_never_lost() {
        const WRITERS: usize = 4;
        const PULSES_PER_WRITER: u64 = 50_000;

        let counter = Arc::new(PulseCounter::new());
        let mut drained = 0u64;

        let writers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..PULSES_PER_WRITER {
                        counter.increment();
                    }
                })
            })
            .collect();

        // Drain repeatedly while the writers are still running, like the
        // periodic context does.
        for _ in 0..1000 {
            drained += counter.drain_and_reset();
        }

        for writer in writers {
            writer.join().unwrap();
        }
        drained += counter.drain_and_reset();

        assert_eq!(drained, WRITERS as u64 * PULSES_PER_WRITER);
    }
}
