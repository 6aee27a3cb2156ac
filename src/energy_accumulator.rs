use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulated energy: whole kilowatt-hours plus the pulses counted towards
/// the next one.
///
/// Both halves are packed into a single atomic word, so a reader always gets
/// a consistent pair and can never observe a carry half-applied (e.g. the
/// remainder at the threshold without the whole count advanced).
pub struct EnergyAccumulator {
    state: AtomicU64,
}

fn pack(kwh: u32, sub_pulses: u32) -> u64 {
    ((kwh as u64) << 32) | sub_pulses as u64
}

fn unpack(bits: u64) -> (u32, u32) {
    ((bits >> 32) as u32, bits as u32)
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
        }
    }

    /// Counts one pulse towards the next whole kilowatt-hour. When the
    /// remainder reaches `pulses_per_kwh` it carries: the whole count advances
    /// and the remainder keeps only the overflow beyond the threshold.
    pub fn add_pulse(&self, pulses_per_kwh: u32) {
        let threshold = pulses_per_kwh.max(1) as u64;
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let (kwh, sub_pulses) = unpack(bits);
                let total = sub_pulses as u64 + 1;
                Some(pack(
                    kwh + (total / threshold) as u32,
                    (total % threshold) as u32,
                ))
            });
    }

    /// Presets the whole kilowatt-hour count, typically to match the physical
    /// meter's register. The pulse remainder is left untouched.
    pub fn set_whole_kwh(&self, kwh: u32) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let (_, sub_pulses) = unpack(bits);
                Some(pack(kwh, sub_pulses))
            });
    }

    /// Returns `(whole_kwh, sub_pulses)` as one consistent pair.
    pub fn snapshot(&self) -> (u32, u32) {
        unpack(self.state.load(Ordering::Acquire))
    }
}

impl Default for EnergyAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
