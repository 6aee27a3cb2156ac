use crate::energy_accumulator::EnergyAccumulator;
use crate::failure_detector::FailureDetector;
use crate::pulse_counter::PulseCounter;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// The published outcome of one completed measurement window. Replaced
/// wholesale on each firing; the previous value stays visible until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowResult {
    pub watts: u64,
    pub pulses: u64,
    pub period_secs: u32,
}

/// Point-in-time view of the meter, assembled per status query. The sources
/// update independently, so watts and kWh are each the freshest value rather
/// than a reading taken at a single instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub watts: u64,
    pub kwh: String,
    pub faulted: bool,
}

/// Shared meter state wired into all three execution contexts: the edge-event
/// path appends pulses through a [`PulseSink`], the periodic window drains and
/// publishes, and status queries read whatever is current.
pub struct MeterState {
    window_pulses: PulseCounter,
    energy: EnergyAccumulator,
    failure: FailureDetector,
    last_window: Mutex<WindowResult>,
    measurement_period_secs: AtomicU32,
    pulses_per_kwh: AtomicU32,
    device_id: String,
}

impl MeterState {
    /// Creates the meter with its startup configuration. Both `period_secs`
    /// and `pulses_per_kwh` must be positive; every write surface validates
    /// before values land here.
    pub fn new(period_secs: u32, pulses_per_kwh: u32, device_id: String) -> Self {
        Self {
            window_pulses: PulseCounter::new(),
            energy: EnergyAccumulator::new(),
            failure: FailureDetector::new(),
            last_window: Mutex::new(WindowResult::default()),
            measurement_period_secs: AtomicU32::new(period_secs),
            pulses_per_kwh: AtomicU32::new(pulses_per_kwh),
            device_id,
        }
    }

    /// Handle for the edge-event context. The sink exposes nothing beyond the
    /// non-blocking pulse path.
    pub fn pulse_sink(self: Arc<Self>) -> PulseSink {
        PulseSink { state: self }
    }

    /// One rising edge: count it for the current window and accumulate it as
    /// energy. Two atomic updates, no locks.
    pub fn record_pulse(&self) {
        self.window_pulses.increment();
        self.energy.add_pulse(self.pulses_per_kwh());
    }

    /// Takes the pulses of the closing window, leaving zero for the next one.
    /// Called only by the periodic context.
    pub fn drain_window_pulses(&self) -> u64 {
        self.window_pulses.drain_and_reset()
    }

    /// Publishes a completed window and updates the missing-pulse streak.
    pub fn publish_window(&self, result: WindowResult) {
        *self.last_window.lock().unwrap() = result;
        self.failure.on_window_pulses(result.pulses);
    }

    pub fn latest_window(&self) -> WindowResult {
        *self.last_window.lock().unwrap()
    }

    pub fn measurement_period(&self) -> u32 {
        self.measurement_period_secs.load(Ordering::Relaxed)
    }

    /// Takes effect when the next window is armed, not retroactively.
    pub fn set_measurement_period(&self, secs: u32) {
        self.measurement_period_secs.store(secs, Ordering::Relaxed);
    }

    pub fn pulses_per_kwh(&self) -> u32 {
        self.pulses_per_kwh.load(Ordering::Relaxed)
    }

    /// Takes effect from the next pulse onwards.
    pub fn set_pulses_per_kwh(&self, pulses: u32) {
        self.pulses_per_kwh.store(pulses, Ordering::Relaxed);
    }

    /// Presets the whole-kWh register, e.g. to match the physical meter.
    pub fn set_whole_kwh(&self, kwh: u32) {
        self.energy.set_whole_kwh(kwh);
    }

    pub fn energy_snapshot(&self) -> (u32, u32) {
        self.energy.snapshot()
    }

    pub fn is_faulted(&self) -> bool {
        self.failure.is_faulted()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Formats accumulated energy as whole kWh plus a truncated two-digit
    /// fraction, e.g. 1 kWh and 5000/10000 pulses renders as `"1.50"`.
    pub fn kwh_display(&self) -> String {
        let (kwh, sub_pulses) = self.energy.snapshot();
        let hundredths = (sub_pulses as u64 * 100 / self.pulses_per_kwh() as u64).min(99);
        format!("{kwh}.{hundredths:02}")
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            watts: self.latest_window().watts,
            kwh: self.kwh_display(),
            faulted: self.is_faulted(),
        }
    }
}

/// Minimal surface handed to the edge-event context; every operation behind it
/// is a non-blocking atomic update, so the handler can never stall on a lock
/// held by the periodic or query contexts.
#[derive(Clone)]
pub struct PulseSink {
    state: Arc<MeterState>,
}

impl PulseSink {
    pub fn record_pulse(&self) {
        self.state.record_pulse();
    }
}
