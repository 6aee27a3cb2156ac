use crate::meter_state::{MeterState, WindowResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Watt-seconds in one kilowatt-hour.
const WATT_SECONDS_PER_KWH: u64 = 3_600_000;

/// Derives instantaneous watts from the pulses drained out of one window.
///
/// Both divisions truncate, in this exact order, to stay bit-compatible with
/// the readings deployed installations already log. An empty window, or a
/// divisor that truncates to zero (a period of zero, or more pulses in the
/// window than pulses-per-kWh), yields 0 rather than a fault.
pub fn calculate_power_from_pulses(window_pulses: u64, period_secs: u32, pulses_per_kwh: u32) -> u64 {
    if window_pulses == 0 {
        return 0;
    }
    let energy_rate = match WATT_SECONDS_PER_KWH.checked_div(period_secs as u64) {
        Some(rate) => rate,
        None => return 0,
    };
    match energy_rate.checked_div(pulses_per_kwh as u64 / window_pulses) {
        Some(watts) => watts,
        None => 0,
    }
}

/// The periodic measurement task: re-arms itself for the configured period,
/// then drains the pulse counter and publishes a power reading.
pub struct MeasurementWindow {
    state: Arc<MeterState>,
}

impl MeasurementWindow {
    pub fn new(state: Arc<MeterState>) -> Self {
        Self { state }
    }

    /// Spawns the window task. The returned handle is the only way to stop
    /// it; dropping the handle leaves the task running for the process
    /// lifetime.
    pub fn spawn(self) -> MeasurementWindowHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        MeasurementWindowHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            // Arm with the currently configured period; a mid-flight change
            // applies from the next window onwards.
            let period_secs = self.state.measurement_period();
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(Duration::from_secs(period_secs as u64)) => {
                    self.complete_window(period_secs);
                }
            }
        }
        println!("Measurement window stopped");
    }

    fn complete_window(&self, period_secs: u32) {
        let window_pulses = self.state.drain_window_pulses();
        let watts = calculate_power_from_pulses(
            window_pulses,
            period_secs,
            self.state.pulses_per_kwh(),
        );
        self.state.publish_window(WindowResult {
            watts,
            pulses: window_pulses,
            period_secs,
        });
    }
}

pub struct MeasurementWindowHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MeasurementWindowHandle {
    /// Stops the periodic timer, waiting for an in-flight firing to finish
    /// rather than interrupting it. No window completes after this returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            eprintln!("Measurement window task failed: {e}");
        }
    }
}
