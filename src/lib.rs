//! Pulse Power Meter Library
//!
//! This library derives instantaneous power (watts) and accumulated energy
//! (kilowatt-hours) from the rising-edge pulses of a utility meter sensor:
//! a GPIO listener feeds a shared meter state, a periodic measurement window
//! turns pulse counts into power readings, and an HTTP status interface
//! exposes the current snapshot.

pub mod energy_accumulator;
pub mod failure_detector;
pub mod measurement_window;
pub mod meter_state;
pub mod pulse_counter;
pub mod pulse_listener;
pub mod status_server;

// Re-export commonly used types for easier access
pub use energy_accumulator::EnergyAccumulator;
pub use failure_detector::FailureDetector;
pub use measurement_window::{calculate_power_from_pulses, MeasurementWindow, MeasurementWindowHandle};
pub use meter_state::{MeterState, PulseSink, StatusSnapshot, WindowResult};
pub use pulse_counter::PulseCounter;
pub use pulse_listener::{GpioPulseListener, PulseListenerHandle};
