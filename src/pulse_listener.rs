use crate::meter_state::PulseSink;
use anyhow::Context;
use gpiocdev::line::EdgeDetection;
use gpiocdev::tokio::AsyncRequest;
use gpiocdev::Request;
use std::env;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";
const DEFAULT_GPIO_LINE: u32 = 23;
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Isolated task that turns rising edges on the sensor line into meter
/// pulses. Line acquisition happens up front, before any measurement starts;
/// the run loop only forwards events into the pulse sink.
pub struct GpioPulseListener {
    events: AsyncRequest,
    sink: PulseSink,
}

impl GpioPulseListener {
    /// Reserves the sensor line configured via `PULSE_GPIO_CHIP` and
    /// `PULSE_GPIO_LINE` for rising-edge events. Failure here is a startup
    /// error: without the line there is nothing to measure.
    pub fn from_env(sink: PulseSink) -> anyhow::Result<Self> {
        let chip = env::var("PULSE_GPIO_CHIP").unwrap_or_else(|_| DEFAULT_GPIO_CHIP.to_string());
        let line = match env::var("PULSE_GPIO_LINE") {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("PULSE_GPIO_LINE must be a line offset, got `{raw}`"))?,
            Err(_) => DEFAULT_GPIO_LINE,
        };

        let request = Request::builder()
            .on_chip(chip.as_str())
            .with_consumer("pulse_power_meter")
            .with_line(line)
            .with_edge_detection(EdgeDetection::RisingEdge)
            .request()
            .with_context(|| format!("Failed to reserve line {line} on {chip} for rising edges"))?;

        println!("Counting pulses on {chip} line {line}");

        Ok(Self {
            events: AsyncRequest::new(request),
            sink,
        })
    }

    /// Spawns the listener in its own task.
    pub fn spawn(self) -> PulseListenerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        PulseListenerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut consecutive_errors = 0u32;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = self.events.read_edge_event() => match event {
                    Ok(_) => {
                        consecutive_errors = 0;
                        self.sink.record_pulse();
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        eprintln!(
                            "Edge event read error ({}/{}): {}",
                            consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                        );
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            eprintln!("Too many consecutive edge read errors. Shutting down pulse listener.");
                            break;
                        }
                    }
                }
            }
        }

        println!("Pulse listener exiting");
    }
}

pub struct PulseListenerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PulseListenerHandle {
    /// Detaches from the sensor line and waits for the listener task to
    /// finish, so no pulse can arrive after this returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            eprintln!("Pulse listener task failed: {e}");
        }
    }
}
