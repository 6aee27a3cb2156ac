use anyhow::Context;
use measurement_window::MeasurementWindow;
use meter_state::MeterState;
use pulse_listener::GpioPulseListener;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

mod energy_accumulator;
mod failure_detector;
mod measurement_window;
mod meter_state;
mod pulse_counter;
mod pulse_listener;
mod status_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("Starting pulse power meter");

    let measurement_period = positive_env_or("MEASUREMENT_PERIOD", 30)?;
    let pulses_per_kwh = positive_env_or("PULSES_PER_KWH", 10_000)?;
    let device_id = std::env::var("DEVICE_ID").unwrap_or_else(|_| "PWR".to_string());

    let state = Arc::new(MeterState::new(
        measurement_period,
        pulses_per_kwh,
        device_id,
    ));

    // Claim the sensor line before anything starts measuring; an unavailable
    // line is fatal at startup rather than a silent zero reading.
    let listener = GpioPulseListener::from_env(state.clone().pulse_sink())?;
    let pulse_handle = listener.spawn();
    let window_handle = MeasurementWindow::new(state.clone()).spawn();

    println!(
        "Meter running: device-id=\"{}\", period={}s, pulses/kWh={}",
        state.device_id(),
        measurement_period,
        pulses_per_kwh
    );

    let listen_addr: SocketAddr = std::env::var("STATUS_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("STATUS_LISTEN must be a socket address like 0.0.0.0:8080")?;
    let http_listener = TcpListener::bind(listen_addr).await?;
    println!("Status interface listening on {listen_addr}");

    axum::serve(http_listener, status_server::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Detach the edge handler and stop the timer before the meter state goes
    // away with the process.
    pulse_handle.shutdown().await;
    window_handle.shutdown().await;
    println!("Pulse power meter stopped");

    Ok(())
}

fn positive_env_or(name: &str, default: u32) -> anyhow::Result<u32> {
    match std::env::var(name) {
        Ok(raw) => {
            let value: u32 = raw
                .parse()
                .with_context(|| format!("{name} must be a positive integer, got `{raw}`"))?;
            if value == 0 {
                anyhow::bail!("{name} must be a positive integer, got 0");
            }
            Ok(value)
        }
        Err(_) => Ok(default),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for shutdown signal: {e}");
    }
}
