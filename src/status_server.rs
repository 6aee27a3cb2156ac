use crate::meter_state::MeterState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Compact status document served at `/json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusJson {
    pub ws: u64,
    pub kwh: String,
    pub fail: u8,
}

/// Event-style status served at `/json_ev`, wrapped in a one-element array
/// and stamped with wall-clock time and the device identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStatusJson {
    pub timestamp: u64,
    #[serde(rename = "dev-id")]
    pub dev_id: String,
    pub watt: u64,
    pub kwh: String,
    pub fail: u8,
}

/// Builds the status router: scalar attributes as plain text, composed
/// snapshots as JSON. Writes validate before they touch the meter.
pub fn router(state: Arc<MeterState>) -> Router {
    Router::new()
        .route("/kwh", get(read_kwh).put(write_kwh))
        .route("/watt", get(read_watt))
        .route("/measurement_period", get(read_period).put(write_period))
        .route(
            "/pulses_per_kwh",
            get(read_pulses_per_kwh).put(write_pulses_per_kwh),
        )
        .route("/json", get(status_json))
        .route("/json_ev", get(event_status_json))
        .with_state(state)
}

async fn read_kwh(State(state): State<Arc<MeterState>>) -> String {
    state.kwh_display()
}

async fn write_kwh(
    State(state): State<Arc<MeterState>>,
    body: String,
) -> Result<String, (StatusCode, String)> {
    let kwh = parse_whole_kwh(&body).map_err(reject)?;
    state.set_whole_kwh(kwh);
    println!("set kwh = {kwh}");
    Ok(state.kwh_display())
}

async fn read_watt(State(state): State<Arc<MeterState>>) -> String {
    state.latest_window().watts.to_string()
}

async fn read_period(State(state): State<Arc<MeterState>>) -> String {
    state.measurement_period().to_string()
}

async fn write_period(
    State(state): State<Arc<MeterState>>,
    body: String,
) -> Result<String, (StatusCode, String)> {
    let secs = parse_positive(&body, "measurement period").map_err(reject)?;
    state.set_measurement_period(secs);
    println!("set measurement_period = {secs}");
    Ok(secs.to_string())
}

async fn read_pulses_per_kwh(State(state): State<Arc<MeterState>>) -> String {
    state.pulses_per_kwh().to_string()
}

async fn write_pulses_per_kwh(
    State(state): State<Arc<MeterState>>,
    body: String,
) -> Result<String, (StatusCode, String)> {
    let pulses = parse_positive(&body, "pulses per kWh").map_err(reject)?;
    state.set_pulses_per_kwh(pulses);
    println!("set pulses_per_kwh = {pulses}");
    Ok(pulses.to_string())
}

async fn status_json(State(state): State<Arc<MeterState>>) -> Json<StatusJson> {
    let snapshot = state.status_snapshot();
    Json(StatusJson {
        ws: snapshot.watts,
        kwh: snapshot.kwh,
        fail: snapshot.faulted as u8,
    })
}

async fn event_status_json(State(state): State<Arc<MeterState>>) -> Json<Vec<EventStatusJson>> {
    let snapshot = state.status_snapshot();
    Json(vec![EventStatusJson {
        timestamp: timestamp_ms(),
        dev_id: state.device_id().to_string(),
        watt: snapshot.watts,
        kwh: snapshot.kwh,
        fail: snapshot.faulted as u8,
    }])
}

fn reject(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

/// Accepts `"123"` as well as the displayed `"123.45"` form; only the whole
/// part presets the register, the fraction is tracked by pulses alone.
fn parse_whole_kwh(raw: &str) -> anyhow::Result<u32> {
    let trimmed = raw.trim();
    let whole = trimmed.split('.').next().unwrap_or_default();
    whole
        .parse::<u32>()
        .map_err(|_| anyhow::anyhow!("expected a kWh value like `123` or `123.45`, got `{trimmed}`"))
}

fn parse_positive(raw: &str, what: &str) -> anyhow::Result<u32> {
    let trimmed = raw.trim();
    let value: u32 = trimmed
        .parse()
        .map_err(|_| anyhow::anyhow!("{what} must be a positive integer, got `{trimmed}`"))?;
    if value == 0 {
        anyhow::bail!("{what} must be a positive integer, got 0");
    }
    Ok(value)
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_kwh() {
        assert_eq!(parse_whole_kwh("123").unwrap(), 123);
        assert_eq!(parse_whole_kwh("123.45").unwrap(), 123);
        assert_eq!(parse_whole_kwh(" 7 \n").unwrap(), 7);
        assert_eq!(parse_whole_kwh("0").unwrap(), 0);

        assert!(parse_whole_kwh("").is_err());
        assert!(parse_whole_kwh("abc").is_err());
        assert!(parse_whole_kwh("-5").is_err());
        assert!(parse_whole_kwh(".5").is_err());
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("30", "measurement period").unwrap(), 30);
        assert_eq!(parse_positive(" 10000\n", "pulses per kWh").unwrap(), 10_000);

        assert!(parse_positive("0", "measurement period").is_err());
        assert!(parse_positive("-1", "measurement period").is_err());
        assert!(parse_positive("ten", "measurement period").is_err());
        assert!(parse_positive("", "measurement period").is_err());
    }

    #[test]
    fn test_status_json_shape() {
        let doc = StatusJson {
            ws: 1_200,
            kwh: "1.50".to_string(),
            fail: 0,
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ws": 1200, "kwh": "1.50", "fail": 0})
        );
    }

    #[test]
    fn test_event_status_json_uses_dashed_device_key() {
        let doc = EventStatusJson {
            timestamp: 1_722_000_000_000,
            dev_id: "PWR".to_string(),
            watt: 340,
            kwh: "12.07".to_string(),
            fail: 1,
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["dev-id"], "PWR");
        assert_eq!(value["watt"], 340);
        assert_eq!(value["fail"], 1);
    }

    #[test]
    fn test_timestamp_is_wall_clock_millis() {
        // 2020-01-01 in milliseconds; anything current is far beyond it.
        assert!(timestamp_ms() > 1_577_836_800_000);
    }
}
