//! Liveness endpoint
//!
//! Two read-only routes that report on the process itself and never touch
//! reconciliation state:
//!
//! - `GET /health` → `200 OK` with body `OK`
//! - `GET /ready` → `200` with `{"status":"OK","timestamp":…,"uptime":…}`

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, SecondsFormat};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Shared router state
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    /// When the process started
    pub started_at: Instant,
}

impl HealthState {
    /// State anchored at the current instant
    pub fn now() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }
}

/// Body of `GET /ready`
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: String,
}

/// Build the router
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn ready(State(state): State<HealthState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "OK",
        timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        uptime: format_uptime(state.started_at.elapsed()),
    })
}

/// Serve the routes on `0.0.0.0:port` in a background task
///
/// A bind or serve failure is logged and ends the task; it never reaches
/// the scheduler.
pub fn spawn(port: u16, state: HealthState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Health server failed to bind {}: {}", addr, e);
                return;
            }
        };

        tracing::info!("Health server listening on {}", addr);

        if let Err(e) = axum::serve(listener, router(state)).await {
            tracing::error!("Health server stopped: {}", e);
        }
    })
}

/// Render a duration the way Go's `time.Duration` prints
///
/// `0s`, `850ms`, `1.5ms`, `42s`, `1m0s`, `1h2m3.5s`
pub fn format_uptime(elapsed: Duration) -> String {
    let nanos = elapsed.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < 1_000_000_000 {
        let (scale, unit) = match nanos {
            0..1_000 => (1, "ns"),
            1_000..1_000_000 => (1_000, "µs"),
            _ => (1_000_000, "ms"),
        };
        return format!("{}{}", decimal(nanos, scale), unit);
    }

    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = decimal(
        u128::from(total_secs % 60) * 1_000_000_000 + u128::from(elapsed.subsec_nanos()),
        1_000_000_000,
    );

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// `value / scale` with the fraction printed only as far as it is non-zero
fn decimal(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let fraction = value % scale;

    if fraction == 0 {
        return whole.to_string();
    }

    let width = scale.to_string().len() - 1;
    let digits = format!("{:0width$}", fraction, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
