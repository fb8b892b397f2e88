//! HTTP query surface over the shared monitoring core.
//!
//! Read-only with respect to the sensor log and tracker state: handlers
//! re-run normalization and prediction for display, they never mutate what
//! the stream loop owns.

use crate::alert::AlertDispatcher;
use crate::features::{normalize, normalize_series};
use crate::model::Predictor;
use crate::schema::{Channel, Sample};
use crate::sensor_log::SensorLog;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration.
pub struct ServerConfig {
    /// Port to bind to (0 for random).
    pub port: u16,
    /// Sensor log read by the query handlers.
    pub log: SensorLog,
    /// The loaded prediction model.
    pub predictor: Arc<dyn Predictor + Send + Sync>,
    /// Dispatcher behind the manual alert endpoint.
    pub dispatcher: Arc<AlertDispatcher>,
    /// Display threshold gating the mitigation suggestion.
    pub display_threshold: f64,
}

/// Shared handler state.
struct ServerState {
    log: SensorLog,
    predictor: Arc<dyn Predictor + Send + Sync>,
    dispatcher: Arc<AlertDispatcher>,
    display_threshold: f64,
}

/// Status+message envelope for every error response.
#[derive(Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    message: String,
}

fn error_response(
    code: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    (
        code,
        Json(ErrorEnvelope {
            status: "error",
            message: message.into(),
        }),
    )
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixed mitigation text shown when the prediction exceeds the display
/// threshold.
fn mitigation_suggestion(prediction: f64, threshold: f64) -> String {
    format!(
        "Predicted carbon emission {prediction:.2} exceeds the threshold of {threshold}. \
         Review combustion efficiency and shift the curing lines to low-sulfur fuels."
    )
}

/// Render a sample with its original column labels for display.
fn sample_to_json(sample: &Sample) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(
        "Timestamp".to_string(),
        json!(sample.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    map.insert("From Date".to_string(), json!(sample.from_date));
    for channel in Channel::ALL {
        map.insert(channel.label().to_string(), json!(sample.reading(channel)));
    }
    serde_json::Value::Object(map)
}

/// GET /live-data
///
/// Most recent valid row with its prediction. Distinguishes "no data"
/// (empty or absent log) from internal errors.
async fn live_data(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorEnvelope>)> {
    let latest = state
        .log
        .latest()
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let sample =
        latest.ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No data available."))?;

    let prediction = state
        .predictor
        .predict(&normalize(&sample))
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let suggestion = (prediction > state.display_threshold)
        .then(|| mitigation_suggestion(prediction, state.display_threshold));

    Ok(Json(json!({
        "status": "success",
        "latest_sensor_data": sample_to_json(&sample),
        "predicted_carbon": round2(prediction),
        "threshold": state.display_threshold,
        "suggestion": suggestion,
    })))
}

/// Number of log rows re-predicted for the trend view.
const TREND_WINDOW: usize = 20;

/// GET /trend
///
/// Recent prediction history, re-derived from the log with series fill so a
/// gap in one row borrows from its neighbors.
async fn trend(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorEnvelope>)> {
    let rows = state
        .log
        .tail(TREND_WINDOW)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if rows.is_empty() {
        return Err(error_response(StatusCode::NOT_FOUND, "No data available."));
    }

    let vectors = normalize_series(&rows);
    let mut points = Vec::with_capacity(rows.len());
    for (sample, vector) in rows.iter().zip(&vectors) {
        match state.predictor.predict(vector) {
            Ok(prediction) => points.push(json!({
                "timestamp": sample.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                "predicted_emission": round2(prediction),
            })),
            Err(e) => tracing::warn!("skipping trend point: {e}"),
        }
    }

    Ok(Json(json!({
        "status": "success",
        "points": points,
    })))
}

/// POST /trigger-alert
///
/// Manual SMS trigger for drills and provider checks.
async fn trigger_alert(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorEnvelope>)> {
    let message = "SOS ALERT: Emission exceeded the safe limit 5 times in a row!";
    match state.dispatcher.send_alert(message).await {
        Ok(sid) => Ok(Json(json!({ "status": "success", "sid": sid }))),
        Err(e) => {
            tracing::error!("manual SOS dispatch failed: {e}");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ))
        }
    }
}

/// Run the HTTP server. Returns the bound address and a shutdown handle.
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState {
        log: config.log,
        predictor: config.predictor,
        dispatcher: config.dispatcher,
        display_threshold: config.display_threshold,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/live-data", get(live_data))
        .route("/trend", get(trend))
        .route("/trigger-alert", post(trigger_alert))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("query server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("server shutdown signal received");
            })
            .await
        {
            tracing::error!("server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
