//! HTTP handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tracing::debug;

use speedwatch_core::{MeasurementResult, epoch_millis};
use speedwatch_metrics::{Snapshot, render_prometheus};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// JSON view of a collector snapshot.
#[derive(Debug, serde::Serialize)]
pub struct MeasurementView {
    #[serde(flatten)]
    pub result: MeasurementResult,
    pub measured_at_ms: Option<i64>,
    pub scraped_at_ms: i64,
    pub age_secs: Option<f64>,
    pub fresh: bool,
}

impl From<Snapshot> for MeasurementView {
    fn from(s: Snapshot) -> Self {
        Self {
            result: s.result,
            measured_at_ms: s.measured_at.map(epoch_millis),
            scraped_at_ms: epoch_millis(s.scraped_at),
            age_secs: s.age().map(|a| a.as_secs_f64()),
            fresh: s.fresh,
        }
    }
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.collector.collect().await;
    debug!(fresh = snapshot.fresh, "metrics scraped");
    let body = render_prometheus(&snapshot, &state.exposition);
    (
        StatusCode::OK,
        [(CONTENT_TYPE, speedwatch_metrics::CONTENT_TYPE)],
        body,
    )
}

/// GET /api/v1/measurement
pub async fn get_measurement(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.collector.collect().await;
    ApiResponse::ok(MeasurementView::from(snapshot))
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
