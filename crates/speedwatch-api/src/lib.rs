//! speedwatch-api — HTTP surface for speedwatch.
//!
//! Every route reads through the shared [`SpeedCollector`], so no request
//! ever starts a measurement and every response is bounded by the
//! collector's hand-off wait.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` (configurable) | Prometheus exposition |
//! | GET | `/api/v1/measurement` | Current snapshot as JSON |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use speedwatch_core::config::{ExpositionConfig, HEALTHZ_PATH, MEASUREMENT_PATH};
use speedwatch_metrics::SpeedCollector;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub collector: Arc<SpeedCollector>,
    pub exposition: ExpositionConfig,
}

/// Build the complete router, serving Prometheus text at `metrics_path`.
///
/// `metrics_path` must have passed config validation; a path that collides
/// with another route makes axum panic.
pub fn build_router(state: ApiState, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(handlers::prometheus_metrics))
        .route(MEASUREMENT_PATH, get(handlers::get_measurement))
        .route(HEALTHZ_PATH, get(handlers::healthz))
        .with_state(state)
}
