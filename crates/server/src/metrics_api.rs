//! Operational counters as JSON.

use axum::extract::State;
use axum::Json;
use kopi_core::MetricSnapshot;

use crate::state::AppState;

pub async fn snapshot(State(state): State<AppState>) -> Json<MetricSnapshot> {
    Json(state.metrics.snapshot())
}
