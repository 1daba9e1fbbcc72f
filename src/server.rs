//! Web server module.
//!
//! Thin HTTP surface over the query façade and the pipeline monitor.
//! All validation lives in the façade; handlers only bind parameters
//! leniently (garbage input degrades to defaults, never a 400).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::pipeline::PipelineMonitor;
use crate::query::EventQueryService;
use crate::storage::EventStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub query: EventQueryService,
    pub monitor: Arc<PipelineMonitor>,
    pub store: Arc<dyn EventStore>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Query parameters for the high-energy events API.
///
/// Deserialized as raw strings so non-numeric input falls through to
/// the façade defaults instead of failing extraction.
#[derive(Debug, Deserialize)]
pub struct HighEnergyParams {
    pub limit: Option<String>,
    #[serde(rename = "minEnergy")]
    pub min_energy: Option<String>,
}

/// System status response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemStatusResponse {
    status: &'static str,
    database_status: &'static str,
    queue_size: usize,
    active_producers: usize,
    active_consumers: usize,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/events/high-energy", get(high_energy_handler))
        .route("/events/statistics", get(statistics_handler))
        .route("/system/status", get(system_status_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Highest-energy events, clamped limit and threshold.
async fn high_energy_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HighEnergyParams>,
) -> Response {
    let limit = params.limit.as_deref().and_then(|s| s.parse::<i64>().ok());
    let min_energy = params
        .min_energy
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok());

    match state.query.high_energy_events(limit, min_energy).await {
        Ok(events) => {
            state.monitor.set_storage_healthy(true);
            Json(events).into_response()
        }
        Err(e) => {
            state.monitor.set_storage_healthy(false);
            tracing::error!(error = %e, "High-energy query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Aggregate statistics over persisted events.
async fn statistics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.query.statistics().await {
        Ok(stats) => {
            state.monitor.set_storage_healthy(true);
            Json(stats).into_response()
        }
        Err(e) => {
            state.monitor.set_storage_healthy(false);
            tracing::error!(error = %e, "Statistics query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Pipeline and storage health snapshot. Never blocks.
async fn system_status_handler(State(state): State<Arc<AppState>>) -> Json<SystemStatusResponse> {
    let status = state.monitor.status();
    let queue_size = status.buffer_depth + state.store.queue_depth_hint().unwrap_or(0);

    Json(SystemStatusResponse {
        status: if status.storage_healthy {
            "running"
        } else {
            "degraded"
        },
        database_status: if status.storage_healthy {
            "healthy"
        } else {
            "unhealthy"
        },
        queue_size,
        active_producers: status.active_producers,
        active_consumers: status.active_consumers,
    })
}
