//! REST API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use lightwire_core::DesiredDelta;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Current shadow snapshot
pub async fn get_shadow(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.snapshot().await)
}

/// List every registered resource
pub async fn list_resources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.pipeline.registry().entries().await)
}

/// Apply a desired-state delta to one light
pub async fn apply_desired(
    State(state): State<Arc<AppState>>,
    Json(delta): Json<DesiredDelta>,
) -> impl IntoResponse {
    if delta.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("Delta carries no field")),
        )
            .into_response();
    }
    if state
        .pipeline
        .registry()
        .light_summary(&delta.uri)
        .await
        .is_none()
    {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Light not found or not ready")),
        )
            .into_response();
    }

    info!(uri = %delta.uri, "Desired state received");
    let report = state.pipeline.reconciler().apply_delta(&delta).await;
    Json(report).into_response()
}

/// Trigger a discovery round
pub async fn trigger_discover(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Manual discovery triggered");
    state.pipeline.discover();
    Json(serde_json::json!({ "status": "started" }))
}

/// Remove request body
#[derive(Deserialize)]
pub struct RemoveRequest {
    pub uri: String,
}

/// Remove a resource and its linked children
pub async fn remove_resource(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoveRequest>,
) -> impl IntoResponse {
    info!(uri = %req.uri, "Remove resource requested");

    let removed = state.sweeper.remove(&req.uri).await;
    if removed.is_empty() {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Resource not found")),
        )
            .into_response()
    } else {
        Json(serde_json::json!({
            "status": "removed",
            "removed": removed,
        }))
        .into_response()
    }
}

/// Simulated peer control request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorRequest {
    /// URI of the simulated light
    pub uri: String,
    pub online: Option<bool>,
    pub power_on: Option<bool>,
    pub brightness: Option<i64>,
}

/// Change a simulated peer from outside the discovery pipeline
pub async fn control_simulator(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulatorRequest>,
) -> impl IntoResponse {
    let Some(current) = state.network.light(&req.uri) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Simulated light not found")),
        )
            .into_response();
    };

    if let Some(online) = req.online {
        info!(uri = %req.uri, online, "Simulated light connectivity changed");
        state.network.set_online(&req.uri, online);
    }
    if req.power_on.is_some() || req.brightness.is_some() {
        let power_on = req.power_on.unwrap_or(current.power_on);
        let brightness = req.brightness.unwrap_or(current.brightness);
        state.network.push_state(&req.uri, power_on, brightness);
    }

    Json(state.network.light(&req.uri)).into_response()
}
