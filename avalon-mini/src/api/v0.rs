//! API v0 endpoints.
//!
//! Version 0 signals an unstable API -- breaking changes are expected
//! until 1.0.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::SharedState;
use crate::api_client::types::{DevicePatchRequest, DeviceState, EntityState};
use crate::monitor::MonitorError;
use crate::protocol::CommandRequest;
use crate::tracing::prelude::*;

/// Upper bound on waiting for the monitor to run one command. Covers a
/// poll already in flight plus the command's own exchange.
const COMMAND_DEADLINE: Duration = Duration::from_secs(15);

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_device, patch_device))
        .routes(routes!(refresh_device))
        .routes(routes!(get_entities))
        .routes(routes!(get_entity))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Return the current device state snapshot.
#[utoipa::path(
    get,
    path = "/device",
    tag = "device",
    responses(
        (status = OK, description = "Current device state", body = DeviceState),
    ),
)]
async fn get_device(State(state): State<SharedState>) -> Json<DeviceState> {
    Json(state.device_state())
}

/// Apply partial updates to the device.
///
/// Each present field is sent as its own command, in the order power,
/// mode, level, display. The first failure stops the rest.
#[utoipa::path(
    patch,
    path = "/device",
    tag = "device",
    request_body = DevicePatchRequest,
    responses(
        (status = OK, description = "Updated device state", body = DeviceState),
        (status = UNPROCESSABLE_ENTITY, description = "Unknown mode, level, or field type"),
        (status = BAD_GATEWAY, description = "Device failed or rejected a command"),
        (status = INTERNAL_SERVER_ERROR, description = "Monitor not running"),
    ),
)]
async fn patch_device(
    State(state): State<SharedState>,
    Json(req): Json<DevicePatchRequest>,
) -> Result<Json<DeviceState>, StatusCode> {
    for command in commands_for(&req) {
        let result = tokio::time::timeout(COMMAND_DEADLINE, state.monitor.send(command)).await;
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(%command, error = %e, "Command failed");
                return Err(error_status(&e));
            }
            Err(_) => {
                warn!(%command, deadline = ?COMMAND_DEADLINE, "Command timed out");
                return Err(StatusCode::BAD_GATEWAY);
            }
        }
    }

    Ok(Json(state.device_state()))
}

/// Poll the device now instead of waiting for the next interval.
#[utoipa::path(
    post,
    path = "/device/refresh",
    tag = "device",
    responses(
        (status = OK, description = "State after the poll", body = DeviceState),
        (status = BAD_GATEWAY, description = "Poll failed; state keeps last-known values"),
        (status = INTERNAL_SERVER_ERROR, description = "Monitor not running"),
    ),
)]
async fn refresh_device(State(state): State<SharedState>) -> Result<Json<DeviceState>, StatusCode> {
    match tokio::time::timeout(COMMAND_DEADLINE, state.monitor.refresh()).await {
        Ok(Ok(())) => Ok(Json(state.device_state())),
        Ok(Err(e)) => {
            warn!(error = %e, "Refresh failed");
            Err(error_status(&e))
        }
        Err(_) => {
            warn!(deadline = ?COMMAND_DEADLINE, "Refresh timed out");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

fn error_status(error: &MonitorError) -> StatusCode {
    match error {
        MonitorError::Stopped => StatusCode::INTERNAL_SERVER_ERROR,
        MonitorError::Device(_) | MonitorError::Rejected { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn commands_for(req: &DevicePatchRequest) -> Vec<CommandRequest> {
    [
        req.power.map(CommandRequest::power),
        req.mode.map(CommandRequest::SetMode),
        req.level.map(CommandRequest::SetLevel),
        req.display.map(CommandRequest::SetDisplay),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Return every entity of the device.
#[utoipa::path(
    get,
    path = "/entities",
    tag = "entities",
    responses(
        (status = OK, description = "All entities", body = Vec<EntityState>),
    ),
)]
async fn get_entities(State(state): State<SharedState>) -> Json<Vec<EntityState>> {
    Json(state.entities())
}

/// Return a single entity by id, or 404 if not found.
#[utoipa::path(
    get,
    path = "/entities/{id}",
    tag = "entities",
    params(
        ("id" = String, Path, description = "Entity id, e.g. `den_mini_power`"),
    ),
    responses(
        (status = OK, description = "Entity details", body = EntityState),
        (status = NOT_FOUND, description = "Entity not found"),
    ),
)]
async fn get_entity(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<EntityState>, StatusCode> {
    state
        .entities()
        .into_iter()
        .find(|e| e.id == id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
