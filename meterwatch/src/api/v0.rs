//! API v0 endpoints.
//!
//! Version 0 is unstable. Breaking changes are expected
//! until the project reaches 1.0.

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use tokio::sync::oneshot;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::commands::MonitorCommand;
use super::server::SharedState;
use crate::api_client::types::{AlarmState, FlowPatchRequest, MeterState, ThresholdState};
use crate::meter::FlowMode;
use crate::monitor::AlarmConfig;
use crate::tracing::prelude::*;

/// How long a handler waits for the monitor task to apply a command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_meter))
        .routes(routes!(get_alarms))
        .routes(routes!(get_active_alarms))
        .routes(routes!(get_thresholds))
        .routes(routes!(get_config, put_config))
        .routes(routes!(patch_flow))
}

/// Send a command and wait for the monitor task to apply it.
async fn send_command(
    state: &SharedState,
    command: impl FnOnce(oneshot::Sender<anyhow::Result<()>>) -> MonitorCommand,
) -> Result<(), StatusCode> {
    let (tx, rx) = oneshot::channel();
    state
        .command_tx
        .send(command(tx))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // Result layers: timeout / channel-closed / command-error.
    match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "Monitor rejected command");
            Err(StatusCode::BAD_REQUEST)
        }
        _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
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

/// Return the current meter state snapshot.
#[utoipa::path(
    get,
    path = "/meter",
    tag = "meter",
    responses(
        (status = OK, description = "Current meter state", body = MeterState),
    ),
)]
async fn get_meter(State(state): State<SharedState>) -> Json<MeterState> {
    Json(state.meter_state())
}

/// Return every alarm raised since startup, oldest first.
#[utoipa::path(
    get,
    path = "/alarms",
    tag = "alarms",
    responses(
        (status = OK, description = "Alarm history", body = Vec<AlarmState>),
    ),
)]
async fn get_alarms(State(state): State<SharedState>) -> Json<Vec<AlarmState>> {
    Json(state.meter_state().alarms)
}

/// Return the alarms that are currently open.
#[utoipa::path(
    get,
    path = "/alarms/active",
    tag = "alarms",
    responses(
        (status = OK, description = "Open alarms", body = Vec<AlarmState>),
    ),
)]
async fn get_active_alarms(State(state): State<SharedState>) -> Json<Vec<AlarmState>> {
    Json(state.meter_state().active_alarms)
}

/// Return per-kind threshold status.
#[utoipa::path(
    get,
    path = "/thresholds",
    tag = "alarms",
    responses(
        (status = OK, description = "Threshold status per alarm kind", body = Vec<ThresholdState>),
    ),
)]
async fn get_thresholds(State(state): State<SharedState>) -> Json<Vec<ThresholdState>> {
    Json(state.meter_state().thresholds)
}

/// Return the alarm configuration in effect.
#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    responses(
        (status = OK, description = "Alarm configuration", body = AlarmConfig),
    ),
)]
async fn get_config(State(state): State<SharedState>) -> Json<AlarmConfig> {
    Json(state.meter_state().alarm_config)
}

/// Replace the alarm configuration.
#[utoipa::path(
    put,
    path = "/config",
    tag = "config",
    request_body = AlarmConfig,
    responses(
        (status = OK, description = "Configuration applied", body = AlarmConfig),
        (status = BAD_REQUEST, description = "Invalid configuration"),
        (status = INTERNAL_SERVER_ERROR, description = "Command channel error"),
    ),
)]
async fn put_config(
    State(state): State<SharedState>,
    Json(config): Json<AlarmConfig>,
) -> Result<Json<AlarmConfig>, StatusCode> {
    config.validate().map_err(|e| {
        debug!(error = %e, "Invalid alarm configuration");
        StatusCode::BAD_REQUEST
    })?;

    send_command(&state, |reply| MonitorCommand::UpdateAlarmConfig { config, reply }).await?;

    Ok(Json(state.meter_state().alarm_config))
}

/// Change the simulated flow or the reading interval.
#[utoipa::path(
    patch,
    path = "/flow",
    tag = "meter",
    request_body = FlowPatchRequest,
    responses(
        (status = OK, description = "Updated meter state", body = MeterState),
        (status = BAD_REQUEST, description = "Conflicting or invalid fields"),
        (status = INTERNAL_SERVER_ERROR, description = "Command channel error"),
    ),
)]
async fn patch_flow(
    State(state): State<SharedState>,
    Json(req): Json<FlowPatchRequest>,
) -> Result<Json<MeterState>, StatusCode> {
    let mode = match (req.rate, req.random) {
        (Some(_), Some(_)) => return Err(StatusCode::BAD_REQUEST),
        (Some(rate), None) if !rate.is_finite() => return Err(StatusCode::BAD_REQUEST),
        (Some(rate), None) => Some(FlowMode::Constant { rate }),
        (None, Some(direction)) => Some(FlowMode::Random { direction }),
        (None, None) => None,
    };

    if req.reading_interval_secs == Some(0) {
        return Err(StatusCode::BAD_REQUEST);
    }

    if let Some(mode) = mode {
        send_command(&state, |reply| MonitorCommand::SetFlow { mode, reply }).await?;
    }

    if let Some(secs) = req.reading_interval_secs {
        send_command(&state, |reply| MonitorCommand::SetReadingInterval {
            interval: Duration::from_secs(secs),
            reply,
        })
        .await?;
    }

    Ok(Json(state.meter_state()))
}
