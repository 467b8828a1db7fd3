use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use super::commands::MonitorCommand;
use super::v0;
use crate::api_client::types::MeterState;
use crate::tracing::prelude::*;

#[derive(OpenApi)]
#[openapi(info(
    title = "meterwatch",
    description = "Water meter simulation and flow alarms"
))]
struct ApiDoc;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct SharedState {
    pub state_rx: watch::Receiver<MeterState>,
    pub command_tx: mpsc::Sender<MonitorCommand>,
}

impl SharedState {
    pub fn meter_state(&self) -> MeterState {
        self.state_rx.borrow().clone()
    }
}

/// Assemble the full router: versioned API, OpenAPI document, Swagger UI.
pub fn build_router(state: SharedState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v0", v0::routes())
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until `cancellation` fires.
pub async fn serve(
    addr: SocketAddr,
    state: SharedState,
    cancellation: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { cancellation.cancelled().await })
        .await
        .context("API server failed")?;

    info!("API server stopped");
    Ok(())
}
