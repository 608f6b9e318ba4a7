use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use super::v0;
use crate::api_client::types::{DeviceState, EntityState};
use crate::entity::entities_for;
use crate::monitor::MonitorHandle;
use crate::tracing::prelude::*;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "avalon-mini",
        description = "Monitor and control an Avalon Mini 3 heater-miner"
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "device", description = "Device state and control"),
        (name = "entities", description = "Per-entity view of the device"),
    )
)]
struct ApiDoc;

/// State shared by all handlers.
#[derive(Clone)]
pub struct SharedState {
    pub monitor: MonitorHandle,
}

impl SharedState {
    pub fn new(monitor: MonitorHandle) -> Self {
        Self { monitor }
    }

    pub fn device_state(&self) -> DeviceState {
        self.monitor.state()
    }

    pub fn entities(&self) -> Vec<EntityState> {
        let state = self.device_state();
        entities_for(&state.name, &state)
    }
}

/// Build the application router: the v0 API under `/api/v0` and the
/// Swagger UI over its generated OpenAPI document.
pub fn router(state: SharedState) -> Router {
    let (api_router, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v0", v0::routes())
        .split_for_parts();

    api_router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `cancellation` fires.
pub async fn serve(
    addr: SocketAddr,
    monitor: MonitorHandle,
    cancellation: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    info!(%addr, "API listening");

    axum::serve(listener, router(SharedState::new(monitor)))
        .with_graceful_shutdown(async move { cancellation.cancelled().await })
        .await
        .context("API server failed")?;

    debug!("API server stopped");
    Ok(())
}
