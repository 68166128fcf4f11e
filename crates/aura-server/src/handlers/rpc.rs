// ============================================
// File: crates/aura-server/src/handlers/rpc.rs
// ============================================
//! # Provisioning RPC
//!
//! ## Creation Reason
//! Exposes [`ProvisioningService`] to devices as JSON over HTTP, one route
//! per RPC method.
//!
//! ## Routes
//! ```text
//! POST /provisioning.v1.ProvisioningService/Bootstrap        → BootstrapResponse
//! POST /provisioning.v1.ProvisioningService/Provision        → ProvisionResponse
//! GET  /provisioning.v1.ProvisioningService/RootCertificate  → root PEM
//! GET  /health                                               → {"status":"ok",...}
//! ```
//!
//! ## Error Mapping
//! | code                | HTTP |
//! |---------------------|------|
//! | `invalid_argument`  | 400  |
//! | `not_found`         | 404  |
//! | `deadline_exceeded` | 504  |
//! | `internal`          | 500  |
//!
//! Error bodies are `{"code": ..., "message": ...}`. A body that is not
//! valid JSON for the request type is `invalid_argument`.
//!
//! ## Last Modified
//! v0.1.0 - Initial RPC surface

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{ProvisioningError, Result, ServerError};
use crate::services::{
    BootstrapRequest, BootstrapResponse, ProvisionRequest, ProvisionResponse, ProvisioningService,
};

/// Route prefix shared by the provisioning methods.
pub const SERVICE_PATH: &str = "/provisioning.v1.ProvisioningService";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl ProvisioningError {
    /// HTTP status for this category.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProvisioningError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the RPC router.
pub fn router(service: Arc<ProvisioningService>) -> Router {
    Router::new()
        .route(&format!("{SERVICE_PATH}/Bootstrap"), post(bootstrap))
        .route(&format!("{SERVICE_PATH}/Provision"), post(provision))
        .route(&format!("{SERVICE_PATH}/RootCertificate"), get(root_certificate))
        .route("/health", get(health))
        .with_state(service)
}

/// Serves `router` on `listener` until `shutdown` fires.
///
/// # Errors
/// Returns `Io` if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Provisioning RPC listening on {}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(ServerError::from)
}

async fn bootstrap(
    State(service): State<Arc<ProvisioningService>>,
    payload: std::result::Result<Json<BootstrapRequest>, JsonRejection>,
) -> std::result::Result<Json<BootstrapResponse>, ProvisioningError> {
    let Json(request) = payload.map_err(reject)?;
    service.bootstrap(request).await.map(Json)
}

async fn provision(
    State(service): State<Arc<ProvisioningService>>,
    payload: std::result::Result<Json<ProvisionRequest>, JsonRejection>,
) -> std::result::Result<Json<ProvisionResponse>, ProvisioningError> {
    let Json(request) = payload.map_err(reject)?;
    service.provision(request).await.map(Json)
}

async fn root_certificate(State(service): State<Arc<ProvisioningService>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/x-pem-file")],
        service.certificate_authority().root_certificate_pem().to_string(),
    )
        .into_response()
}

async fn health(State(service): State<Arc<ProvisioningService>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "outstanding_challenges": service.challenges().len(),
    }))
}

fn reject(rejection: JsonRejection) -> ProvisioningError {
    debug!(error = %rejection, "Rejected malformed RPC body");
    ProvisioningError::invalid_argument(format!("malformed request: {}", rejection.body_text()))
}
