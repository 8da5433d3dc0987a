//! REST API handlers.
//!
//! Each handler calls one `Service` operation and returns a JSON envelope.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{error, warn};

use skiff_core::DEFAULT_NAMESPACE;
use skiff_service::{PlatformError, RegistryError, ServiceError};

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

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// HTTP status for a service error.
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidInput(_) | ServiceError::InvalidImage { .. } => StatusCode::BAD_REQUEST,
        ServiceError::NoPlatformConfigured => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Registry(RegistryError::RepositoryNotFound(_))
        | ServiceError::Platform(PlatformError::WorkloadNotFound { .. }) => StatusCode::NOT_FOUND,
        ServiceError::Platform(PlatformError::InvalidDefinition(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::ImagesOutOfOrder { .. }
        | ServiceError::Registry(_)
        | ServiceError::Platform(_) => StatusCode::BAD_GATEWAY,
        ServiceError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn service_error(err: ServiceError) -> axum::response::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, %status, "request failed");
    }
    error_response(&err.to_string(), status).into_response()
}

fn respond<T: serde::Serialize>(result: Result<T, ServiceError>) -> axum::response::Response {
    match result {
        Ok(data) => ApiResponse::ok(data).into_response(),
        Err(e) => service_error(e),
    }
}

/// `?namespace=` on every namespace-scoped route.
#[derive(Debug, serde::Deserialize, Default)]
pub struct NamespaceQuery {
    pub namespace: Option<String>,
}

impl NamespaceQuery {
    fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

// ── Images ─────────────────────────────────────────────────────

/// GET /api/v1/images/{*repository}
pub async fn list_images(
    State(state): State<ApiState>,
    Path(repository): Path<String>,
) -> impl IntoResponse {
    let repository = repository.trim_start_matches('/');
    respond(state.service.images(repository).await)
}

/// GET /api/v1/workloads/{workload}/images
pub async fn container_images(
    State(state): State<ApiState>,
    Path(workload): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> impl IntoResponse {
    respond(state.service.container_images(query.namespace(), &workload).await)
}

// ── Workloads ──────────────────────────────────────────────────

/// GET /api/v1/workloads
pub async fn list_workloads(
    State(state): State<ApiState>,
    Query(query): Query<NamespaceQuery>,
) -> impl IntoResponse {
    respond(state.service.workloads(query.namespace()).await)
}

// ── History ────────────────────────────────────────────────────

/// Query for the history route.
#[derive(Debug, serde::Deserialize, Default)]
pub struct HistoryQuery {
    pub namespace: Option<String>,
    /// Omitted or empty: every workload in the namespace.
    pub workload: Option<String>,
}

/// GET /api/v1/history
pub async fn history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let namespace = query.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
    let workload = query.workload.as_deref().unwrap_or("");
    respond(state.service.history(namespace, workload))
}

// ── Release ────────────────────────────────────────────────────

/// Release request body.
#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct ReleaseRequest {
    /// New workload definition, forwarded to the platform as JSON bytes.
    pub definition: serde_json::Value,
    /// Time budget for the rolling update.
    pub update_period_secs: u64,
}

/// POST /api/v1/workloads/{workload}/release
///
/// Blocks until the platform finishes or fails the rolling update. The
/// release runs on its own task, so a client that disconnects does not
/// abort the update halfway.
pub async fn release(
    State(state): State<ApiState>,
    Path(workload): Path<String>,
    Query(query): Query<NamespaceQuery>,
    Json(req): Json<ReleaseRequest>,
) -> impl IntoResponse {
    let definition = match serde_json::to_vec(&req.definition) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };
    let update_period = Duration::from_secs(req.update_period_secs);
    let namespace = query.namespace().to_string();
    let service = state.service;

    let task = tokio::spawn(async move {
        service
            .release(&namespace, &workload, &definition, update_period)
            .await
    });

    match task.await {
        Ok(Ok(())) => ApiResponse::ok("released").into_response(),
        Ok(Err(e)) => service_error(e),
        Err(e) => {
            error!(error = %e, "release task failed");
            error_response("release task failed", StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

// ── Automation ─────────────────────────────────────────────────

/// POST /api/v1/workloads/{workload}/automate
pub async fn automate(
    State(state): State<ApiState>,
    Path(workload): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> impl IntoResponse {
    match state.service.automate(query.namespace(), &workload) {
        Ok(()) => ApiResponse::ok("automated").into_response(),
        Err(e) => service_error(e),
    }
}

/// POST /api/v1/workloads/{workload}/deautomate
pub async fn deautomate(
    State(state): State<ApiState>,
    Path(workload): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> impl IntoResponse {
    match state.service.deautomate(query.namespace(), &workload) {
        Ok(()) => ApiResponse::ok("deautomated").into_response(),
        Err(e) => service_error(e),
    }
}
