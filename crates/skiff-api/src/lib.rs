//! skiff-api — REST API for Skiff.
//!
//! Provides axum route handlers over [`skiff_service::Service`]. Every
//! namespace-scoped route takes an optional `namespace` query parameter
//! that defaults to [`skiff_core::DEFAULT_NAMESPACE`].
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/images/{*repository}` | Images of a repository, newest first |
//! | GET | `/api/v1/workloads` | List workloads |
//! | GET | `/api/v1/workloads/{workload}/images` | Running containers with candidate images |
//! | POST | `/api/v1/workloads/{workload}/release` | Release a new definition (blocks) |
//! | POST | `/api/v1/workloads/{workload}/automate` | Enable automatic releases |
//! | POST | `/api/v1/workloads/{workload}/deautomate` | Disable automatic releases |
//! | GET | `/api/v1/history` | Release history (`?workload=` for one) |

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use skiff_service::Service;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: Service,
}

/// Build the complete API router.
pub fn build_router(service: Service) -> Router {
    let api_state = ApiState { service };

    let api_routes = Router::new()
        .route("/images/{*repository}", get(handlers::list_images))
        .route("/workloads", get(handlers::list_workloads))
        .route("/workloads/{workload}/images", get(handlers::container_images))
        .route("/workloads/{workload}/release", post(handlers::release))
        .route("/workloads/{workload}/automate", post(handlers::automate))
        .route("/workloads/{workload}/deautomate", post(handlers::deautomate))
        .route("/history", get(handlers::history))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
