//! Error taxonomy for the orchestration service.
//!
//! Leaf errors are defined next to the leaf contracts in `skiff_core::leaves`
//! and wrapped here unchanged.

use thiserror::Error;

pub use skiff_core::leaves::{HistoryError, PlatformError, RegistryError};

/// Errors returned by [`Service`](crate::Service) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The service was built without a platform leaf.
    #[error("no platform configured")]
    NoPlatformConfigured,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid image reference {image:?}: {reason}")]
    InvalidImage { image: String, reason: String },

    /// The registry broke its newest-first contract.
    #[error("registry returned images for {repository} out of order")]
    ImagesOutOfOrder { repository: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
