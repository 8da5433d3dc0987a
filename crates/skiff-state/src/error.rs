//! Error types for the Skiff state store.

use skiff_core::ReleaseState;
use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Opening the database, a transaction, or a table failed.
    #[error("database error: {0}")]
    Database(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    /// A stored value could not be encoded or decoded as JSON.
    #[error("codec error: {0}")]
    Codec(String),

    /// Namespaces and workloads share one key space joined by `/`.
    #[error("{field} {value:?} must not contain '/'")]
    InvalidKey { field: &'static str, value: String },

    #[error("release state {0} cannot be stored")]
    UnpersistableState(ReleaseState),
}
