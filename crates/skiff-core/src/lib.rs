//! skiff-core — shared domain types for Skiff.
//!
//! Everything the orchestration service, the state store, and the API
//! exchange lives here: repository images and their newest-first order,
//! parsed image references, running containers, workloads, and the
//! release history records, plus the contracts of the four collaborators
//! (registry, platform, history, automator) the service is built over.

pub mod config;
pub mod image;
pub mod leaves;
pub mod types;

pub use config::SkiffConfig;
pub use image::{ImageRef, ImageRefError};
pub use types::*;
