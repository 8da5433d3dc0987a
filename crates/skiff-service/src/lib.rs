//! Skiff orchestration service — image correlation and releases.
//!
//! The service sits between API clients and four leaves: a registry of
//! images, a platform running workloads, a release history, and an
//! automator. It owns no domain state and reads through to the leaves on
//! every call. The leaf contracts live in `skiff_core::leaves` and are
//! re-exported here; the service depends on nothing but those traits.
//!
//! # Components
//!
//! - **`service`** — The public operations
//! - **`release`** — Per-workload release locks and the audit guard
//! - **`catalog`** — Config-backed registry and platform
//! - **`error`** — Error taxonomy
//!
//! # Release protocol
//!
//! ```text
//! no platform?        → NoPlatformConfigured (nothing written)
//! lock workload
//! state = InProgress
//! platform.release(definition, update_period)
//! on every exit:      log "Release succeeded" | "Release failed: <err>"
//!                     state = Rest
//! return platform outcome
//! ```

pub mod catalog;
pub mod error;
pub mod release;
pub mod service;

pub use catalog::{CatalogPlatform, CatalogRegistry};
pub use error::{HistoryError, PlatformError, RegistryError, ServiceError, ServiceResult};
pub use skiff_core::leaves::{Automator, HistoryDb, Platform, Registry};
pub use release::{ReleaseGuard, ReleaseLocks, RELEASE_SUCCEEDED};
pub use service::Service;
