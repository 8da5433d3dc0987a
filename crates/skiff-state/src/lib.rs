//! skiff-state — embedded state store for Skiff.
//!
//! Backed by [redb](https://docs.rs/redb), holds the two pieces of durable
//! state the orchestration service delegates: the per-workload release
//! history (audit events plus the release state register) and the
//! per-workload automation flag. `StateStore` implements the `HistoryDb`
//! and `Automator` leaves from `skiff_core::leaves`.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` columns, except the
//! automation flag which is a native `bool`. Keys are `{namespace}/{workload}`,
//! and events append a zero-padded sequence (`{namespace}/{workload}:{seq}`)
//! so a range scan returns them in logging order.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod leaves;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
