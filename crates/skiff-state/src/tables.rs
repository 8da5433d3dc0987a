//! redb table definitions for the Skiff state store.

use redb::TableDefinition;

/// Audit events keyed by `{namespace}/{workload}:{seq:020}`.
pub const HISTORY_EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("history_events");

/// Release state register keyed by `{namespace}/{workload}`.
pub const HISTORY_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("history_states");

/// Automation flags keyed by `{namespace}/{workload}`.
pub const AUTOMATION: TableDefinition<&str, bool> = TableDefinition::new("automation");
