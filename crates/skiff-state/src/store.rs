//! StateStore — redb-backed persistence for release history and automation.
//!
//! The history section keeps an append-only event log plus a state register
//! per workload; the automation section keeps one flag per workload. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use skiff_core::{workload_key, History, HistoryEvent, ReleaseState};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Width of the zero-padded event sequence in event keys.
const SEQ_WIDTH: usize = 20;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Database))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Database))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Database))?;
        txn.open_table(HISTORY_EVENTS).map_err(map_err!(Database))?;
        txn.open_table(HISTORY_STATES).map_err(map_err!(Database))?;
        txn.open_table(AUTOMATION).map_err(map_err!(Database))?;
        txn.commit().map_err(map_err!(Database))?;
        Ok(())
    }

    // ── History: state register ────────────────────────────────────

    /// Set the release state of a workload. `Unknown` is refused.
    pub fn set_state(&self, namespace: &str, workload: &str, state: ReleaseState) -> StateResult<()> {
        if state == ReleaseState::Unknown {
            return Err(StateError::UnpersistableState(state));
        }
        let key = store_key(namespace, workload)?;
        let value = serde_json::to_vec(&state).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Database))?;
        {
            let mut table = txn.open_table(HISTORY_STATES).map_err(map_err!(Database))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Database))?;
        debug!(%key, %state, "release state stored");
        Ok(())
    }

    /// Current release state of a workload, if one was ever stored.
    pub fn get_state(&self, namespace: &str, workload: &str) -> StateResult<Option<ReleaseState>> {
        let key = store_key(namespace, workload)?;
        let txn = self.db.begin_read().map_err(map_err!(Database))?;
        let table = txn.open_table(HISTORY_STATES).map_err(map_err!(Database))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let state: ReleaseState =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    // ── History: event log ─────────────────────────────────────────

    /// Append an event stamped with the current time. Returns its sequence number.
    pub fn log_event(&self, namespace: &str, workload: &str, message: &str) -> StateResult<u64> {
        let prefix = event_prefix(namespace, workload)?;
        let event = HistoryEvent {
            stamp: epoch_secs(),
            message: message.to_string(),
        };
        let value = serde_json::to_vec(&event).map_err(map_err!(Codec))?;

        let txn = self.db.begin_write().map_err(map_err!(Database))?;
        let seq;
        {
            let mut table = txn.open_table(HISTORY_EVENTS).map_err(map_err!(Database))?;
            // Highest sequence first; usually the first key seen.
            let (start, end) = sequence_bounds(&prefix);
            let mut next = 0u64;
            for entry in table
                .range(start.as_str()..end.as_str())
                .map_err(map_err!(Read))?
                .rev()
            {
                let (key, _) = entry.map_err(map_err!(Read))?;
                if let Some(last) = parse_sequence(&key.value()[prefix.len()..]) {
                    next = last + 1;
                    break;
                }
            }
            seq = next;
            let key = format!("{prefix}{seq:0width$}", width = SEQ_WIDTH);
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Database))?;
        debug!(namespace, workload, seq, "history event stored");
        Ok(seq)
    }

    /// All events for a workload, oldest first.
    pub fn events_for(&self, namespace: &str, workload: &str) -> StateResult<Vec<HistoryEvent>> {
        let prefix = event_prefix(namespace, workload)?;
        let txn = self.db.begin_read().map_err(map_err!(Database))?;
        let table = txn.open_table(HISTORY_EVENTS).map_err(map_err!(Database))?;
        let (start, end) = sequence_bounds(&prefix);
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
        {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if parse_sequence(&key.value()[prefix.len()..]).is_none() {
                // A longer workload name sharing this prefix.
                continue;
            }
            let event: HistoryEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(event);
        }
        Ok(results)
    }

    /// History of one workload, or `None` if nothing was ever recorded.
    ///
    /// A workload with events but no stored state reports `Rest`.
    pub fn history_for(&self, namespace: &str, workload: &str) -> StateResult<Option<History>> {
        let state = self.get_state(namespace, workload)?;
        let events = self.events_for(namespace, workload)?;
        if state.is_none() && events.is_empty() {
            return Ok(None);
        }
        Ok(Some(History {
            workload: workload.to_string(),
            state: state.unwrap_or(ReleaseState::Rest),
            events,
        }))
    }

    /// History of every workload in a namespace, keyed by workload name.
    pub fn all_history(&self, namespace: &str) -> StateResult<BTreeMap<String, History>> {
        let prefix = namespace_prefix(namespace)?;
        let txn = self.db.begin_read().map_err(map_err!(Database))?;
        let mut results: BTreeMap<String, History> = BTreeMap::new();

        let states = txn.open_table(HISTORY_STATES).map_err(map_err!(Database))?;
        for entry in states.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if !key.starts_with(&prefix) {
                break;
            }
            let workload = &key[prefix.len()..];
            let state: ReleaseState =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.insert(
                workload.to_string(),
                History {
                    workload: workload.to_string(),
                    state,
                    events: Vec::new(),
                },
            );
        }

        let events = txn.open_table(HISTORY_EVENTS).map_err(map_err!(Database))?;
        for entry in events.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if !key.starts_with(&prefix) {
                break;
            }
            let Some((workload, seq)) = key[prefix.len()..].rsplit_once(':') else {
                continue;
            };
            if parse_sequence(seq).is_none() {
                continue;
            }
            let event: HistoryEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results
                .entry(workload.to_string())
                .or_insert_with(|| History {
                    workload: workload.to_string(),
                    state: ReleaseState::Rest,
                    events: Vec::new(),
                })
                .events
                .push(event);
        }
        Ok(results)
    }

    // ── Automation ─────────────────────────────────────────────────

    /// Turn automatic releases on or off for a workload.
    pub fn set_automated(&self, namespace: &str, workload: &str, automated: bool) -> StateResult<()> {
        let key = store_key(namespace, workload)?;
        let txn = self.db.begin_write().map_err(map_err!(Database))?;
        {
            let mut table = txn.open_table(AUTOMATION).map_err(map_err!(Database))?;
            table
                .insert(key.as_str(), automated)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Database))?;
        debug!(%key, automated, "automation flag stored");
        Ok(())
    }

    /// Whether automatic releases are on. Workloads never touched are off.
    pub fn is_automated(&self, namespace: &str, workload: &str) -> StateResult<bool> {
        let key = store_key(namespace, workload)?;
        let txn = self.db.begin_read().map_err(map_err!(Database))?;
        let table = txn.open_table(AUTOMATION).map_err(map_err!(Database))?;
        let automated = table
            .get(key.as_str())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(false);
        Ok(automated)
    }

    /// Names of the automated workloads in a namespace.
    pub fn list_automated(&self, namespace: &str) -> StateResult<Vec<String>> {
        let prefix = namespace_prefix(namespace)?;
        let txn = self.db.begin_read().map_err(map_err!(Database))?;
        let table = txn.open_table(AUTOMATION).map_err(map_err!(Database))?;
        let mut results = Vec::new();
        for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if !key.starts_with(&prefix) {
                break;
            }
            if value.value() {
                results.push(key[prefix.len()..].to_string());
            }
        }
        Ok(results)
    }
}

fn check_part(field: &'static str, value: &str) -> StateResult<()> {
    if value.contains('/') {
        return Err(StateError::InvalidKey {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// `{namespace}/{workload}`, refusing parts that would make it ambiguous.
fn store_key(namespace: &str, workload: &str) -> StateResult<String> {
    check_part("namespace", namespace)?;
    check_part("workload", workload)?;
    Ok(workload_key(namespace, workload))
}

fn namespace_prefix(namespace: &str) -> StateResult<String> {
    check_part("namespace", namespace)?;
    Ok(format!("{namespace}/"))
}

fn event_prefix(namespace: &str, workload: &str) -> StateResult<String> {
    Ok(format!("{}:", store_key(namespace, workload)?))
}

/// Key bounds holding every `{prefix}{digit...}` key. `:` sorts right after `9`.
fn sequence_bounds(prefix: &str) -> (String, String) {
    (format!("{prefix}0"), format!("{prefix}:"))
}

/// Parse a zero-padded event sequence; anything else is a foreign key.
fn parse_sequence(s: &str) -> Option<u64> {
    if s.len() != SEQ_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
