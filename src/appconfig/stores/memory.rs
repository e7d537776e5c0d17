//! `memory` store: ephemeral in-process configuration store.
//!
//! Holds a committed map plus a pending change set.  `save_changes` folds the
//! pending set into the committed map.  Beginning a transaction snapshots the
//! committed map; rollback restores the snapshot and drops pending changes.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::AppError;
use crate::guard;
use super::super::store::{
    ConfigEntry, ConfigStore, Transaction, TransactionBackend, TransactionGate,
};

#[derive(Default)]
struct State {
    committed: BTreeMap<String, String>,
    /// key -> `Some(value)` for a write, `None` for a delete.
    pending: BTreeMap<String, Option<String>>,
    snapshot: Option<BTreeMap<String, String>>,
}

impl State {
    fn visible(&self, key: &str) -> Option<&String> {
        match self.pending.get(key) {
            Some(change) => change.as_ref(),
            None => self.committed.get(key),
        }
    }
}

/// Ephemeral in-memory configuration store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    gate: TransactionGate,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with committed entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let committed = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            state: Mutex::new(State {
                committed,
                ..State::default()
            }),
            gate: TransactionGate::new(),
        }
    }

    /// Number of changes waiting for `save_changes`.
    pub fn pending_len(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.pending.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }
}

impl ConfigStore for MemoryStore {
    fn store_type(&self) -> &str {
        "memory"
    }

    fn get_entity(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        let state = self.lock()?;
        Ok(state.visible(key).map(|v| ConfigEntry::new(key, v.clone())))
    }

    fn get_entities(&self, prefix: &str) -> Result<Vec<ConfigEntry>, AppError> {
        let state = self.lock()?;
        let mut merged: BTreeMap<&str, &str> = state
            .committed
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (k, change) in state
            .pending
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        {
            if !k.starts_with(prefix) {
                break;
            }
            match change {
                Some(v) => {
                    merged.insert(k.as_str(), v.as_str());
                }
                None => {
                    merged.remove(k.as_str());
                }
            }
        }
        Ok(merged
            .into_iter()
            .map(|(k, v)| ConfigEntry::new(k, v))
            .collect())
    }

    fn set_entity(&self, entry: ConfigEntry) -> Result<(), AppError> {
        guard::not_empty("key", &entry.key)?;
        self.lock()?.pending.insert(entry.key, Some(entry.value));
        Ok(())
    }

    fn delete_entity(&self, key: &str) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        if state.visible(key).is_none() {
            return Ok(false);
        }
        state.pending.insert(key.to_string(), None);
        Ok(true)
    }

    fn save_changes(&self) -> Result<(), AppError> {
        let mut state = self.lock()?;
        let pending = std::mem::take(&mut state.pending);
        trace!(changes = pending.len(), "memory store: save_changes");
        for (k, change) in pending {
            match change {
                Some(v) => {
                    state.committed.insert(k, v);
                }
                None => {
                    state.committed.remove(&k);
                }
            }
        }
        Ok(())
    }

    fn begin_transaction(&self) -> Result<Transaction<'_>, AppError> {
        Transaction::begin(self, &self.gate)
    }
}

impl TransactionBackend for MemoryStore {
    fn tx_begin(&self) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state.snapshot = Some(state.committed.clone());
        Ok(())
    }

    fn tx_commit(&self) -> Result<(), AppError> {
        self.lock()?.snapshot = None;
        Ok(())
    }

    fn tx_rollback(&self) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if let Some(snapshot) = state.snapshot.take() {
            state.committed = snapshot;
        }
        state.pending.clear();
        Ok(())
    }
}
