//! Store trait: the persistence capability behind [`AppConfig`](super::AppConfig).
//!
//! A store holds `key -> value` string entries.  Writes made through
//! [`ConfigStore::set_entity`] / [`ConfigStore::delete_entity`] are pending
//! until [`ConfigStore::save_changes`]; reads see pending writes.
//!
//! Transactions are scoped by [`Transaction`].  Only the outermost scope on a
//! thread talks to the backend: a nested `begin_transaction` on the same
//! thread returns a no-op scope.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

use crate::error::AppError;

/// A single configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Pluggable configuration store.
///
/// Stores are `Send + Sync` and use interior mutability; every method takes
/// `&self`.
pub trait ConfigStore: Send + Sync {
    /// Short backend name (e.g. `"memory"`, `"sqlite"`), used in logs.
    fn store_type(&self) -> &str;

    fn get_entity(&self, key: &str) -> Result<Option<ConfigEntry>, AppError>;

    /// All entries whose key starts with `prefix`, sorted by key.
    fn get_entities(&self, prefix: &str) -> Result<Vec<ConfigEntry>, AppError>;

    /// Insert or update by key.
    fn set_entity(&self, entry: ConfigEntry) -> Result<(), AppError>;

    /// Returns `true` if an entry was removed.
    fn delete_entity(&self, key: &str) -> Result<bool, AppError>;

    fn save_changes(&self) -> Result<(), AppError>;

    fn begin_transaction(&self) -> Result<Transaction<'_>, AppError>;
}

macro_rules! forward_config_store {
    ($ptr:ident) => {
        impl<S: ConfigStore + ?Sized> ConfigStore for $ptr<S> {
            fn store_type(&self) -> &str {
                (**self).store_type()
            }
            fn get_entity(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
                (**self).get_entity(key)
            }
            fn get_entities(&self, prefix: &str) -> Result<Vec<ConfigEntry>, AppError> {
                (**self).get_entities(prefix)
            }
            fn set_entity(&self, entry: ConfigEntry) -> Result<(), AppError> {
                (**self).set_entity(entry)
            }
            fn delete_entity(&self, key: &str) -> Result<bool, AppError> {
                (**self).delete_entity(key)
            }
            fn save_changes(&self) -> Result<(), AppError> {
                (**self).save_changes()
            }
            fn begin_transaction(&self) -> Result<Transaction<'_>, AppError> {
                (**self).begin_transaction()
            }
        }
    };
}

forward_config_store!(Box);
forward_config_store!(Arc);

/// Backend hooks driven by the outermost [`Transaction`] scope.
pub trait TransactionBackend: Send + Sync {
    fn tx_begin(&self) -> Result<(), AppError>;
    fn tx_commit(&self) -> Result<(), AppError>;
    fn tx_rollback(&self) -> Result<(), AppError>;
}

/// Tracks which thread owns the active transaction, if any.
#[derive(Debug, Default)]
pub struct TransactionGate {
    owner: Mutex<Option<ThreadId>>,
}

impl TransactionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for the current thread.
    ///
    /// Returns `Ok(true)` when the caller now owns the outermost transaction,
    /// `Ok(false)` when this thread already owns it (nested scope).  Another
    /// thread holding the gate is an error.
    pub fn enter(&self) -> Result<bool, AppError> {
        let me = thread::current().id();
        let mut owner = self
            .owner
            .lock()
            .map_err(|_| AppError::Store("transaction gate lock poisoned".into()))?;
        match *owner {
            None => {
                *owner = Some(me);
                Ok(true)
            }
            Some(id) if id == me => Ok(false),
            Some(_) => Err(AppError::Store(
                "a transaction is already active on another thread".into(),
            )),
        }
    }

    pub fn release(&self) {
        // A poisoned gate still holds a plain Option; clear it regardless.
        let mut owner = match self.owner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *owner = None;
    }

    pub fn is_active(&self) -> bool {
        match self.owner.lock() {
            Ok(g) => g.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

struct Outer<'a> {
    backend: &'a dyn TransactionBackend,
    gate: &'a TransactionGate,
}

/// Transaction scope returned by [`ConfigStore::begin_transaction`].
///
/// Dropping an outermost scope without calling [`commit`](Self::commit) rolls
/// it back.
///
/// The scope is tied to the thread that opened it, since the gate records
/// that thread as owner.  It is not `Send`:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<ampl::appconfig::Transaction<'static>>();
/// ```
#[must_use = "a transaction scope rolls back when dropped"]
pub struct Transaction<'a> {
    outer: Option<Outer<'a>>,
    _thread_bound: PhantomData<*const ()>,
}

impl<'a> Transaction<'a> {
    /// Open a scope against `backend`, or a no-op scope if this thread
    /// already has one open on `gate`.
    pub fn begin<B: TransactionBackend>(
        backend: &'a B,
        gate: &'a TransactionGate,
    ) -> Result<Self, AppError> {
        if !gate.enter()? {
            debug!("nested transaction scope; outer scope stays in charge");
            return Ok(Self {
                outer: None,
                _thread_bound: PhantomData,
            });
        }
        if let Err(e) = backend.tx_begin() {
            gate.release();
            return Err(e);
        }
        debug!("transaction started");
        Ok(Self {
            outer: Some(Outer { backend, gate }),
            _thread_bound: PhantomData,
        })
    }

    /// `true` for a nested scope whose commit/rollback do nothing.
    pub fn is_nested(&self) -> bool {
        self.outer.is_none()
    }

    pub fn commit(mut self) -> Result<(), AppError> {
        match self.outer.take() {
            Some(outer) => {
                let result = outer.backend.tx_commit();
                outer.gate.release();
                debug!(ok = result.is_ok(), "transaction committed");
                result
            }
            None => Ok(()),
        }
    }

    pub fn rollback(mut self) -> Result<(), AppError> {
        match self.outer.take() {
            Some(outer) => {
                let result = outer.backend.tx_rollback();
                outer.gate.release();
                debug!(ok = result.is_ok(), "transaction rolled back");
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(outer) = self.outer.take() {
            if let Err(e) = outer.backend.tx_rollback() {
                warn!(error = %e, "rollback of dropped transaction failed");
            }
            outer.gate.release();
        }
    }
}
