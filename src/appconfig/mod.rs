//! AppConfig: typed key/value configuration over a pluggable store.
//!
//! Keys use dot notation (`"Module.Sub.Setting"`).  Values are stored as
//! strings and converted to and from Rust types through the
//! [`ConverterSet`] provided by the [`Configuration`].
//!
//! Lookup order for [`AppConfig::get`]:
//!
//! ```text
//! key ──► store ──found──► convert
//!          │
//!          └─absent─► resolve_default_key(key) ──► store ──found──► convert
//!                            (one hop only)          │
//!                                                    └─absent─► None
//! ```
//!
//! Nothing is committed until [`AppConfig::save_changes`].

pub mod configuration;
pub mod convert;
pub mod store;
pub mod stores;

pub use configuration::{AliasConfiguration, Configuration, DefaultConfiguration};
pub use convert::{Converter, ConverterSet};
pub use store::{ConfigEntry, ConfigStore, Transaction};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;
use crate::guard;

/// Typed facade over a [`ConfigStore`].
///
/// Holds no mutable state of its own; sharing it across threads is as safe
/// as the store it wraps.
pub struct AppConfig<S> {
    store: S,
    converters: ConverterSet,
    configuration: Box<dyn Configuration>,
}

impl<S: ConfigStore> AppConfig<S> {
    /// Facade with default converters and no key aliases.
    pub fn new(store: S) -> Self {
        Self::with_configuration(store, DefaultConfiguration)
    }

    pub fn with_configuration(store: S, configuration: impl Configuration + 'static) -> Self {
        let converters = configuration.converters();
        debug!(
            store = store.store_type(),
            converters = converters.len(),
            "app config ready"
        );
        Self {
            store,
            converters,
            configuration: Box::new(configuration),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn converters(&self) -> &ConverterSet {
        &self.converters
    }

    /// Read `key` as `T`.
    ///
    /// `Ok(None)` when neither the key nor its alias is present.  A missing
    /// converter or an unparsable stored value is an [`AppError::Conversion`].
    pub fn get<T: 'static>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.lookup(key)? {
            Some(entry) => self
                .converters
                .parse_value::<T>(&entry.key, &entry.value)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get), falling back to `default` when absent.
    pub fn get_or<T: 'static>(&self, key: &str, default: T) -> Result<T, AppError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Read a structured value stored as JSON text.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.lookup(key)? {
            Some(entry) => serde_json::from_str(&entry.value).map(Some).map_err(|e| {
                AppError::Conversion(format!("value of '{}' is not valid JSON: {e}", entry.key))
            }),
            None => Ok(None),
        }
    }

    /// Write `value` under `key`. Pending until [`save_changes`](Self::save_changes).
    pub fn set<T: 'static>(&self, key: &str, value: &T) -> Result<(), AppError> {
        guard::not_empty("key", key)?;
        let raw = self.converters.format_value(value)?;
        self.store.set_entity(ConfigEntry::new(key, raw))
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        guard::not_empty("key", key)?;
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Conversion(format!("cannot serialize '{key}' as JSON: {e}")))?;
        self.store.set_entity(ConfigEntry::new(key, raw))
    }

    /// Remove `key` (aliases are not followed). Returns `true` if it existed.
    pub fn delete(&self, key: &str) -> Result<bool, AppError> {
        guard::not_empty("key", key)?;
        self.store.delete_entity(key)
    }

    /// Raw entries under `prefix`, sorted by key.
    pub fn entries(&self, prefix: &str) -> Result<Vec<ConfigEntry>, AppError> {
        self.store.get_entities(prefix)
    }

    pub fn save_changes(&self) -> Result<(), AppError> {
        self.store.save_changes()
    }

    pub fn begin_transaction(&self) -> Result<Transaction<'_>, AppError> {
        self.store.begin_transaction()
    }

    fn lookup(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        guard::not_empty("key", key)?;
        if let Some(entry) = self.store.get_entity(key)? {
            return Ok(Some(entry));
        }
        match self.configuration.resolve_default_key(key) {
            Some(alias) if alias != key => {
                debug!(key, alias = %alias, "config key absent; trying alias");
                self.store.get_entity(&alias)
            }
            _ => Ok(None),
        }
    }
}
