//! Configuration capability: which converters [`AppConfig`](super::AppConfig)
//! uses and how a missing key is redirected to another one.

use std::collections::HashMap;

use super::convert::ConverterSet;

pub trait Configuration: Send + Sync {
    /// Converters available to the facade. Read once, at construction.
    fn converters(&self) -> ConverterSet;

    /// Alias lookup for a key that is absent from the store.
    ///
    /// The facade follows the returned key exactly once; it never calls this
    /// again on the result.
    fn resolve_default_key(&self, key: &str) -> Option<String>;
}

/// Default converters, no aliases.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConfiguration;

impl Configuration for DefaultConfiguration {
    fn converters(&self) -> ConverterSet {
        ConverterSet::with_defaults()
    }

    fn resolve_default_key(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Converters plus a fixed `alias -> canonical key` map.
#[derive(Debug, Clone)]
pub struct AliasConfiguration {
    converters: ConverterSet,
    aliases: HashMap<String, String>,
}

impl AliasConfiguration {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self {
            converters: ConverterSet::with_defaults(),
            aliases,
        }
    }

    /// Replace the converter set (e.g. defaults plus application enums).
    pub fn with_converters(mut self, converters: ConverterSet) -> Self {
        self.converters = converters;
        self
    }

    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }
}

impl Default for AliasConfiguration {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl Configuration for AliasConfiguration {
    fn converters(&self) -> ConverterSet {
        self.converters.clone()
    }

    fn resolve_default_key(&self, key: &str) -> Option<String> {
        self.aliases.get(key).cloned()
    }
}
