//! Thread-safe handle to a [`LayeredConfigStore`].
//!
//! One lock covers the whole store, so a rebuild (dirty check, snapshot,
//! parse, flag reset) can never interleave with a mutation of either map.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ConfigError;
use crate::parse::{ConfigParser, TileConfigParser};
use crate::types::{ConfigSnapshot, LayerDefinition, OptionBag};
use super::{CachePolicy, LayeredConfigStore};


pub struct SharedConfigStore<P: ConfigParser = TileConfigParser> {
    inner: Arc<Mutex<LayeredConfigStore<P>>>,
}

impl<P: ConfigParser> SharedConfigStore<P> {
    pub fn new(store: LayeredConfigStore<P>) -> Self {
        SharedConfigStore {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access to the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut LayeredConfigStore<P>) -> R) -> R {
        let mut store = self.inner.lock();
        f(&mut store)
    }

    /// Options of a layer, copied out of the lock.
    pub fn get(&self, name: &str) -> Result<OptionBag, ConfigError> {
        self.with(|store| store.get(name).cloned())
    }

    pub fn set(&self, name: impl Into<String>, layer: LayerDefinition) -> Option<LayerDefinition> {
        self.with(|store| store.set(name, layer))
    }

    pub fn set_value(&self, name: impl Into<String>, value: Value) -> Result<(), ConfigError> {
        self.with(|store| store.set_value(name, value))
    }

    pub fn delete(&self, name: &str) -> Result<LayerDefinition, ConfigError> {
        self.with(|store| store.delete(name))
    }

    pub fn set_cache_policy(&self, policy: impl Into<CachePolicy>) {
        self.with(|store| store.set_cache_policy(policy))
    }

    pub fn len(&self) -> usize {
        self.with(|store| store.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|store| store.is_empty())
    }

    pub fn is_dirty(&self) -> bool {
        self.with(|store| store.is_dirty())
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.with(|store| store.as_snapshot())
    }

    /// See [`LayeredConfigStore::runtime_config`]. The whole rebuild runs
    /// under the store lock.
    pub fn runtime_config(&self) -> Result<Arc<P::Output>, P::Error> {
        self.with(|store| store.runtime_config())
    }
}

impl<P: ConfigParser> Clone for SharedConfigStore<P> {
    fn clone(&self) -> Self {
        SharedConfigStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ConfigParser> From<LayeredConfigStore<P>> for SharedConfigStore<P> {
    fn from(store: LayeredConfigStore<P>) -> Self {
        Self::new(store)
    }
}
