//! Layered configuration store.
//!
//! Owns the cache policy and the layer definitions, each in a
//! [`ChangeTrackedMap`], and memoizes the runtime configuration a
//! [`ConfigParser`] derives from them. The parser runs again only after one
//! of the two maps changed.

pub mod shared;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::ConfigError;
use crate::parse::{ConfigParser, TileConfigParser};
use crate::tracked::{ChangeTrackedMap, Mapping};
use crate::types::{ConfigSnapshot, LayerDefinition, OptionBag};

pub use shared::SharedConfigStore;

/// Global cache settings: option name to value.
pub type CachePolicy = ChangeTrackedMap<String, Value>;


pub struct LayeredConfigStore<P: ConfigParser = TileConfigParser> {
    cache: CachePolicy,
    layers: ChangeTrackedMap<String, LayerDefinition>,
    parser: P,
    /// Last successfully built artifact.
    runtime: Option<Arc<P::Output>>,
}

impl<P: ConfigParser> LayeredConfigStore<P> {
    /// Create a store with an empty cache policy and no layers.
    pub fn new(parser: P) -> Self {
        Self::with_cache_policy(parser, CachePolicy::new())
    }

    pub fn with_cache_policy(parser: P, policy: impl Into<CachePolicy>) -> Self {
        let mut cache = policy.into();
        cache.mark_dirty();
        LayeredConfigStore {
            cache,
            layers: ChangeTrackedMap::new(),
            parser,
            runtime: None,
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    // -------------------------------------------------------------------
    // Layer mapping
    // -------------------------------------------------------------------

    /// Options of the layer stored under `name`.
    pub fn get(&self, name: &str) -> Result<&OptionBag, ConfigError> {
        self.layers.get(name).map(LayerDefinition::options)
    }

    /// The whole definition stored under `name`.
    pub fn layer(&self, name: &str) -> Result<&LayerDefinition, ConfigError> {
        self.layers.get(name)
    }

    /// Insert or replace the layer stored under `name`.
    ///
    /// The key wins over the definition's own name everywhere the store
    /// exposes layers. Returns the replaced definition, if any.
    pub fn set(&mut self, name: impl Into<String>, layer: LayerDefinition) -> Option<LayerDefinition> {
        let name = name.into();
        if layer.name() != name {
            debug!(key = %name, layer = layer.name(), "layer stored under a different key");
        }
        self.layers.set(name, layer)
    }

    /// Store a dynamically typed layer value.
    ///
    /// Anything but an option map is rejected, leaving the store untouched.
    pub fn set_value(&mut self, name: impl Into<String>, value: Value) -> Result<(), ConfigError> {
        let name = name.into();
        let layer = LayerDefinition::from_value(name.clone(), value)?;
        self.layers.set(name, layer);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<LayerDefinition, ConfigError> {
        self.layers.delete(name)
    }

    /// `(name, options)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionBag)> + '_ {
        self.layers
            .iter()
            .map(|(name, layer)| (name.as_str(), layer.options()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.keys().map(|k| k.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Replace every layer at once, each keyed by its own name.
    pub fn replace_layers(&mut self, layers: impl IntoIterator<Item = LayerDefinition>) {
        let mut map: ChangeTrackedMap<String, LayerDefinition> = layers
            .into_iter()
            .map(|layer| (layer.name().to_string(), layer))
            .collect();
        map.mark_dirty();
        self.layers = map;
    }

    // -------------------------------------------------------------------
    // Cache policy
    // -------------------------------------------------------------------

    pub fn cache_policy(&self) -> &CachePolicy {
        &self.cache
    }

    /// Mutable access for per-key edits. Every edit is tracked.
    pub fn cache_policy_mut(&mut self) -> &mut CachePolicy {
        &mut self.cache
    }

    /// Replace the whole cache policy.
    ///
    /// Accepts a tracked map or a plain bag (`IndexMap` or JSON object). The
    /// new policy counts as changed even if it was handed over clean.
    pub fn set_cache_policy(&mut self, policy: impl Into<CachePolicy>) {
        let mut policy = policy.into();
        policy.mark_dirty();
        self.cache = policy;
    }

    // -------------------------------------------------------------------
    // Derived runtime configuration
    // -------------------------------------------------------------------

    /// True when either the cache policy or the layers changed since the
    /// last successful build.
    pub fn is_dirty(&self) -> bool {
        self.cache.is_dirty() || self.layers.is_dirty()
    }

    /// Project the current state into the plain form parsers consume.
    pub fn as_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            cache: self.cache.as_map().clone(),
            layers: self
                .iter()
                .map(|(name, options)| (name.to_string(), options.clone()))
                .collect(),
        }
    }

    /// The runtime configuration for the current state.
    ///
    /// When nothing changed since the last build the cached artifact is
    /// returned and the parser is not called. Otherwise the parser runs on a
    /// fresh snapshot; on success its output replaces the cache and both maps
    /// are marked clean. A parser error is returned as is, and the store stays
    /// dirty with its previous artifact kept, so the next call retries.
    pub fn runtime_config(&mut self) -> Result<Arc<P::Output>, P::Error> {
        if !self.is_dirty() {
            if let Some(runtime) = &self.runtime {
                trace!("runtime config unchanged");
                return Ok(Arc::clone(runtime));
            }
        }

        let snapshot = self.as_snapshot();
        debug!(
            layers = snapshot.layers.len(),
            cache_keys = snapshot.cache.len(),
            "rebuilding runtime config"
        );
        match self.parser.parse(&snapshot) {
            Ok(output) => {
                let output = Arc::new(output);
                self.runtime = Some(Arc::clone(&output));
                self.cache.mark_clean();
                self.layers.mark_clean();
                Ok(output)
            }
            Err(err) => {
                warn!(error = %err, "runtime config rebuild failed");
                Err(err)
            }
        }
    }

    /// The last artifact built successfully, without triggering a rebuild.
    /// May be stale if the store is dirty.
    pub fn cached_runtime_config(&self) -> Option<Arc<P::Output>> {
        self.runtime.clone()
    }
}

impl Default for LayeredConfigStore<TileConfigParser> {
    fn default() -> Self {
        Self::new(TileConfigParser)
    }
}

impl<P: ConfigParser> fmt::Debug for LayeredConfigStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredConfigStore")
            .field("cache", &self.cache)
            .field("layers", &self.layers)
            .field("built", &self.runtime.is_some())
            .finish()
    }
}

impl<P: ConfigParser> Mapping for LayeredConfigStore<P> {
    type Value = LayerDefinition;
    type View = OptionBag;

    fn get(&self, key: &str) -> Result<&OptionBag, ConfigError> {
        LayeredConfigStore::get(self, key)
    }

    fn set(&mut self, key: String, value: LayerDefinition) -> Result<(), ConfigError> {
        LayeredConfigStore::set(self, key, value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<LayerDefinition, ConfigError> {
        LayeredConfigStore::delete(self, key)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &OptionBag)> + '_> {
        Box::new(self.iter())
    }

    fn len(&self) -> usize {
        LayeredConfigStore::len(self)
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Recorded = Rc<RefCell<Vec<Value>>>;
    type Parser = Box<dyn Fn(&ConfigSnapshot) -> Result<usize, String>>;
    type Store = LayeredConfigStore<Parser>;

    /// Parser that records every snapshot it sees and fails when any layer
    /// carries a `"bad option"`.
    fn recorder(seen: &Recorded) -> Parser {
        let seen = Rc::clone(seen);
        Box::new(move |snapshot: &ConfigSnapshot| {
            seen.borrow_mut().push(snapshot.to_json().unwrap());
            if let Some((name, _)) = snapshot
                .layers
                .iter()
                .find(|(_, bag)| bag.contains_key("bad option"))
            {
                return Err(format!("layer '{}' has an unknown option", name));
            }
            Ok(snapshot.layers.len())
        })
    }

    fn recording_store() -> (Store, Recorded) {
        let seen = Recorded::default();
        (LayeredConfigStore::new(recorder(&seen)), seen)
    }

    fn policy(doc: Value) -> CachePolicy {
        match doc {
            Value::Object(obj) => obj.into(),
            other => panic!("expected object, got {}", other),
        }
    }

    fn roads() -> LayerDefinition {
        LayerDefinition::named("roads").with_option("provider", "mapnik")
    }

    #[test]
    fn roads_scenario() {
        let seen = Recorded::default();
        let mut store: Store =
            LayeredConfigStore::with_cache_policy(recorder(&seen), policy(json!({"write cache": true})));
        store.set("roads", roads());

        store.runtime_config().unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(
            seen.borrow()[0],
            json!({"cache": {"write cache": true}, "layers": {"roads": {"provider": "mapnik"}}})
        );
        assert!(!store.is_dirty());

        store.delete("roads").unwrap();
        assert!(store.is_dirty());
        store.runtime_config().unwrap();
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(
            seen.borrow()[1],
            json!({"cache": {"write cache": true}, "layers": {}})
        );
    }

    #[test]
    fn new_store_is_dirty_and_empty() {
        let (store, _seen) = recording_store();
        assert!(store.is_dirty());
        assert!(store.is_empty());
        assert!(store.cache_policy().is_empty());
        assert!(store.cached_runtime_config().is_none());
    }

    #[test]
    fn empty_store_builds_once() {
        let (mut store, seen) = recording_store();
        assert_eq!(*store.runtime_config().unwrap(), 0);
        assert_eq!(seen.borrow()[0], json!({"cache": {}, "layers": {}}));
        store.runtime_config().unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn memoizes_until_mutation() {
        let (mut store, seen) = recording_store();
        store.set("roads", roads());

        let first = store.runtime_config().unwrap();
        let second = store.runtime_config().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(seen.borrow().len(), 1);

        let cached = store.cached_runtime_config().unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
    }

    #[test]
    fn reads_do_not_dirty() {
        let (mut store, _seen) = recording_store();
        store.set("roads", roads());
        store.runtime_config().unwrap();

        let _ = store.get("roads");
        let _ = store.get("missing");
        let _ = store.iter().count();
        let _ = store.as_snapshot();
        let _ = store.cache_policy().len();
        assert!(!store.is_dirty());
    }

    #[test]
    fn every_mutation_dirties() {
        let (mut store, seen) = recording_store();
        let mutations: Vec<Box<dyn Fn(&mut Store)>> = vec![
            Box::new(|s: &mut Store| {
                s.set("roads", roads());
            }),
            Box::new(|s: &mut Store| {
                s.set_value("water", json!({"provider": "proxy"})).unwrap();
            }),
            Box::new(|s: &mut Store| {
                s.delete("water").unwrap();
            }),
            Box::new(|s: &mut Store| {
                s.cache_policy_mut().set("write cache".into(), json!(false));
            }),
            Box::new(|s: &mut Store| {
                s.cache_policy_mut().delete("write cache").unwrap();
            }),
            Box::new(|s: &mut Store| s.set_cache_policy(policy(json!({"cache lifespan": 60})))),
            Box::new(|s: &mut Store| s.replace_layers(vec![roads()])),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            store.runtime_config().unwrap();
            assert!(!store.is_dirty(), "clean before mutation {}", i);
            mutate(&mut store);
            assert!(store.is_dirty(), "dirty after mutation {}", i);
            // Stays dirty until the next successful build.
            let _ = store.as_snapshot();
            assert!(store.is_dirty(), "still dirty after mutation {}", i);
        }
        assert_eq!(seen.borrow().len(), mutations.len());
    }

    #[test]
    fn rebuild_sees_new_state() {
        let (mut store, seen) = recording_store();
        store.set("roads", roads());
        store.runtime_config().unwrap();

        store.set(
            "roads",
            LayerDefinition::named("roads").with_option("provider", "proxy"),
        );
        store.cache_policy_mut().set("cache lifespan".into(), json!(300));
        assert_eq!(*store.runtime_config().unwrap(), 1);
        assert_eq!(
            seen.borrow()[1],
            json!({"cache": {"cache lifespan": 300}, "layers": {"roads": {"provider": "proxy"}}})
        );
    }

    #[test]
    fn invalid_layer_value_changes_nothing() {
        let (mut store, _seen) = recording_store();
        store.set("roads", roads());
        store.runtime_config().unwrap();
        let before = store.as_snapshot();

        for bad in [json!("mapnik"), json!(3), json!(null), json!([{"provider": "mapnik"}])] {
            match store.set_value("roads", bad) {
                Err(ConfigError::InvalidLayerValue { name, .. }) => assert_eq!(name, "roads"),
                other => panic!("expected InvalidLayerValue, got {:?}", other),
            }
        }
        assert!(matches!(
            store.set_value("water", json!(false)),
            Err(ConfigError::InvalidLayerValue { .. })
        ));
        assert_eq!(store.as_snapshot(), before);
        assert!(!store.is_dirty());
    }

    #[test]
    fn failed_rebuild_keeps_previous_artifact() {
        let (mut store, seen) = recording_store();
        store.set("roads", roads());
        let good = store.runtime_config().unwrap();

        store.set("roads", roads().with_option("bad option", true));
        let err = store.runtime_config().unwrap_err();
        assert_eq!(err, "layer 'roads' has an unknown option");
        assert!(store.is_dirty());
        assert!(Arc::ptr_eq(&store.cached_runtime_config().unwrap(), &good));

        // A second call retries rather than serving the stale artifact.
        assert!(store.runtime_config().is_err());
        assert_eq!(seen.borrow().len(), 3);

        store.set("roads", roads());
        store.set("water", LayerDefinition::named("water").with_option("provider", "proxy"));
        let fixed = store.runtime_config().unwrap();
        assert_eq!(*fixed, 2);
        assert!(!Arc::ptr_eq(&fixed, &good));
        assert!(!store.is_dirty());
        assert!(Arc::ptr_eq(&store.cached_runtime_config().unwrap(), &fixed));
    }

    #[test]
    fn failure_before_any_build_leaves_nothing_cached() {
        let (mut store, _seen) = recording_store();
        store.set("roads", roads().with_option("bad option", 1));
        assert!(store.runtime_config().is_err());
        assert!(store.cached_runtime_config().is_none());
        assert!(store.is_dirty());
    }

    #[test]
    fn cache_only_change_cleans_both_maps() {
        let (mut store, _seen) = recording_store();
        store.set("roads", roads());
        store.runtime_config().unwrap();

        store.cache_policy_mut().set("write cache".into(), json!(true));
        assert!(store.cache_policy().is_dirty());
        store.runtime_config().unwrap();
        assert!(!store.cache_policy().is_dirty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn snapshot_independent_of_mutation_history() {
        let (mut a, _seen) = recording_store();
        a.set("roads", roads());
        a.set("water", LayerDefinition::named("water"));
        a.set("tmp", LayerDefinition::named("tmp"));
        a.delete("tmp").unwrap();
        a.set("roads", roads().with_option("tile height", 512));

        let (mut b, _) = recording_store();
        b.set("roads", roads().with_option("tile height", 512));
        b.set("water", LayerDefinition::named("water"));

        assert_eq!(a.as_snapshot(), b.as_snapshot());
        assert_eq!(
            a.as_snapshot().to_json().unwrap(),
            json!({
                "cache": {},
                "layers": {"roads": {"provider": "mapnik", "tile height": 512}, "water": {}}
            })
        );
    }

    #[test]
    fn key_is_authoritative() {
        let (mut store, _seen) = recording_store();
        store.set("main", roads());
        assert_eq!(store.names(), vec!["main"]);
        assert!(store.get("roads").is_err());
        assert_eq!(store.layer("main").unwrap().name(), "roads");
        assert_eq!(store.as_snapshot().layer_names(), vec!["main"]);
    }

    #[test]
    fn get_returns_option_bag() {
        let (mut store, _seen) = recording_store();
        store.set("roads", roads());
        assert_eq!(store.get("roads").unwrap().get("provider"), Some(&json!("mapnik")));
        match store.get("water") {
            Err(ConfigError::NotFound(name)) => assert_eq!(name, "water"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn delete_missing_is_not_found_and_clean() {
        let (mut store, _seen) = recording_store();
        store.runtime_config().unwrap();
        assert!(matches!(store.delete("roads"), Err(ConfigError::NotFound(_))));
        assert!(!store.is_dirty());
    }

    #[test]
    fn iteration_order_and_restart() {
        let (mut store, _seen) = recording_store();
        for name in ["c", "a", "b"] {
            store.set(name, LayerDefinition::named(name));
        }
        let first: Vec<&str> = store.iter().map(|(name, _)| name).collect();
        let second: Vec<&str> = store.iter().map(|(name, _)| name).collect();
        assert_eq!(first, vec!["c", "a", "b"]);
        assert_eq!(first, second);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn set_cache_policy_accepts_clean_tracked_map() {
        let (mut store, _seen) = recording_store();
        store.runtime_config().unwrap();

        let (mut other, _) = recording_store();
        other.set_cache_policy(policy(json!({"name": "Disk"})));
        other.runtime_config().unwrap();
        let clean = other.cache_policy().clone();
        assert!(!clean.is_dirty());

        store.set_cache_policy(clean);
        assert!(store.is_dirty());
        assert_eq!(store.cache_policy().get("name").unwrap(), &json!("Disk"));
    }

    #[test]
    fn set_cache_policy_from_index_map() {
        let (mut store, _seen) = recording_store();
        let mut bag = OptionBag::new();
        bag.insert("stale lock timeout".into(), json!(10));
        store.set_cache_policy(bag);
        assert_eq!(store.as_snapshot().cache.get("stale lock timeout"), Some(&json!(10)));
    }

    #[test]
    fn replace_layers_keys_by_name() {
        let (mut store, _seen) = recording_store();
        store.set("old", LayerDefinition::named("old"));
        store.replace_layers(vec![roads(), LayerDefinition::named("water")]);
        assert_eq!(store.names(), vec!["roads", "water"]);
        assert!(!store.contains("old"));
    }

    #[test]
    fn store_through_mapping_trait() {
        fn add<M: Mapping<Value = LayerDefinition, View = OptionBag>>(m: &mut M) {
            m.set("roads".into(), LayerDefinition::named("roads").with_option("provider", "mapnik"))
                .unwrap();
        }
        let (mut store, _seen) = recording_store();
        add(&mut store);
        assert_eq!(Mapping::len(&store), 1);
        let entries: Vec<(&str, &OptionBag)> = store.entries().collect();
        assert_eq!(entries[0].0, "roads");
        assert_eq!(Mapping::delete(&mut store, "roads").unwrap().name(), "roads");
        assert!(Mapping::is_empty(&store));
    }

    #[test]
    fn default_store_validates_tile_options() {
        let mut store: LayeredConfigStore = LayeredConfigStore::default();
        store.set_cache_policy(policy(json!({"write cache": true})));
        store.set("roads", roads());
        let config = store.runtime_config().unwrap();
        assert_eq!(config.layer_names(), vec!["roads"]);

        store.set("roads", roads().with_option("tile height", -1));
        assert!(store.runtime_config().is_err());
        assert!(store.is_dirty());
        assert!(Arc::ptr_eq(&store.cached_runtime_config().unwrap(), &config));
    }

    #[test]
    fn debug_output_hides_parser() {
        let store: LayeredConfigStore = LayeredConfigStore::default();
        let text = format!("{:?}", store);
        assert!(text.contains("LayeredConfigStore"));
        assert!(text.contains("built: false"));
    }
}
