//! Config documents: YAML or JSON files holding a cache policy and layers.
//!
//! ```yaml
//! cache:
//!   name: Disk
//!   path: /tmp/stache
//! layers:
//!   roads:
//!     provider: {name: mapnik, mapfile: roads.xml}
//!     tile height: 512
//! ```
//!
//! Both sections are optional. Each layer must be a map of options.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::parse::ConfigParser;
use crate::store::LayeredConfigStore;
use crate::types::{ConfigSnapshot, LayerDefinition, OptionBag};


/// Serialization format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Format, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}


/// A loaded document: the cache policy and the layers in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    pub cache: OptionBag,
    pub layers: Vec<LayerDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    cache: OptionBag,
    #[serde(default)]
    layers: IndexMap<String, Value>,
}

impl ConfigDocument {
    fn from_raw(raw: RawDocument) -> Result<ConfigDocument, ConfigError> {
        let layers = raw
            .layers
            .into_iter()
            .map(|(name, value)| LayerDefinition::from_value(name, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConfigDocument {
            cache: raw.cache,
            layers,
        })
    }

    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> ConfigDocument {
        ConfigDocument {
            cache: snapshot.cache.clone(),
            layers: snapshot
                .layers
                .iter()
                .map(|(name, bag)| LayerDefinition::new(name.clone(), bag.clone()))
                .collect(),
        }
    }

    pub fn to_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            cache: self.cache.clone(),
            layers: self
                .layers
                .iter()
                .map(|layer| (layer.name().to_string(), layer.options().clone()))
                .collect(),
        }
    }

    /// Build a fresh store holding this document.
    pub fn into_store<P: ConfigParser>(self, parser: P) -> LayeredConfigStore<P> {
        let mut store = LayeredConfigStore::with_cache_policy(parser, self.cache);
        store.replace_layers(self.layers);
        store
    }

    /// Replace the cache policy and every layer of `store` with this document.
    pub fn apply_to<P: ConfigParser>(self, store: &mut LayeredConfigStore<P>) {
        store.set_cache_policy(self.cache);
        store.replace_layers(self.layers);
    }
}


/// Load a document, choosing YAML or JSON by extension.
pub fn load(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        Format::Yaml => parse_yaml(&content),
        Format::Json => parse_json(&content),
    }
}

pub fn parse_yaml(content: &str) -> Result<ConfigDocument, ConfigError> {
    // An empty YAML file is a null document, not an error.
    if content.trim().is_empty() {
        return Ok(ConfigDocument::default());
    }
    ConfigDocument::from_raw(serde_yaml::from_str(content)?)
}

pub fn parse_json(content: &str) -> Result<ConfigDocument, ConfigError> {
    ConfigDocument::from_raw(serde_json::from_str(content)?)
}

/// Write a snapshot as a document, in the format the extension implies.
pub fn save(path: &Path, snapshot: &ConfigSnapshot) -> Result<(), ConfigError> {
    let content = match Format::from_path(path)? {
        Format::Yaml => serde_yaml::to_string(snapshot)?,
        Format::Json => {
            let mut text = serde_json::to_string_pretty(snapshot)?;
            text.push('\n');
            text
        }
    };
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: PathBuf::from(path),
        source,
    })
}
