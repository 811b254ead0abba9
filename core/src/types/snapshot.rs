use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::layer::OptionBag;


/// Plain projection of a store: `{cache: {...}, layers: {name: {...}}}`.
///
/// This is the only thing a parser ever sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub cache: IndexMap<String, Value>,
    #[serde(default)]
    pub layers: IndexMap<String, OptionBag>,
}

impl ConfigSnapshot {
    /// The snapshot as a nested JSON value, `{cache: {...}, layers: {...}}`.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.keys().map(|k| k.as_str()).collect()
    }
}
