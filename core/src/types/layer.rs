use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Named options of a single layer (or of the cache policy). The schema is
/// owned by whichever parser consumes it.
pub type OptionBag = IndexMap<String, Value>;


/// A named layer and its option bag.
///
/// Immutable once built: updating a layer means storing a new definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    name: String,
    options: OptionBag,
}

impl LayerDefinition {
    pub fn new(name: impl Into<String>, options: OptionBag) -> Self {
        LayerDefinition {
            name: name.into(),
            options,
        }
    }

    /// A layer with no options yet; chain [`LayerDefinition::with_option`].
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, OptionBag::new())
    }

    /// Consume the definition and return it with one more option set.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Build a definition from a dynamically typed value.
    ///
    /// Only a JSON object is accepted; its members become the option bag.
    pub fn from_value(name: impl Into<String>, value: Value) -> Result<Self, ConfigError> {
        let name = name.into();
        match value {
            Value::Object(obj) => Ok(LayerDefinition {
                name,
                options: obj.into_iter().collect(),
            }),
            other => Err(ConfigError::InvalidLayerValue {
                name,
                found: value_kind(&other),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &OptionBag {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn into_options(self) -> OptionBag {
        self.options
    }
}

impl TryFrom<(String, Value)> for LayerDefinition {
    type Error = ConfigError;

    fn try_from((name, value): (String, Value)) -> Result<Self, Self::Error> {
        Self::from_value(name, value)
    }
}


/// Short JSON type name, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
