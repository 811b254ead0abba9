use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No entry with the given key exists.
    #[error("no entry named '{0}'")]
    NotFound(String),
    /// A value assigned into the layer mapping was not an option map.
    #[error("invalid layer value for '{name}': expected an option map, found {found}")]
    InvalidLayerValue { name: String, found: &'static str },
    /// Filesystem I/O error while reading or writing a config document.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML config document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON config document: {0}")]
    Json(#[from] serde_json::Error),
    /// Document extension is neither YAML nor JSON.
    #[error("unsupported config document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

// ---------------------------------------------------------------------------
// Validation errors (default tile parser)
// ---------------------------------------------------------------------------

/// Raised by [`crate::parse::TileConfigParser`] when a snapshot does not
/// describe a usable tile configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Option bag could not be read into the expected shape (unknown option,
    /// wrong value type, missing required option).
    #[error("{section}: {source}")]
    Malformed {
        section: Section,
        #[source]
        source: serde_json::Error,
    },
    /// Option was well-formed but its value is out of range or inconsistent.
    #[error("{section}: invalid '{option}': {reason}")]
    InvalidOption {
        section: Section,
        option: &'static str,
        reason: String,
    },
}

impl ValidationError {
    pub fn section(&self) -> &Section {
        match self {
            ValidationError::Malformed { section, .. } => section,
            ValidationError::InvalidOption { section, .. } => section,
        }
    }
}

/// Which part of a snapshot a validation error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Cache,
    Layer(String),
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Cache => write!(f, "cache"),
            Section::Layer(name) => write!(f, "layer '{}'", name),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_key() {
        let err = ConfigError::NotFound("roads".into());
        assert_eq!(err.to_string(), "no entry named 'roads'");
    }

    #[test]
    fn invalid_layer_value_message() {
        let err = ConfigError::InvalidLayerValue {
            name: "roads".into(),
            found: "string",
        };
        assert_eq!(
            err.to_string(),
            "invalid layer value for 'roads': expected an option map, found string"
        );
    }

    #[test]
    fn section_display() {
        assert_eq!(Section::Cache.to_string(), "cache");
        assert_eq!(Section::Layer("roads".into()).to_string(), "layer 'roads'");
    }

    #[test]
    fn invalid_option_reports_section() {
        let err = ValidationError::InvalidOption {
            section: Section::Layer("roads".into()),
            option: "tile height",
            reason: "must be positive".into(),
        };
        assert_eq!(err.section(), &Section::Layer("roads".into()));
        assert_eq!(
            err.to_string(),
            "layer 'roads': invalid 'tile height': must be positive"
        );
    }
}
