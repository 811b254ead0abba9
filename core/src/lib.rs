//! KTile configuration core.
//!
//! Holds a mutable, change-tracked tile server configuration (a global cache
//! policy plus named layer definitions) and lazily derives a validated runtime
//! configuration from it. The derived artifact is rebuilt only when either
//! half of the configuration changed since the last successful build.
//!
//! # Modules
//!
//! - [`tracked`]: Ordered maps with a dirty flag, and the `Mapping` interface
//! - [`types`]: Layer definitions and the plain snapshot handed to parsers
//! - [`store`]: `LayeredConfigStore` and its lock-guarded shared handle
//! - [`parse`]: Parser contract and the default tile config validator
//! - [`data`]: Loading and saving YAML/JSON config documents
//! - [`error`]: Error types

pub mod data;
pub mod error;
pub mod parse;
pub mod store;
pub mod tracked;
pub mod types;

pub use error::{ConfigError, ValidationError};
pub use parse::{ConfigParser, RuntimeConfig, TileConfigParser};
pub use store::{CachePolicy, LayeredConfigStore, SharedConfigStore};
pub use tracked::{ChangeTrackedMap, Mapping};
pub use types::{ConfigSnapshot, LayerDefinition, OptionBag};
