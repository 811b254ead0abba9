//! Persistent form of the configuration.

pub mod document;

pub use document::{load, parse_json, parse_yaml, save, ConfigDocument, Format};
