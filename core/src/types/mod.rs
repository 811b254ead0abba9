//! Value types shared by the store and its parsers.

pub mod layer;
pub mod snapshot;

pub use layer::{value_kind, LayerDefinition, OptionBag};
pub use snapshot::ConfigSnapshot;
