//! Parser contract and the default tile configuration parser.
//!
//! A store never interprets options itself. Whenever its configuration is
//! stale it hands a [`ConfigSnapshot`] to a [`ConfigParser`] and caches
//! whatever comes back.

pub mod options;
pub mod tile;

use std::fmt::Display;

use crate::types::ConfigSnapshot;

pub use tile::{RuntimeConfig, TileConfigParser};


/// Turns a snapshot into a runtime artifact, or explains why it cannot.
///
/// Implementations must be synchronous and deterministic for a given
/// snapshot. Closures of the right shape implement this trait too.
pub trait ConfigParser {
    type Output;
    type Error: Display;

    fn parse(&self, snapshot: &ConfigSnapshot) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> ConfigParser for F
where
    F: Fn(&ConfigSnapshot) -> Result<T, E>,
    E: Display,
{
    type Output = T;
    type Error = E;

    fn parse(&self, snapshot: &ConfigSnapshot) -> Result<T, E> {
        self(snapshot)
    }
}
