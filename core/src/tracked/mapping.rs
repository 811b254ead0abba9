use crate::error::ConfigError;
use super::map::ChangeTrackedMap;


/// The mapping surface shared by the cache policy, the layer map and the
/// store itself: string keys, checked reads, tracked writes.
///
/// `Value` is what callers assign; `View` is what reads hand back. They
/// differ for the store, which takes whole layer definitions but exposes
/// only their option bags.
pub trait Mapping {
    type Value;
    type View: ?Sized;

    fn get(&self, key: &str) -> Result<&Self::View, ConfigError>;

    fn set(&mut self, key: String, value: Self::Value) -> Result<(), ConfigError>;

    fn delete(&mut self, key: &str) -> Result<Self::Value, ConfigError>;

    /// Entries in order, borrowed from the state at call time.
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Self::View)> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Mapping for ChangeTrackedMap<String, V> {
    type Value = V;
    type View = V;

    fn get(&self, key: &str) -> Result<&V, ConfigError> {
        ChangeTrackedMap::get(self, key)
    }

    fn set(&mut self, key: String, value: V) -> Result<(), ConfigError> {
        ChangeTrackedMap::set(self, key, value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<V, ConfigError> {
        ChangeTrackedMap::delete(self, key)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &V)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn len(&self) -> usize {
        ChangeTrackedMap::len(self)
    }
}
