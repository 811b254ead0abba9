//! Change-tracked containers.
//!
//! [`ChangeTrackedMap`] is the ordered map behind both the cache policy and
//! the layer collection; [`Mapping`] is the small get/set/delete/iterate/len
//! interface they (and the store) implement.

pub mod map;
pub mod mapping;

pub use map::ChangeTrackedMap;
pub use mapping::Mapping;
