//! Records the tracker persists into scene metadata.
//!
//! Per-entity state ([`CombatantRecord`] with its [`EffectRecord`]s) lives
//! under a namespaced key in the owning item's metadata. Scene-wide state
//! ([`GroupRecord`]s and the highlighter id list) lives under the same key in
//! the scene metadata as one [`TrackerSceneState`] blob.

mod combatant;
mod effect;
mod group;
mod scene_state;

use std::fmt;

pub use combatant::CombatantRecord;
pub use effect::{EffectRecord, ProcessBar};
pub use group::{GroupId, GroupRecord};
pub use scene_state::TrackerSceneState;

/// Namespaced metadata key under which every tracker record is stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetadataKey(String);

impl MetadataKey {
    pub const DEFAULT: &'static str = "com.initiative-tracker/metadata";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MetadataKey {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
