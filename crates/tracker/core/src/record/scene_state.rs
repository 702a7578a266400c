use serde::{Deserialize, Serialize};

use super::{GroupId, GroupRecord, MetadataKey};
use crate::error::RecordError;
use crate::scene::{ItemId, Metadata};

/// Scene-wide tracker blob: the group collection and the highlighter ids.
///
/// Read-modify-written as a whole. Unknown fields are carried through so
/// other writers of the same key keep their data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSceneState {
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    #[serde(default)]
    pub highlighters: Vec<ItemId>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl TrackerSceneState {
    /// Decodes the blob stored under `key`, if any.
    pub fn read(metadata: &Metadata, key: &MetadataKey) -> Result<Option<Self>, RecordError> {
        match metadata.get(key.as_str()) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(RecordError::MalformedScene),
        }
    }

    /// Metadata update that stores this blob under `key`.
    pub fn to_update(&self, key: &MetadataKey) -> Result<Metadata, RecordError> {
        let mut update = Metadata::new();
        update.insert(key.as_str().to_owned(), serde_json::to_value(self)?);
        Ok(update)
    }

    /// Metadata update that removes the blob stored under `key`.
    pub fn cleared(key: &MetadataKey) -> Metadata {
        let mut update = Metadata::new();
        update.insert(key.as_str().to_owned(), serde_json::Value::Null);
        update
    }

    pub fn group(&self, id: &GroupId) -> Option<&GroupRecord> {
        self.groups.iter().find(|group| &group.id == id)
    }

    pub fn group_mut(&mut self, id: &GroupId) -> Option<&mut GroupRecord> {
        self.groups.iter_mut().find(|group| &group.id == id)
    }
}
