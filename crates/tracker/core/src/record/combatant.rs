use serde::{Deserialize, Serialize};

use super::{EffectRecord, GroupId, MetadataKey};
use crate::error::RecordError;
use crate::scene::{ItemId, SceneItem};

/// Turn-order state attached to a tracked entity.
///
/// `active` is set on at most one ungrouped combatant, or on the
/// representative record of one group. While `group` is set, `hidden` only
/// mirrors the group's flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantRecord {
    pub id: ItemId,
    #[serde(default)]
    pub initiative: i32,
    #[serde(default)]
    pub rounds: u32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub effects: Vec<EffectRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CombatantRecord {
    /// Fresh record for an entity that just started being tracked.
    pub fn new(id: ItemId, initiative: i32) -> Self {
        Self {
            id,
            initiative,
            rounds: 1,
            active: false,
            hidden: false,
            group: None,
            effects: Vec::new(),
            display_name: None,
        }
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    /// Returns true if the item carries a record under `key`.
    pub fn is_tracked(item: &SceneItem, key: &MetadataKey) -> bool {
        item.metadata
            .get(key.as_str())
            .is_some_and(|value| !value.is_null())
    }

    /// Decodes the record stored on `item`, if any.
    pub fn read(item: &SceneItem, key: &MetadataKey) -> Result<Option<Self>, RecordError> {
        match item.metadata.get(key.as_str()) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| RecordError::MalformedCombatant {
                    item: item.id.clone(),
                    source,
                }),
        }
    }

    /// Stores this record on `item`, replacing any previous one.
    pub fn write(&self, item: &mut SceneItem, key: &MetadataKey) -> Result<(), RecordError> {
        let value = serde_json::to_value(self)?;
        item.metadata.insert(key.as_str().to_owned(), value);
        Ok(())
    }

    /// Removes the record from `item`. Returns true if one was present.
    pub fn clear(item: &mut SceneItem, key: &MetadataKey) -> bool {
        item.metadata.remove(key.as_str()).is_some()
    }

    pub fn effect_mut(&mut self, effect_id: &str) -> Option<&mut EffectRecord> {
        self.effects.iter_mut().find(|effect| effect.id == effect_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn round_trips_through_item_metadata() {
        let key = MetadataKey::default();
        let mut item = SceneItem::token("hero", "Hero");
        let record = CombatantRecord::new(item.id.clone(), 14);

        record.write(&mut item, &key).unwrap();
        assert!(CombatantRecord::is_tracked(&item, &key));
        assert_eq!(CombatantRecord::read(&item, &key).unwrap(), Some(record));

        assert!(CombatantRecord::clear(&mut item, &key));
        assert_eq!(CombatantRecord::read(&item, &key).unwrap(), None);
    }

    #[test]
    fn decodes_sparse_camel_case_metadata() {
        let key = MetadataKey::default();
        let mut item = SceneItem::token("orc", "Orc");
        item.metadata.insert(
            key.as_str().to_owned(),
            json!({ "id": "orc", "initiative": -2, "displayName": "Big Orc", "group": "g1" }),
        );

        let record = CombatantRecord::read(&item, &key).unwrap().unwrap();
        assert_eq!(record.initiative, -2);
        assert_eq!(record.rounds, 0);
        assert!(record.effects.is_empty());
        assert_eq!(record.display_name.as_deref(), Some("Big Orc"));
        assert_eq!(record.group, Some(GroupId::new("g1")));
    }

    #[test]
    fn malformed_metadata_is_reported() {
        let key = MetadataKey::default();
        let mut item = SceneItem::token("bad", "Bad");
        item.metadata
            .insert(key.as_str().to_owned(), json!({ "initiative": "high" }));

        let err = CombatantRecord::read(&item, &key).unwrap_err();
        assert!(matches!(err, RecordError::MalformedCombatant { .. }));
    }
}
