//! Group Registry: named groups sharing one initiative slot.
//!
//! Groups live in the scene-wide tracker blob and are read-modify-written as
//! a whole. Membership is a back-reference on each member's record, so every
//! change that must reach members (initiative, visibility, removal) is
//! mirrored explicitly.

use tracing::{debug, info, warn};

use tracker_core::{CombatantRecord, GroupId, GroupRecord, ItemId};

use crate::error::{Result, TrackerError};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct GroupRegistry {
    store: RecordStore,
}

impl GroupRegistry {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Every group, in creation order.
    pub async fn all(&self) -> Result<Vec<GroupRecord>> {
        Ok(self.store.scene_state().await?.groups)
    }

    pub async fn get(&self, id: &GroupId) -> Result<GroupRecord> {
        self.store
            .scene_state()
            .await?
            .group(id)
            .cloned()
            .ok_or_else(|| TrackerError::GroupNotFound(id.clone()))
    }

    /// Registers a new group. Blank names become "Unnamed Group".
    pub async fn create(&self, name: &str, initiative: i32) -> Result<GroupRecord> {
        let group = GroupRecord::new(name, initiative);

        let mut state = self.store.scene_state().await?;
        state.groups.push(group.clone());
        self.store.save_scene_state(&state).await?;

        info!(target: "tracker::groups", group = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    /// Items whose record references `id`.
    pub async fn members(&self, id: &GroupId) -> Result<Vec<ItemId>> {
        let key = self.store.key().clone();
        let members = self
            .store
            .tracked_items()
            .await?
            .into_iter()
            .filter(|item| {
                CombatantRecord::read(item, &key)
                    .ok()
                    .flatten()
                    .is_some_and(|record| record.group.as_ref() == Some(id))
            })
            .map(|item| item.id)
            .collect();
        Ok(members)
    }

    /// Sets the group's initiative and mirrors it into every member record.
    pub async fn update_initiative(&self, id: &GroupId, initiative: i32) -> Result<()> {
        let mut state = self.store.scene_state().await?;
        let group = state
            .group_mut(id)
            .ok_or_else(|| TrackerError::GroupNotFound(id.clone()))?;
        group.initiative = initiative;
        self.store.save_scene_state(&state).await?;

        let mirrored = self
            .store
            .update_records(
                |_, record| record.group.as_ref() == Some(id),
                |_, record| record.initiative = initiative,
            )
            .await?;
        debug!(target: "tracker::groups", group = %id, initiative, mirrored, "group initiative set");
        Ok(())
    }

    pub async fn rename(&self, id: &GroupId, name: &str) -> Result<()> {
        let mut state = self.store.scene_state().await?;
        let group = state
            .group_mut(id)
            .ok_or_else(|| TrackerError::GroupNotFound(id.clone()))?;
        group.name = if name.trim().is_empty() {
            GroupRecord::UNNAMED.to_owned()
        } else {
            name.to_owned()
        };
        self.store.save_scene_state(&state).await?;
        Ok(())
    }

    /// Flips the group's hidden flag and mirrors it onto every member.
    /// Returns the new value.
    pub async fn toggle_visibility(&self, id: &GroupId) -> Result<bool> {
        let mut state = self.store.scene_state().await?;
        let group = state
            .group_mut(id)
            .ok_or_else(|| TrackerError::GroupNotFound(id.clone()))?;
        group.hidden = !group.hidden;
        let hidden = group.hidden;
        self.store.save_scene_state(&state).await?;

        self.store
            .update_records(
                |_, record| record.group.as_ref() == Some(id),
                |_, record| record.hidden = hidden,
            )
            .await?;
        debug!(target: "tracker::groups", group = %id, hidden, "group visibility toggled");
        Ok(hidden)
    }

    /// Deletes the group and clears the tracking record of every member.
    pub async fn remove(&self, id: &GroupId) -> Result<()> {
        let mut state = self.store.scene_state().await?;
        let before = state.groups.len();
        state.groups.retain(|group| &group.id != id);
        if state.groups.len() == before {
            warn!(target: "tracker::groups", group = %id, "group to remove does not exist");
        } else {
            self.store.save_scene_state(&state).await?;
        }

        // Members are cleared even when the group record was already gone.
        let cleared = self
            .store
            .clear_records(|_, record| record.group.as_ref() == Some(id))
            .await?;
        info!(target: "tracker::groups", group = %id, cleared, "group removed");
        Ok(())
    }
}
