//! Typed access to tracker records over a [`Scene`].

use std::sync::Arc;

use tracing::debug;

use tracker_core::{
    CombatantRecord, ItemId, MetadataKey, RecordError, SceneItem, TrackerSceneState,
};

use crate::error::Result;
use crate::scene::Scene;

/// Scene handle bound to the tracker's metadata key.
///
/// Cheap to clone; every engine holds one.
#[derive(Clone)]
pub struct RecordStore {
    scene: Arc<dyn Scene>,
    key: MetadataKey,
}

impl RecordStore {
    pub fn new(scene: Arc<dyn Scene>, key: MetadataKey) -> Self {
        Self { scene, key }
    }

    pub fn scene(&self) -> &dyn Scene {
        self.scene.as_ref()
    }

    pub fn key(&self) -> &MetadataKey {
        &self.key
    }

    /// Every item carrying a combatant record, in scene order.
    pub async fn tracked_items(&self) -> Result<Vec<SceneItem>> {
        let key = &self.key;
        let filter = |item: &SceneItem| CombatantRecord::is_tracked(item, key);
        Ok(self.scene.items(&filter).await?)
    }

    /// The scene-wide tracker blob. A missing blob reads as empty.
    pub async fn scene_state(&self) -> Result<TrackerSceneState> {
        let metadata = self.scene.metadata().await?;
        Ok(TrackerSceneState::read(&metadata, &self.key)?.unwrap_or_default())
    }

    pub async fn save_scene_state(&self, state: &TrackerSceneState) -> Result<()> {
        self.scene.set_metadata(state.to_update(&self.key)?).await?;
        Ok(())
    }

    pub async fn clear_scene_state(&self) -> Result<()> {
        self.scene
            .set_metadata(TrackerSceneState::cleared(&self.key))
            .await?;
        Ok(())
    }

    /// Applies `edit` to every decodable record matching `select`, in one
    /// batched store update. Returns the number of records written.
    pub async fn update_records<S, E>(&self, select: S, mut edit: E) -> Result<usize>
    where
        S: Fn(&SceneItem, &CombatantRecord) -> bool + Send + Sync,
        E: FnMut(&SceneItem, &mut CombatantRecord) + Send,
    {
        let key = &self.key;
        let filter = |item: &SceneItem| {
            matches!(CombatantRecord::read(item, key), Ok(Some(record)) if select(item, &record))
        };

        let mut written = 0usize;
        let mut failure: Option<RecordError> = None;
        let mut mutate = |items: &mut [SceneItem]| {
            for item in items.iter_mut() {
                let Ok(Some(mut record)) = CombatantRecord::read(item, key) else {
                    continue;
                };
                edit(&*item, &mut record);
                match record.write(item, key) {
                    Ok(()) => written += 1,
                    Err(error) => {
                        failure.get_or_insert(error);
                    }
                }
            }
        };
        self.scene.update_items(&filter, &mut mutate).await?;

        if let Some(error) = failure {
            return Err(error.into());
        }
        debug!(target: "tracker::store", written, "records updated");
        Ok(written)
    }

    /// Writes a record onto every item in `ids`. `make` receives the item
    /// and its current record, if any, and returns the record to store.
    pub async fn insert_records<M>(&self, ids: &[ItemId], make: M) -> Result<usize>
    where
        M: Fn(&SceneItem, Option<CombatantRecord>) -> CombatantRecord + Send + Sync,
    {
        let key = &self.key;
        let filter = |item: &SceneItem| ids.contains(&item.id);

        let mut written = 0usize;
        let mut failure: Option<RecordError> = None;
        let mut mutate = |items: &mut [SceneItem]| {
            for item in items.iter_mut() {
                let existing = CombatantRecord::read(item, key).ok().flatten();
                let record = make(&*item, existing);
                match record.write(item, key) {
                    Ok(()) => written += 1,
                    Err(error) => {
                        failure.get_or_insert(error);
                    }
                }
            }
        };
        self.scene.update_items(&filter, &mut mutate).await?;

        if let Some(error) = failure {
            return Err(error.into());
        }
        Ok(written)
    }

    /// Removes the record from every item matching `select`. Returns the
    /// number of records removed.
    pub async fn clear_records<S>(&self, select: S) -> Result<usize>
    where
        S: Fn(&SceneItem, &CombatantRecord) -> bool + Send + Sync,
    {
        let key = &self.key;
        let filter = |item: &SceneItem| {
            matches!(CombatantRecord::read(item, key), Ok(Some(record)) if select(item, &record))
        };

        let mut cleared = 0usize;
        let mut mutate = |items: &mut [SceneItem]| {
            for item in items.iter_mut() {
                if CombatantRecord::clear(item, key) {
                    cleared += 1;
                }
            }
        };
        self.scene.update_items(&filter, &mut mutate).await?;

        debug!(target: "tracker::store", cleared, "records cleared");
        Ok(cleared)
    }

    /// Removes the tracker key from every item that carries one, malformed
    /// records included.
    pub async fn clear_all_records(&self) -> Result<usize> {
        let key = &self.key;
        let filter = |item: &SceneItem| CombatantRecord::is_tracked(item, key);

        let mut cleared = 0usize;
        let mut mutate = |items: &mut [SceneItem]| {
            for item in items.iter_mut() {
                if CombatantRecord::clear(item, key) {
                    cleared += 1;
                }
            }
        };
        self.scene.update_items(&filter, &mut mutate).await?;
        Ok(cleared)
    }
}
