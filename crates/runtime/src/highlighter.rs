//! Highlighter Synchronizer: "active turn" markers.
//!
//! The persisted marker id list is reconciled to one marker per target (the
//! active combatant, or every member of the active group), then each marker
//! is placed above and attached to its target.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use tracker_core::{ItemId, SceneItem, build_highlighter, highlighter_placement};

use crate::error::Result;
use crate::store::RecordStore;
use crate::sync::SingleFlight;

pub struct HighlighterSync {
    store: RecordStore,
    flight: SingleFlight,
}

impl HighlighterSync {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            flight: SingleFlight::new(),
        }
    }

    /// Returns true while a sync pass is running.
    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    /// Reconciles markers to `targets`. `grouped` selects the smaller group
    /// member markers.
    ///
    /// Returns the number of placed markers, or `None` if another pass was
    /// already running; the next aggregation cycle retries.
    pub async fn sync(&self, targets: &[ItemId], grouped: bool) -> Result<Option<usize>> {
        let Some(_flight) = self.flight.try_begin() else {
            debug!(target: "tracker::highlighter", "sync already in flight");
            return Ok(None);
        };

        let scene = self.store.scene();
        let mut state = self.store.scene_state().await?;

        let wanted: HashSet<&ItemId> = targets.iter().collect();
        let known: HashSet<&ItemId> = state.highlighters.iter().collect();
        let filter = |item: &SceneItem| wanted.contains(&item.id) || known.contains(&item.id);
        let found = scene.items(&filter).await?;

        let present: HashSet<&ItemId> = found.iter().map(|item| &item.id).collect();
        let mut target_items: Vec<&SceneItem> = Vec::with_capacity(targets.len());
        for id in targets {
            match found.iter().find(|item| &item.id == id) {
                Some(item) => target_items.push(item),
                None => warn!(target: "tracker::highlighter", entity = %id, "highlight target not found"),
            }
        }

        let original = state.highlighters.clone();
        // Markers deleted by someone else no longer count.
        state.highlighters.retain(|id| present.contains(id));

        if state.highlighters.len() > target_items.len() {
            let surplus = state.highlighters.split_off(target_items.len());
            scene.delete_items(&surplus).await?;
            debug!(target: "tracker::highlighter", removed = surplus.len(), "surplus markers deleted");
        } else if state.highlighters.len() < target_items.len() {
            let fresh: Vec<SceneItem> = (state.highlighters.len()..target_items.len())
                .map(|_| build_highlighter())
                .collect();
            state.highlighters.extend(fresh.iter().map(|marker| marker.id.clone()));
            debug!(target: "tracker::highlighter", created = fresh.len(), "markers created");
            scene.add_items(fresh).await?;
        }

        if state.highlighters != original {
            self.store.save_scene_state(&state).await?;
        }

        if !target_items.is_empty() {
            let dpi = scene.grid_dpi().await?;
            let placements: HashMap<&ItemId, &SceneItem> = state
                .highlighters
                .iter()
                .zip(target_items.iter().copied())
                .collect();

            let filter = |item: &SceneItem| placements.contains_key(&item.id);
            let mut mutate = |markers: &mut [SceneItem]| {
                for marker in markers.iter_mut() {
                    let Some(target) = placements.get(&marker.id) else {
                        continue;
                    };
                    let placement = highlighter_placement(target, dpi, grouped);
                    marker.position = placement.position;
                    marker.scale = placement.scale;
                    marker.attached_to = Some(target.id.clone());
                    marker.visible = target.visible;
                }
            };
            scene.update_items(&filter, &mut mutate).await?;
        }

        Ok(Some(target_items.len()))
    }

    /// Drops persisted marker ids whose item no longer exists. Writes only
    /// when something was pruned.
    ///
    /// Existence is checked against a fresh store read, never a change
    /// snapshot: a snapshot may predate a marker the last sync created.
    /// Skipped while a sync pass is running.
    pub async fn prune(&self) -> Result<usize> {
        let Some(_flight) = self.flight.try_begin() else {
            debug!(target: "tracker::highlighter", "sync in flight, prune skipped");
            return Ok(0);
        };

        let mut state = self.store.scene_state().await?;
        if state.highlighters.is_empty() {
            return Ok(0);
        }

        let known: HashSet<&ItemId> = state.highlighters.iter().collect();
        let filter = |item: &SceneItem| known.contains(&item.id);
        let existing: HashSet<ItemId> = self
            .store
            .scene()
            .items(&filter)
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();

        let before = state.highlighters.len();
        state.highlighters.retain(|id| existing.contains(id));
        let pruned = before - state.highlighters.len();

        if pruned > 0 {
            self.store.save_scene_state(&state).await?;
            debug!(target: "tracker::highlighter", pruned, "stale marker ids pruned");
        }
        Ok(pruned)
    }

    /// Deletes every persisted marker.
    pub async fn clear(&self) -> Result<usize> {
        let mut state = self.store.scene_state().await?;
        if state.highlighters.is_empty() {
            return Ok(0);
        }

        let markers = std::mem::take(&mut state.highlighters);
        self.store.scene().delete_items(&markers).await?;
        self.store.save_scene_state(&state).await?;
        Ok(markers.len())
    }

    /// Currently persisted marker ids.
    pub async fn markers(&self) -> Result<Vec<ItemId>> {
        Ok(self.store.scene_state().await?.highlighters)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracker_core::{MetadataKey, Vector2};

    use super::*;
    use crate::scene::{InMemoryScene, SceneItems};

    fn setup() -> (Arc<InMemoryScene>, HighlighterSync) {
        let scene = Arc::new(InMemoryScene::default().with_items([
            SceneItem::token("solo", "Solo").at(100.0, 400.0),
            SceneItem::token("m1", "M1").at(200.0, 400.0),
            SceneItem::token("m2", "M2").at(300.0, 400.0).invisible(),
            SceneItem::token("m3", "M3").at(400.0, 400.0),
        ]));
        let sync = HighlighterSync::new(RecordStore::new(scene.clone(), MetadataKey::default()));
        (scene, sync)
    }

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|id| ItemId::from(*id)).collect()
    }

    #[tokio::test]
    async fn marker_count_follows_targets() {
        let (scene, sync) = setup();

        assert_eq!(sync.sync(&ids(&["solo"]), false).await.unwrap(), Some(1));
        let markers = sync.markers().await.unwrap();
        assert_eq!(markers.len(), 1);
        let marker = scene.item(&markers[0]).unwrap();
        assert_eq!(marker.attached_to, Some(ItemId::from("solo")));
        assert_eq!(marker.scale, Vector2::splat(0.5));
        assert_eq!(marker.position, Vector2::new(100.0, 400.0 - (75.0 + 100.0)));

        assert_eq!(sync.sync(&ids(&["m1", "m2", "m3"]), true).await.unwrap(), Some(3));
        let markers = sync.markers().await.unwrap();
        assert_eq!(markers.len(), 3);
        let hidden_marker = scene.item(&markers[1]).unwrap();
        assert_eq!(hidden_marker.attached_to, Some(ItemId::from("m2")));
        assert!(!hidden_marker.visible);
        assert_eq!(hidden_marker.scale, Vector2::splat(0.25));

        assert_eq!(sync.sync(&ids(&["solo"]), false).await.unwrap(), Some(1));
        assert_eq!(sync.markers().await.unwrap().len(), 1);
        assert_eq!(scene.len(), 5);
    }

    #[tokio::test]
    async fn busy_sync_is_skipped() {
        let (_scene, sync) = setup();
        let _flight = sync.flight.try_begin().unwrap();
        assert!(sync.is_busy());
        assert_eq!(sync.sync(&ids(&["solo"]), false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn prune_only_writes_when_needed() {
        let (scene, sync) = setup();
        sync.sync(&ids(&["solo"]), false).await.unwrap();
        let marker = sync.markers().await.unwrap()[0].clone();

        assert_eq!(sync.prune().await.unwrap(), 0);

        scene.delete_items(&[marker]).await.unwrap();
        assert_eq!(sync.prune().await.unwrap(), 1);
        assert!(sync.markers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prune_keeps_markers_newer_than_a_snapshot() {
        let (scene, sync) = setup();
        let before_sync = scene.snapshot();
        sync.sync(&ids(&["solo"]), false).await.unwrap();
        let marker = sync.markers().await.unwrap()[0].clone();
        assert!(!before_sync.iter().any(|item| item.id == marker));

        assert_eq!(sync.prune().await.unwrap(), 0);
        assert_eq!(sync.markers().await.unwrap(), vec![marker.clone()]);
        assert!(scene.contains(&marker));
    }

    #[tokio::test]
    async fn prune_waits_for_running_sync() {
        let (scene, sync) = setup();
        sync.sync(&ids(&["solo"]), false).await.unwrap();
        let marker = sync.markers().await.unwrap()[0].clone();
        scene.delete_items(&[marker]).await.unwrap();

        let flight = sync.flight.try_begin().unwrap();
        assert_eq!(sync.prune().await.unwrap(), 0);
        drop(flight);
        assert_eq!(sync.prune().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_removes_every_marker() {
        let (scene, sync) = setup();
        sync.sync(&ids(&["m1", "m3"]), true).await.unwrap();
        assert_eq!(sync.clear().await.unwrap(), 2);
        assert_eq!(scene.len(), 4);
    }
}
