//! Effect Lifecycle Engine.
//!
//! Keeps countdown indicators in step with the effects published by the
//! aggregator. Each reconcile pass compares the previously published effect
//! list with the new one: effects without an indicator get one, effects whose
//! rounds changed get their arc and label redrawn, and effects that vanished
//! lose their indicator and announce that they faded.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use tracker_core::{
    ARC_RADIUS, CombatantRecord, EffectRecord, ItemContent, ItemId, ProcessBar, SceneItem, Vector2,
    ViewerRole, arc_path, arc_sweep, build_effect_indicator, effect_anchor, label_text,
};

use crate::error::{Result, TrackerError};
use crate::store::RecordStore;
use crate::sync::SingleFlight;

/// What one reconcile pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectReport {
    pub built: usize,
    pub updated: usize,
    pub faded: usize,
}

pub struct EffectLifecycle {
    store: RecordStore,
    published: Mutex<Vec<EffectRecord>>,
    building: SingleFlight,
}

impl EffectLifecycle {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            published: Mutex::new(Vec::new()),
            building: SingleFlight::new(),
        }
    }

    /// The effect list published by the last reconcile pass.
    pub fn effects(&self) -> Vec<EffectRecord> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forgets the published list without touching the scene.
    pub fn forget(&self) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Reconciles indicators from the previously published list to `next`,
    /// then publishes `next`.
    ///
    /// The swap happens before any store call so overlapping passes each
    /// observe a disappearance exactly once.
    pub async fn reconcile(&self, next: Vec<EffectRecord>, role: ViewerRole) -> Result<EffectReport> {
        let previous = {
            let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
            mem::replace(&mut *published, next.clone())
        };

        let next_by_id: HashMap<&str, &EffectRecord> =
            next.iter().map(|effect| (effect.id.as_str(), effect)).collect();

        let mut report = EffectReport::default();
        let mut missing = Vec::new();
        let mut redraw = Vec::new();
        let mut vanished = Vec::new();

        for effect in &previous {
            match next_by_id.get(effect.id.as_str()) {
                Some(current) => {
                    let handle = current.process_bar.as_ref().or(effect.process_bar.as_ref());
                    match handle {
                        None => missing.push((*current).clone()),
                        Some(handle)
                            if current.rounds != effect.rounds
                                || current.total_rounds != effect.total_rounds =>
                        {
                            redraw.push((handle.clone(), current.rounds, current.total_rounds));
                        }
                        Some(_) => {}
                    }
                }
                None => vanished.push(effect),
            }
        }

        if !missing.is_empty() && role.is_privileged() {
            match self.building.try_begin() {
                Some(_flight) => report.built = self.build_indicators(&missing).await?,
                None => debug!(target: "tracker::effects", "indicator build already in flight"),
            }
        }

        if !redraw.is_empty() {
            report.updated = self.redraw(&redraw).await?;
        }

        if !vanished.is_empty() {
            if role.is_privileged() {
                let doomed: Vec<ItemId> = vanished
                    .iter()
                    .filter_map(|effect| effect.process_bar.as_ref())
                    .flat_map(ProcessBar::ids)
                    .collect();
                if !doomed.is_empty() {
                    self.store.scene().delete_items(&doomed).await?;
                }
            }
            for effect in &vanished {
                info!(
                    target: "tracker::effects",
                    entity = %effect.character_id,
                    effect = %effect.description,
                    "effect faded"
                );
                self.store.scene().notify(&effect.fade_message()).await?;
            }
            report.faded = vanished.len();
        }

        Ok(report)
    }

    /// Creates indicators for `effects` and stores their handles on the owning
    /// records. Returns how many handles were stored.
    async fn build_indicators(&self, effects: &[EffectRecord]) -> Result<usize> {
        let scene = self.store.scene();
        let dpi = scene.grid_dpi().await?;

        let owner_ids: HashSet<&ItemId> = effects.iter().map(|effect| &effect.character_id).collect();
        let filter = |item: &SceneItem| owner_ids.contains(&item.id);
        let owners: HashMap<ItemId, SceneItem> = scene
            .items(&filter)
            .await?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let mut built = 0;
        for effect in effects {
            let Some(owner) = owners.get(&effect.character_id) else {
                warn!(target: "tracker::effects", entity = %effect.character_id, "effect owner not found");
                continue;
            };

            let indicator = build_effect_indicator(effect, owner, dpi);
            let handle = indicator.handle();
            scene.add_items(indicator.into_items()).await?;

            // The owner's record is re-read inside the batch; a handle stored
            // by a concurrent pass wins and ours is discarded.
            let mut claimed = false;
            self.store
                .update_records(
                    |item, _| item.id == effect.character_id,
                    |_, record| {
                        if let Some(stored) = record.effect_mut(&effect.id)
                            && stored.process_bar.is_none()
                        {
                            stored.process_bar = Some(handle.clone());
                            claimed = true;
                        }
                    },
                )
                .await?;

            if claimed {
                built += 1;
                debug!(target: "tracker::effects", entity = %effect.character_id, effect = %effect.id, "indicator built");
            } else {
                debug!(
                    target: "tracker::effects",
                    entity = %effect.character_id,
                    effect = %effect.id,
                    "indicator already attached, discarding duplicate"
                );
                scene.delete_items(&handle.ids()).await?;
            }
        }
        Ok(built)
    }

    /// Redraws arc sweep and label text in place.
    async fn redraw(&self, changes: &[(ProcessBar, i32, Option<i32>)]) -> Result<usize> {
        let mut arcs = HashMap::new();
        let mut labels = HashMap::new();
        for (handle, rounds, total) in changes {
            arcs.insert(handle.path.clone(), arc_path(arc_sweep(*rounds, *total), ARC_RADIUS));
            labels.insert(handle.text.clone(), label_text(*rounds));
        }

        let filter = |item: &SceneItem| arcs.contains_key(&item.id) || labels.contains_key(&item.id);
        let mut mutate = |items: &mut [SceneItem]| {
            for item in items.iter_mut() {
                match &mut item.content {
                    ItemContent::Path(path) => {
                        if let Some(commands) = arcs.get(&item.id) {
                            path.commands = commands.clone();
                        }
                    }
                    ItemContent::Text(text) => {
                        if let Some(label) = labels.get(&item.id) {
                            text.text = label.clone();
                        }
                    }
                    _ => {}
                }
            }
        };
        self.store.scene().update_items(&filter, &mut mutate).await?;
        Ok(changes.len())
    }

    /// Deletes every indicator attached to effects of `owners`.
    pub async fn delete_indicators(&self, owners: &[ItemId]) -> Result<usize> {
        let key = self.store.key().clone();
        let doomed: Vec<ItemId> = self
            .store
            .tracked_items()
            .await?
            .iter()
            .filter(|item| owners.contains(&item.id))
            .filter_map(|item| CombatantRecord::read(item, &key).ok().flatten())
            .flat_map(|record| record.effects)
            .filter_map(|effect| effect.process_bar)
            .flat_map(|handle| handle.ids())
            .collect();

        if !doomed.is_empty() {
            self.store.scene().delete_items(&doomed).await?;
        }
        Ok(doomed.len() / 3)
    }

    /// Moves an existing indicator back to its owner's current anchor.
    pub async fn realign(&self, owner: &ItemId, effect_id: &str) -> Result<()> {
        let scene = self.store.scene();
        let key = self.store.key();

        let filter = |item: &SceneItem| &item.id == owner;
        let owner_item = scene
            .items(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TrackerError::CombatantNotFound(owner.clone()))?;
        let record = CombatantRecord::read(&owner_item, key)?
            .ok_or_else(|| TrackerError::CombatantNotFound(owner.clone()))?;
        let Some(handle) = record
            .effects
            .iter()
            .find(|effect| effect.id == effect_id)
            .and_then(|effect| effect.process_bar.clone())
        else {
            warn!(target: "tracker::effects", entity = %owner, effect = effect_id, "no indicator to realign");
            return Ok(());
        };

        let anchor = effect_anchor(&owner_item, scene.grid_dpi().await?);
        let filter = |item: &SceneItem| handle.ids().contains(&item.id);
        let mut mutate = |items: &mut [SceneItem]| {
            for item in items.iter_mut() {
                item.position = match &item.content {
                    ItemContent::Text(text) => Vector2::new(
                        anchor.x - text.width / 2.0,
                        anchor.y - text.font_size / 2.0,
                    ),
                    _ => anchor,
                };
            }
        };
        scene.update_items(&filter, &mut mutate).await?;
        debug!(target: "tracker::effects", entity = %owner, effect = effect_id, "indicator realigned");
        Ok(())
    }
}
