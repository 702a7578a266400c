//! The tracker façade consumed by the presentational layer.
//!
//! Every command catches its own errors: missing groups or entities are
//! logged as warnings, store failures as errors, and the command becomes a
//! no-op. The store stays the source of truth; the next change notification
//! or user action retries from whatever state it holds.

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tracker_core::{
    CombatantRecord, EffectRecord, GroupId, GroupRecord, InitiativeOrder, ItemId, RowKey,
    SceneItem,
};

use crate::advance::{AdvanceOutcome, RoundAdvancer};
use crate::aggregator::{RefreshReport, TurnOrderAggregator};
use crate::config::TrackerConfig;
use crate::effects::EffectLifecycle;
use crate::error::{Result, TrackerError};
use crate::groups::GroupRegistry;
use crate::highlighter::HighlighterSync;
use crate::scene::Scene;
use crate::store::RecordStore;

struct Inner {
    store: RecordStore,
    groups: GroupRegistry,
    effects: Arc<EffectLifecycle>,
    highlighter: Arc<HighlighterSync>,
    aggregator: Arc<TurnOrderAggregator>,
    advancer: RoundAdvancer,
}

/// Cloneable handle to one client's tracker.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Tracker {
    pub fn builder(scene: Arc<dyn Scene>) -> TrackerBuilder {
        TrackerBuilder::new(scene)
    }

    /// Receiver of the published initiative order and round.
    pub fn subscribe(&self) -> watch::Receiver<InitiativeOrder> {
        self.inner.aggregator.subscribe()
    }

    pub fn order(&self) -> InitiativeOrder {
        self.inner.aggregator.current()
    }

    pub fn round(&self) -> u32 {
        self.inner.aggregator.current().round
    }

    /// Effects tracked by the last refresh cycle.
    pub fn effects(&self) -> Vec<EffectRecord> {
        self.inner.effects.effects()
    }

    /// Spawns the task running refresh cycles on scene changes.
    ///
    /// Every cycle re-reads the store; a delivered snapshot may predate the
    /// tracker's own latest write. Notifications that queued up while a
    /// cycle ran are drained and answered by a single cycle. The task ends
    /// when the store drops its change channel.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let tracker = self.clone();
        let mut changes = self.inner.store.scene().subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(target: "tracker::aggregator", missed, "change notifications dropped, re-reading scene");
                    }
                    Err(RecvError::Closed) => {
                        debug!(target: "tracker::aggregator", "scene change channel closed");
                        break;
                    }
                }
                while let Ok(_) | Err(TryRecvError::Lagged(_)) = changes.try_recv() {}
                tracker.refresh().await;
            }
        })
    }

    /// Runs one refresh cycle from a fresh store read. `None` if the cycle
    /// failed or overlapped a reset.
    pub async fn refresh(&self) -> Option<RefreshReport> {
        let result = async {
            let everything = |_: &SceneItem| true;
            let items = self.inner.store.scene().items(&everything).await?;
            self.inner.aggregator.refresh(&items).await
        }
        .await;
        settle("refresh", result).flatten()
    }

    /// Advances to the next turn.
    pub async fn advance_turn(&self) -> Option<AdvanceOutcome> {
        settle("advance turn", self.inner.advancer.advance().await).flatten()
    }

    /// Removes every trace of tracking from the scene. Indicators go away
    /// without fade notices.
    pub async fn reset(&self) -> bool {
        let inner = &self.inner;
        inner.aggregator.begin_reset();
        let result = async {
            let tracked: Vec<ItemId> = inner
                .store
                .tracked_items()
                .await?
                .into_iter()
                .map(|item| item.id)
                .collect();
            inner.effects.delete_indicators(&tracked).await?;
            inner.highlighter.clear().await?;
            let cleared = inner.store.clear_all_records().await?;
            inner.store.clear_scene_state().await?;
            info!(target: "tracker::aggregator", cleared, "tracking reset");
            Ok::<_, TrackerError>(())
        }
        .await;
        // Effects are forgotten only once the records are gone, so no later
        // cycle sees them vanish.
        inner.aggregator.finish_reset(result.is_ok());
        settle("reset", result).is_some()
    }

    /// Sets the initiative of a row. Group rows update the group and every
    /// member.
    pub async fn set_initiative(&self, row: &RowKey, initiative: i32) -> bool {
        let result = match row {
            RowKey::Combatant(id) => self.edit_combatant(id, |record| record.initiative = initiative).await,
            RowKey::Group(group) => self.inner.groups.update_initiative(group, initiative).await,
        };
        settle("set initiative", result).is_some()
    }

    /// Sets the name shown for a row. A blank name clears a combatant's
    /// override; group rows rename the group.
    pub async fn set_display_name(&self, row: &RowKey, name: &str) -> bool {
        let result = match row {
            RowKey::Combatant(id) => {
                let name = name.trim();
                let display_name = (!name.is_empty()).then(|| name.to_owned());
                self.edit_combatant(id, move |record| record.display_name = display_name.clone())
                    .await
            }
            RowKey::Group(group) => self.inner.groups.rename(group, name).await,
        };
        settle("set display name", result).is_some()
    }

    /// Writes `rounds` on every record and publishes it as the round.
    pub async fn set_rounds(&self, rounds: u32) -> bool {
        let result = self
            .inner
            .store
            .update_records(|_, _| true, |_, record| record.rounds = rounds)
            .await;
        let done = settle("set rounds", result).is_some();
        if done {
            self.inner.aggregator.publish_round(rounds);
        }
        done
    }

    /// Starts tracking `ids`. Entities already tracked are left alone.
    pub async fn track(&self, ids: &[ItemId], initiative: i32) -> usize {
        let result = self
            .inner
            .store
            .insert_records(ids, |item, existing| {
                existing.unwrap_or_else(|| CombatantRecord::new(item.id.clone(), initiative))
            })
            .await;
        settle("track", result).unwrap_or_default()
    }

    /// Stops tracking `ids`, deleting their effect indicators first.
    pub async fn untrack(&self, ids: &[ItemId]) -> usize {
        let inner = &self.inner;
        let result = async {
            inner.effects.delete_indicators(ids).await?;
            inner
                .store
                .clear_records(|item, _| ids.contains(&item.id))
                .await
        }
        .await;
        settle("untrack", result).unwrap_or_default()
    }

    /// Tracks `ids` as one new group sharing `initiative`.
    pub async fn track_group(&self, ids: &[ItemId], name: &str, initiative: i32) -> Option<GroupId> {
        let inner = &self.inner;
        let result = async {
            let group = inner.groups.create(name, initiative).await?;
            let group_id = group.id.clone();
            inner
                .store
                .insert_records(ids, |item, existing| {
                    let mut record = existing.unwrap_or_else(|| CombatantRecord::new(item.id.clone(), initiative));
                    record.group = Some(group_id.clone());
                    record.initiative = group.initiative;
                    record.hidden = group.hidden;
                    record
                })
                .await?;
            Ok::<_, TrackerError>(group.id)
        }
        .await;
        settle("track group", result)
    }

    /// Removes a group together with its members' tracking.
    pub async fn untrack_group(&self, group: &GroupId) -> bool {
        let inner = &self.inner;
        let result = async {
            let members = inner.groups.members(group).await?;
            inner.effects.delete_indicators(&members).await?;
            inner.groups.remove(group).await
        }
        .await;
        settle("untrack group", result).is_some()
    }

    /// Flips `hidden` on the ungrouped combatants among `ids`.
    pub async fn toggle_hidden(&self, ids: &[ItemId]) -> usize {
        let result = self
            .inner
            .store
            .update_records(
                |item, record| record.group.is_none() && ids.contains(&item.id),
                |_, record| record.hidden = !record.hidden,
            )
            .await;
        settle("toggle hidden", result).unwrap_or_default()
    }

    /// Flips a group's hidden flag. Returns the new value.
    pub async fn toggle_group_hidden(&self, group: &GroupId) -> Option<bool> {
        settle("toggle group hidden", self.inner.groups.toggle_visibility(group).await)
    }

    /// Adds an effect lasting `rounds` rounds to every tracked entity in
    /// `ids`.
    pub async fn add_effect(&self, ids: &[ItemId], description: &str, rounds: i32) -> usize {
        let result = self
            .inner
            .store
            .update_records(
                |item, _| ids.contains(&item.id),
                |item, record| {
                    let effect = EffectRecord::new(item.id.clone(), item.display_text(), description, rounds);
                    debug!(target: "tracker::effects", entity = %item.id, effect = %effect.id, "effect added");
                    record.effects.push(effect);
                },
            )
            .await;
        settle("add effect", result).unwrap_or_default()
    }

    /// Removes every effect of `id` along with their indicators.
    pub async fn clear_effects(&self, id: &ItemId) -> bool {
        let inner = &self.inner;
        let result = async {
            inner.effects.delete_indicators(std::slice::from_ref(id)).await?;
            self.edit_combatant(id, |record| record.effects.clear()).await
        }
        .await;
        settle("clear effects", result).is_some()
    }

    /// Overwrites the remaining rounds of one effect. Non-positive values
    /// remove it; its indicator fades on the next cycle.
    pub async fn set_effect_rounds(&self, owner: &ItemId, effect_id: &str, rounds: i32) -> bool {
        let result = async {
            let mut found = false;
            self.edit_combatant(owner, |record| {
                if let Some(effect) = record.effect_mut(effect_id) {
                    effect.rounds = rounds;
                    found = true;
                }
                record.effects.retain(|effect| !effect.is_expired());
            })
            .await?;
            if !found {
                warn!(target: "tracker::effects", entity = %owner, effect = effect_id, "effect not found");
            }
            Ok::<_, TrackerError>(())
        }
        .await;
        settle("set effect rounds", result).is_some()
    }

    /// Moves an effect indicator back next to its owner.
    pub async fn realign_effect(&self, owner: &ItemId, effect_id: &str) -> bool {
        settle("realign effect", self.inner.effects.realign(owner, effect_id).await).is_some()
    }

    pub async fn groups(&self) -> Vec<GroupRecord> {
        settle("list groups", self.inner.groups.all().await).unwrap_or_default()
    }

    /// Applies `edit` to the record of `id`.
    async fn edit_combatant<E>(&self, id: &ItemId, edit: E) -> Result<()>
    where
        E: FnMut(&mut CombatantRecord) + Send,
    {
        let mut edit = edit;
        let written = self
            .inner
            .store
            .update_records(|item, _| &item.id == id, |_, record| edit(record))
            .await?;
        if written == 0 {
            return Err(TrackerError::CombatantNotFound(id.clone()));
        }
        Ok(())
    }
}

/// Logs a failed command and turns it into `None`.
fn settle<T>(operation: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_not_found() => {
            warn!(target: "tracker", operation, error = %e, "target not found");
            None
        }
        Err(e) => {
            error!(target: "tracker", operation, error = %e, "operation failed");
            None
        }
    }
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder {
    scene: Arc<dyn Scene>,
    config: TrackerConfig,
}

impl TrackerBuilder {
    pub fn new(scene: Arc<dyn Scene>) -> Self {
        Self {
            scene,
            config: TrackerConfig::default(),
        }
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Tracker {
        let store = RecordStore::new(self.scene, self.config.namespace.clone());
        let effects = Arc::new(EffectLifecycle::new(store.clone()));
        let highlighter = Arc::new(HighlighterSync::new(store.clone()));
        let aggregator = Arc::new(TurnOrderAggregator::new(
            store.clone(),
            self.config.clone(),
            Arc::clone(&effects),
            Arc::clone(&highlighter),
        ));
        let advancer = RoundAdvancer::new(
            store.clone(),
            self.config,
            Arc::clone(&highlighter),
            Arc::clone(&aggregator),
        );

        Tracker {
            inner: Arc::new(Inner {
                groups: GroupRegistry::new(store.clone()),
                store,
                effects,
                highlighter,
                aggregator,
                advancer,
            }),
        }
    }
}
