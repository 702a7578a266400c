//! Derived initiative order.
//!
//! The order is recomputed from scratch on every scene change: tracked
//! entities are collapsed by group, filtered by the viewer's privilege and
//! sorted by initiative. Nothing in here is persisted.
use std::collections::HashSet;

use serde::Serialize;

use crate::error::RecordError;
use crate::record::{CombatantRecord, EffectRecord, GroupId, GroupRecord, MetadataKey};
use crate::scene::{ItemId, SceneItem, ViewerRole};

/// A scene item paired with its decoded combatant record.
#[derive(Clone, Debug)]
pub struct Tracked<'a> {
    pub item: &'a SceneItem,
    pub record: CombatantRecord,
}

impl Tracked<'_> {
    /// Group this combatant belongs to, if the group still exists.
    pub fn resolve_group<'g>(&self, groups: &'g [GroupRecord]) -> Option<&'g GroupRecord> {
        let id = self.record.group.as_ref()?;
        groups.iter().find(|group| &group.id == id)
    }
}

/// Decodes every tracked item in scene order.
///
/// Items with malformed records are left out and their errors returned
/// alongside, so one bad record cannot blank the whole order.
pub fn collect_tracked<'a>(
    items: &'a [SceneItem],
    key: &MetadataKey,
) -> (Vec<Tracked<'a>>, Vec<RecordError>) {
    let mut tracked = Vec::new();
    let mut errors = Vec::new();

    for item in items {
        match CombatantRecord::read(item, key) {
            Ok(Some(record)) => tracked.push(Tracked { item, record }),
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
    }

    (tracked, errors)
}

/// Identity of a displayed row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RowKey {
    Combatant(ItemId),
    Group(GroupId),
}

/// One displayed row: a solo combatant or a collapsed group.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeItem {
    pub key: RowKey,
    /// Entity whose record backs this row (a group's representative).
    pub character_id: ItemId,
    pub name: String,
    pub display_name: Option<String>,
    pub initiative: i32,
    pub active: bool,
    pub rounds: u32,
    pub effects: Vec<EffectRecord>,
    pub visible: bool,
}

impl InitiativeItem {
    pub fn is_group(&self) -> bool {
        matches!(self.key, RowKey::Group(_))
    }

    pub fn group(&self) -> Option<&GroupId> {
        match &self.key {
            RowKey::Group(id) => Some(id),
            RowKey::Combatant(_) => None,
        }
    }

    /// Name shown for the row: the override when set, otherwise the name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// The published order together with the current round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InitiativeOrder {
    pub items: Vec<InitiativeItem>,
    pub round: u32,
}

impl InitiativeOrder {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn active(&self) -> Option<&InitiativeItem> {
        self.items.iter().find(|item| item.active)
    }
}

impl Default for InitiativeOrder {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            round: 1,
        }
    }
}

/// Builds the order shown to a viewer with `role`.
///
/// Grouped combatants collapse into the first member encountered; a group
/// reference that no longer resolves is treated as ungrouped. Hidden rows are
/// dropped for unprivileged viewers. Sorting is stable, so ties keep scene
/// order.
pub fn build_order(tracked: &[Tracked<'_>], groups: &[GroupRecord], role: ViewerRole) -> InitiativeOrder {
    let mut rows: Vec<InitiativeItem> = Vec::new();
    let mut seen_groups: HashSet<&GroupId> = HashSet::new();

    for entry in tracked {
        let group = entry.resolve_group(groups);
        if let Some(group) = group
            && seen_groups.contains(&group.id)
        {
            continue;
        }

        let hidden = group.map_or(entry.record.hidden, |group| group.hidden);
        if hidden && !role.is_privileged() {
            continue;
        }

        let record = &entry.record;
        let row = match group {
            Some(group) => {
                seen_groups.insert(&group.id);
                InitiativeItem {
                    key: RowKey::Group(group.id.clone()),
                    character_id: entry.item.id.clone(),
                    name: group.name.clone(),
                    display_name: None,
                    initiative: group.initiative,
                    active: record.active,
                    rounds: record.rounds.max(1),
                    effects: record.effects.clone(),
                    visible: !hidden,
                }
            }
            None => InitiativeItem {
                key: RowKey::Combatant(entry.item.id.clone()),
                character_id: entry.item.id.clone(),
                name: entry.item.display_text().to_owned(),
                display_name: record.display_name.clone(),
                initiative: record.initiative,
                active: record.active,
                rounds: record.rounds.max(1),
                effects: record.effects.clone(),
                visible: !hidden,
            },
        };
        rows.push(row);
    }

    rows.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    let round = rows.first().map_or(1, |row| row.rounds);

    InitiativeOrder { items: rows, round }
}

/// Flattens every effect that should be tracked this cycle.
///
/// Besides the effects on displayed rows this includes effects on group
/// members hidden behind their group's collapsed row, so they keep decaying
/// and keep their indicators.
pub fn collect_effects(order: &InitiativeOrder, tracked: &[Tracked<'_>]) -> Vec<EffectRecord> {
    let mut effects: Vec<EffectRecord> = order
        .items
        .iter()
        .flat_map(|row| row.effects.iter().cloned())
        .collect();

    let shown_groups: HashSet<&GroupId> = order.items.iter().filter_map(InitiativeItem::group).collect();
    if shown_groups.is_empty() {
        return effects;
    }
    let representatives: HashSet<&ItemId> = order.items.iter().map(|row| &row.character_id).collect();

    for entry in tracked {
        let Some(group) = entry.record.group.as_ref() else {
            continue;
        };
        if shown_groups.contains(group) && !representatives.contains(&entry.item.id) {
            effects.extend(entry.record.effects.iter().cloned());
        }
    }

    effects
}

/// Sizing rule of the host panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelLayout {
    pub row_height: u32,
    pub padding: u32,
    pub min_height: u32,
}

impl PanelLayout {
    /// Panel height fitting `rows` rows plus a header row.
    pub fn height_for(&self, rows: usize) -> u32 {
        let rows = u32::try_from(rows).unwrap_or(u32::MAX).saturating_add(1);
        rows.saturating_mul(self.row_height)
            .saturating_add(self.padding)
            .max(self.min_height)
    }
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            row_height: 50,
            padding: 25,
            min_height: 225,
        }
    }
}
