//! Turn advancement: picking the next slot and rolling rounds over.
use std::collections::HashSet;

use crate::order::Tracked;
use crate::record::{CombatantRecord, EffectRecord, GroupId, GroupRecord};
use crate::scene::ItemId;

/// Outcome of planning one "next turn" step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnPlan {
    /// Record id of the combatant (or group representative) that acts next.
    pub next_active: ItemId,
    /// Set when the next slot is a group.
    pub next_group: Option<GroupId>,
    /// The previous slot was the last one, or nobody was active.
    pub rollover: bool,
    /// Round counter after this step.
    pub round: u32,
}

/// Plans the next turn over all tracked combatants.
///
/// Groups collapse to their first member in scene order, the same rule the
/// displayed order uses, and slots are ranked by effective initiative. Returns
/// `None` when nothing is tracked.
pub fn plan_next_turn(tracked: &[Tracked<'_>], groups: &[GroupRecord]) -> Option<TurnPlan> {
    let mut seen: HashSet<&GroupId> = HashSet::new();
    let mut slots: Vec<(&Tracked<'_>, Option<&GroupRecord>)> = Vec::new();

    for entry in tracked {
        let group = entry.resolve_group(groups);
        if let Some(group) = group
            && !seen.insert(&group.id)
        {
            continue;
        }
        slots.push((entry, group));
    }

    let initiative = |slot: &(&Tracked<'_>, Option<&GroupRecord>)| {
        slot.1.map_or(slot.0.record.initiative, |group| group.initiative)
    };
    slots.sort_by(|a, b| initiative(b).cmp(&initiative(a)));

    let current_round = slots.first()?.0.record.rounds.max(1);
    let active = slots.iter().position(|(entry, _)| entry.record.active);

    let (next, rollover) = match active {
        Some(index) if index + 1 < slots.len() => (index + 1, false),
        _ => (0, true),
    };
    let (entry, group) = slots[next];

    Some(TurnPlan {
        next_active: entry.record.id.clone(),
        next_group: group.map(|group| group.id.clone()),
        rollover,
        round: if rollover {
            current_round.saturating_add(1)
        } else {
            current_round
        },
    })
}

/// Applies `plan` to one record and returns the effects that expired.
///
/// Only the planned record keeps `active`. On rollover the round counter
/// advances and every effect loses one round; effects reaching zero are
/// dropped from the record.
pub fn apply_turn(record: &mut CombatantRecord, plan: &TurnPlan) -> Vec<EffectRecord> {
    record.active = record.id == plan.next_active;

    if !plan.rollover {
        return Vec::new();
    }

    record.rounds = record.rounds.max(1).saturating_add(1);
    for effect in &mut record.effects {
        effect.rounds -= 1;
    }
    let (kept, expired): (Vec<_>, Vec<_>) = std::mem::take(&mut record.effects)
        .into_iter()
        .partition(|effect| !effect.is_expired());
    record.effects = kept;
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::collect_tracked;
    use crate::record::MetadataKey;
    use crate::scene::SceneItem;

    struct Encounter {
        items: Vec<SceneItem>,
        groups: Vec<GroupRecord>,
    }

    impl Encounter {
        /// A(10), B(15), group G(12) with members C and D.
        fn new() -> Self {
            let key = MetadataKey::default();
            let group = GroupRecord::new("G", 12);
            let mut items = Vec::new();
            for (id, initiative, grouped) in
                [("a", 10, false), ("b", 15, false), ("c", 12, true), ("d", 12, true)]
            {
                let mut item = SceneItem::token(id, id);
                let mut record = CombatantRecord::new(item.id.clone(), initiative);
                if grouped {
                    record.group = Some(group.id.clone());
                }
                record.write(&mut item, &key).unwrap();
                items.push(item);
            }
            Self {
                items,
                groups: vec![group],
            }
        }

        fn edit(&mut self, id: &str, f: impl FnOnce(&mut CombatantRecord)) {
            let key = MetadataKey::default();
            let item = self.items.iter_mut().find(|i| i.id.as_str() == id).unwrap();
            let mut record = CombatantRecord::read(item, &key).unwrap().unwrap();
            f(&mut record);
            record.write(item, &key).unwrap();
        }

        fn plan(&self) -> TurnPlan {
            let (tracked, _) = collect_tracked(&self.items, &MetadataKey::default());
            plan_next_turn(&tracked, &self.groups).unwrap()
        }

        fn apply(&mut self, plan: &TurnPlan) -> usize {
            let key = MetadataKey::default();
            let mut expired = 0;
            for item in &mut self.items {
                let mut record = CombatantRecord::read(item, &key).unwrap().unwrap();
                expired += apply_turn(&mut record, plan).len();
                record.write(item, &key).unwrap();
            }
            expired
        }

        fn record(&self, id: &str) -> CombatantRecord {
            let item = self.items.iter().find(|i| i.id.as_str() == id).unwrap();
            CombatantRecord::read(item, &MetadataKey::default()).unwrap().unwrap()
        }
    }

    #[test]
    fn nothing_tracked_plans_nothing() {
        assert_eq!(plan_next_turn(&[], &[]), None);
    }

    #[test]
    fn walks_the_order_and_rolls_over() {
        let mut encounter = Encounter::new();
        encounter.edit("b", |r| r.active = true);
        encounter.edit("a", |r| {
            r.effects.push(EffectRecord::new("a".into(), "a", "Poison", 2));
            r.effects.push(EffectRecord::new("a".into(), "a", "Daze", 1));
        });

        // B -> G: group slot, same round, effects untouched.
        let plan = encounter.plan();
        assert_eq!(plan.next_active, ItemId::from("c"));
        assert_eq!(plan.next_group, Some(encounter.groups[0].id.clone()));
        assert!(!plan.rollover);
        assert_eq!(plan.round, 1);
        assert_eq!(encounter.apply(&plan), 0);
        assert!(encounter.record("c").active);
        assert!(!encounter.record("d").active);
        assert!(!encounter.record("b").active);
        assert_eq!(encounter.record("a").effects.len(), 2);

        // G -> A: still within the round.
        let plan = encounter.plan();
        assert_eq!(plan.next_active, ItemId::from("a"));
        assert!(!plan.rollover);
        encounter.apply(&plan);

        // A is last: back to B, round +1, effects decay.
        let plan = encounter.plan();
        assert_eq!(plan.next_active, ItemId::from("b"));
        assert!(plan.rollover);
        assert_eq!(plan.round, 2);
        assert_eq!(encounter.apply(&plan), 1);

        let a = encounter.record("a");
        assert_eq!(a.rounds, 2);
        assert_eq!(a.effects.len(), 1);
        assert_eq!(a.effects[0].description, "Poison");
        assert_eq!(a.effects[0].rounds, 1);
        assert!(encounter.record("b").active);
        assert_eq!(encounter.record("d").rounds, 2);
    }

    #[test]
    fn no_active_slot_starts_at_the_top_with_rollover() {
        let encounter = Encounter::new();
        let plan = encounter.plan();
        assert_eq!(plan.next_active, ItemId::from("b"));
        assert!(plan.rollover);
        assert_eq!(plan.round, 2);
    }
}
