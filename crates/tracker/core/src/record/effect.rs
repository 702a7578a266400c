use serde::{Deserialize, Serialize};

use crate::scene::ItemId;

/// Ids of the three visual elements making up a countdown indicator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessBar {
    pub path: ItemId,
    pub background: ItemId,
    pub text: ItemId,
}

impl ProcessBar {
    pub fn ids(&self) -> [ItemId; 3] {
        [self.path.clone(), self.background.clone(), self.text.clone()]
    }
}

/// Timed status effect owned by a combatant.
///
/// `rounds` stays positive while the effect exists; an effect whose rounds
/// drop to zero is removed together with its indicator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRecord {
    pub id: String,
    pub character_id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rounds: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rounds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_bar: Option<ProcessBar>,
}

impl EffectRecord {
    pub const DEFAULT_DESCRIPTION: &'static str = "Effect";

    /// New effect lasting `rounds` rounds. Blank descriptions and
    /// non-positive durations fall back to defaults.
    pub fn new(
        character_id: ItemId,
        name: impl Into<String>,
        description: &str,
        rounds: i32,
    ) -> Self {
        let rounds = if rounds > 0 { rounds } else { 1 };
        let description = if description.trim().is_empty() {
            Self::DEFAULT_DESCRIPTION.to_owned()
        } else {
            description.to_owned()
        };

        Self {
            id: ItemId::generate().0,
            character_id,
            name: name.into(),
            description,
            rounds,
            total_rounds: Some(rounds),
            process_bar: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.rounds <= 0
    }

    /// Text of the fade notification shown when the effect ends.
    pub fn fade_message(&self) -> String {
        format!("{} is fading...", self.description)
    }
}
