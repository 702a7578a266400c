use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scene::ItemId;

/// Identifier of a combatant group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(ItemId::generate().0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named set of combatants sharing one initiative slot.
///
/// `hidden` is authoritative for every member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub initiative: i32,
    #[serde(default)]
    pub hidden: bool,
}

impl GroupRecord {
    pub const UNNAMED: &'static str = "Unnamed Group";

    pub fn new(name: &str, initiative: i32) -> Self {
        let name = if name.trim().is_empty() {
            Self::UNNAMED.to_owned()
        } else {
            name.to_owned()
        };

        Self {
            id: GroupId::generate(),
            name,
            initiative,
            hidden: false,
        }
    }
}
