//! Errors raised while decoding or encoding tracker records.

use thiserror::Error;

use crate::scene::ItemId;

/// Tracker metadata could not be read from or written to a metadata blob.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed combatant record on item {item}")]
    MalformedCombatant {
        item: ItemId,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed tracker scene metadata")]
    MalformedScene(#[source] serde_json::Error),

    #[error("failed to encode tracker record")]
    Encode(#[from] serde_json::Error),
}
