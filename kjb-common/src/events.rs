//! Event types for the jukebox
//!
//! Two families live here:
//! - [`PlayerEvent`]: what the external player reported (input to the reconciler)
//! - [`StateMessage`]: what the push channel sends to browser clients

use crate::model::{JukeboxState, LibraryItem};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Notification from the external player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Playback stopped (track ended, skipped or stopped by hand)
    Stopped,

    /// The player reported what is active right now
    ///
    /// `item` is `None` when the player says nothing is playing.
    /// `observed_at` is when the observation was taken, used to discard
    /// observations older than the last play command.
    Started {
        item: Option<LibraryItem>,
        observed_at: Instant,
    },
}

impl PlayerEvent {
    /// Observation taken now
    pub fn started(item: Option<LibraryItem>) -> Self {
        PlayerEvent::Started {
            item,
            observed_at: Instant::now(),
        }
    }
}

/// Tag of a push-channel snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// First message an observer receives after subscribing
    Initial,
    /// Sent after every committed mutation
    Update,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Initial => "initial",
            SnapshotKind::Update => "update",
        }
    }
}

/// Full-state message sent over the push channel (no deltas)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMessage {
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub state: JukeboxState,
    pub emitted_at: chrono::DateTime<chrono::Utc>,
}

impl StateMessage {
    pub fn initial(state: JukeboxState) -> Self {
        Self::new(SnapshotKind::Initial, state)
    }

    pub fn update(state: JukeboxState) -> Self {
        Self::new(SnapshotKind::Update, state)
    }

    fn new(kind: SnapshotKind, state: JukeboxState) -> Self {
        Self {
            kind,
            state,
            emitted_at: chrono::Utc::now(),
        }
    }
}
