//! External player gateway
//!
//! The rest of the service sees the remote player through two narrow seams:
//! - [`PlayerGateway`]: request/reply calls (play a file, ask what is playing,
//!   list a directory)
//! - a stream of [`PlayerEvent`]s fed by [`feed::KodiEventFeed`] and
//!   [`poller::DetectionPoller`] into one channel

use async_trait::async_trait;
use kjb_common::events::PlayerEvent;
use kjb_common::{JukeboxError, LibraryItem};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

pub mod feed;
pub mod kodi;
pub mod poller;

pub use feed::KodiEventFeed;
pub use kodi::KodiClient;
pub use poller::DetectionPoller;

/// Player gateway errors
///
/// All of them surface to clients as `UpstreamUnavailable`.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error {0}")]
    Http(u16),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<PlayerError> for JukeboxError {
    fn from(e: PlayerError) -> Self {
        JukeboxError::UpstreamUnavailable(e.to_string())
    }
}

/// One entry of a player directory listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryEntry {
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
}

impl DirectoryEntry {
    pub fn new(file: impl Into<String>, label: Option<&str>) -> Self {
        Self {
            file: file.into(),
            label: label.map(str::to_string),
            filetype: Some("file".to_string()),
        }
    }
}

/// Request/reply side of the remote player
#[async_trait]
pub trait PlayerGateway: Send + Sync {
    /// Open and play `file`
    async fn play(&self, file: &str) -> Result<(), PlayerError>;

    /// What the player is playing right now, `None` if nothing
    async fn now_playing(&self) -> Result<Option<LibraryItem>, PlayerError>;

    /// Files in `directory` on the player host
    async fn list_directory(&self, directory: &str) -> Result<Vec<DirectoryEntry>, PlayerError>;
}

/// Ask the player what is playing and wrap the answer as an observation
///
/// The observation instant is taken before the request goes out, so it is
/// never newer than the state it describes.
pub async fn detect_now_playing(gateway: &dyn PlayerGateway) -> Option<PlayerEvent> {
    let observed_at = Instant::now();
    match gateway.now_playing().await {
        Ok(item) => Some(PlayerEvent::Started { item, observed_at }),
        Err(e) => {
            warn!("Failed to query current item: {}", e);
            None
        }
    }
}
