//! Durable snapshot of the jukebox state
//!
//! The store only needs a load/store contract: one structured record,
//! overwritten wholesale on every mutation.

use async_trait::async_trait;
use kjb_common::{JukeboxState, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load/store contract for the persisted snapshot
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the snapshot. `Ok(None)` means there is none yet; a corrupt
    /// snapshot is an `Err`.
    async fn load(&self) -> Result<Option<JukeboxState>>;

    /// Overwrite the snapshot with `state`
    async fn store(&self, state: &JukeboxState) -> Result<()>;
}

/// Snapshot kept as a single pretty-printed JSON file
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write never leaves a torn snapshot behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "jukebox.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Option<JukeboxState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    async fn store(&self, state: &JukeboxState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            revision = state.revision,
            "Snapshot saved"
        );
        Ok(())
    }
}
