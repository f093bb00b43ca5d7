//! Vote/queue engine: proposals and votes under invariant checks
//!
//! Proposing and voting share one slot per user. The slot is given back only
//! when the track the user backed leaves the queue.

use crate::library::LibraryIndex;
use crate::store::StateStore;
use kjb_common::{JukeboxError, QueueEntry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Body of a proposal; fields are optional so a missing one is reported as
/// `InvalidInput` rather than a deserialization failure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeRequest {
    pub label: Option<String>,
    pub file: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub file: Option<String>,
    pub user_id: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, JukeboxError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| JukeboxError::InvalidInput(format!("missing field: {}", field)))
}

#[derive(Clone)]
pub struct VoteEngine {
    store: Arc<StateStore>,
    library: Arc<LibraryIndex>,
}

impl VoteEngine {
    pub fn new(store: Arc<StateStore>, library: Arc<LibraryIndex>) -> Self {
        Self { store, library }
    }

    /// Queue a library item with one vote on behalf of `user_id`
    ///
    /// Checks, in order: fields present, user has not acted, file not queued,
    /// file in library.
    pub async fn propose(&self, request: ProposeRequest) -> Result<QueueEntry, JukeboxError> {
        let label = required(request.label, "label")?;
        let file = required(request.file, "file")?;
        let user_id = required(request.user_id, "userId")?;
        let library = &self.library;

        let entry = self
            .store
            .mutate(|state| {
                if state.has_acted(&user_id) {
                    return Err(JukeboxError::AlreadyActed(user_id.clone()));
                }
                if state.is_queued(&file) {
                    return Err(JukeboxError::DuplicateQueueEntry(file.clone()));
                }
                if !library.lookup(&file) {
                    return Err(JukeboxError::UnknownItem(file.clone()));
                }

                state.enqueue(&label, &file, &user_id);
                state.record_voter(&user_id, &file);
                state
                    .entry(&file)
                    .cloned()
                    .ok_or_else(|| JukeboxError::NotFound(file.clone()))
            })
            .await?;

        info!(file = %entry.file, user = %user_id, "Track proposed: {}", entry.label);
        Ok(entry)
    }

    /// Add `user_id`'s vote to a queued file, returning the new vote count
    pub async fn vote(&self, request: VoteRequest) -> Result<u32, JukeboxError> {
        let file = required(request.file, "file")?;
        let user_id = required(request.user_id, "userId")?;

        let votes = self
            .store
            .mutate(|state| {
                if state.has_acted(&user_id) {
                    return Err(JukeboxError::AlreadyActed(user_id.clone()));
                }
                let votes = state
                    .add_vote(&file)
                    .ok_or_else(|| JukeboxError::NotFound(file.clone()))?;
                state.record_voter(&user_id, &file);
                Ok(votes)
            })
            .await?;

        info!(file = %file, user = %user_id, votes, "Vote recorded");
        Ok(votes)
    }
}
