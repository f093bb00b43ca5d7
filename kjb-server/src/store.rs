//! State store: single owner of the jukebox aggregate
//!
//! Every mutation runs under one async mutex as a unit:
//! apply to a working copy -> commit -> persist -> publish.
//! Readers never observe a half-applied mutation, and a failed mutation
//! leaves no trace (no persist, no broadcast).

use crate::persistence::SnapshotStore;
use crate::sse::{BroadcastHub, ObserverStream};
use kjb_common::{JukeboxError, JukeboxState};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub struct StateStore {
    state: Mutex<JukeboxState>,
    persistence: Arc<dyn SnapshotStore>,
    hub: BroadcastHub,
}

impl StateStore {
    /// Load the persisted snapshot
    ///
    /// A missing or corrupt snapshot starts empty and is written back
    /// immediately. A snapshot that needed repair is written back too.
    pub async fn open(persistence: Arc<dyn SnapshotStore>, hub: BroadcastHub) -> Self {
        let (state, write_back) = match persistence.load().await {
            Ok(Some(mut state)) => {
                let repaired = state.normalize();
                info!(
                    queue = state.queue.len(),
                    voters = state.voters.len(),
                    revision = state.revision,
                    "Jukebox state loaded"
                );
                if repaired {
                    warn!("Persisted state needed repair, rewriting it");
                }
                (state, repaired)
            }
            Ok(None) => {
                info!("No persisted state found, starting empty");
                (JukeboxState::default(), true)
            }
            Err(e) => {
                warn!("Persisted state unreadable, starting empty: {}", e);
                (JukeboxState::default(), true)
            }
        };

        let store = Self {
            state: Mutex::new(state),
            persistence,
            hub,
        };

        if write_back {
            let state = store.state.lock().await;
            store.persist(&state).await;
        }

        store
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> JukeboxState {
        self.state.lock().await.clone()
    }

    /// Read from the current state without copying all of it
    pub async fn read<T>(&self, f: impl FnOnce(&JukeboxState) -> T) -> T {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Apply a fallible mutation
    ///
    /// On `Ok` the change is committed (revision bumped, queue re-sorted),
    /// persisted, then published. On `Err` nothing changes.
    pub async fn mutate<T, E>(
        &self,
        f: impl FnOnce(&mut JukeboxState) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.state.lock().await;

        let mut working = state.clone();
        let output = f(&mut working)?;
        working.revision += 1;
        working.sort_queue();
        *state = working;

        self.persist(&state).await;
        self.hub.publish(&state);
        Ok(output)
    }

    /// Apply a mutation that cannot fail
    pub async fn update<T>(&self, f: impl FnOnce(&mut JukeboxState) -> T) -> T {
        match self.mutate(|state| Ok::<T, Infallible>(f(state))).await {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }

    /// Register an observer; its stream starts with the current state
    pub async fn subscribe(&self) -> ObserverStream {
        let state = self.state.lock().await;
        self.hub.subscribe(state.clone())
    }

    /// Number of connected observers
    pub fn observer_count(&self) -> usize {
        self.hub.observer_count()
    }

    /// Write the current state out (graceful shutdown)
    pub async fn flush(&self) -> Result<(), JukeboxError> {
        let state = self.state.lock().await;
        self.persistence
            .store(&state)
            .await
            .map_err(|e| JukeboxError::PersistenceFailure(e.to_string()))
    }

    /// Persist, logging failure instead of propagating it
    ///
    /// A failed write degrades durability, not availability.
    async fn persist(&self, state: &JukeboxState) -> bool {
        match self.persistence.store(state).await {
            Ok(()) => true,
            Err(e) => {
                error!(revision = state.revision, "Failed to save jukebox state: {}", e);
                false
            }
        }
    }
}
