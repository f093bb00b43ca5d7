//! Playback reconciler
//!
//! Keeps the jukebox's belief about playback in line with the external
//! player. It decides what to play when the player stops, issues the play
//! command, and accepts the player's own reports of what is playing.
//!
//! ```text
//!            stopped                decide               play ok
//!   Idle/Playing ──────▶ Stopping ──────▶ Commanding ──────────▶ Playing
//!                                   │          │ play failed
//!                                   │          ├─ queued entry: drop it, back off, decide again
//!                                   │          └─ random pick: back off, retry up to the cap
//!                                   └─ nothing to play ─▶ Idle
//! ```
//!
//! Events are handled one at a time by a single task, so two decisions never
//! interleave. The store lock is not held while a command is in flight.

use crate::library::LibraryIndex;
use crate::player::PlayerGateway;
use crate::store::StateStore;
use kjb_common::config::PlaybackConfig;
use kjb_common::events::PlayerEvent;
use kjb_common::{LibraryItem, QueueEntry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Reconciler state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing playing, nothing commanded
    Idle,
    /// A play command is in flight
    Commanding,
    /// A command succeeded or the player confirmed playback
    Playing,
    /// Stop received, deciding what comes next
    Stopping,
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Delay before deciding again after a failed command
    pub retry_backoff: Duration,
    /// Random-fallback attempts per decision round (minimum 1)
    pub random_retry_limit: u32,
}

impl From<&PlaybackConfig> for ReconcilerSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            retry_backoff: config.retry_backoff(),
            random_retry_limit: config.random_retry_limit,
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

/// What the decision step picked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Highest-voted queue entry
    Queued(QueueEntry),
    /// Random library item (queue empty)
    Random(LibraryItem),
}

impl Selection {
    pub fn file(&self) -> &str {
        match self {
            Selection::Queued(entry) => &entry.file,
            Selection::Random(item) => &item.file,
        }
    }

    pub fn item(&self) -> LibraryItem {
        match self {
            Selection::Queued(entry) => entry.as_item(),
            Selection::Random(item) => item.clone(),
        }
    }
}

/// Result of one decision round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The player accepted this selection
    Played(Selection),
    /// Queue and library both empty
    NothingToPlay,
    /// Random fallback kept failing until the retry cap
    GaveUp,
}

pub struct Reconciler {
    store: Arc<StateStore>,
    library: Arc<LibraryIndex>,
    gateway: Arc<dyn PlayerGateway>,
    settings: ReconcilerSettings,
    phase_tx: watch::Sender<Phase>,
    /// File most recently known to be playing, excluded from the next random pick
    last_played: Option<String>,
    /// When the latest play command was issued; older observations are stale
    last_command_at: Option<Instant>,
}

impl Reconciler {
    pub async fn new(
        store: Arc<StateStore>,
        library: Arc<LibraryIndex>,
        gateway: Arc<dyn PlayerGateway>,
        settings: ReconcilerSettings,
    ) -> Self {
        let now_playing = store.read(|state| state.now_playing.clone()).await;
        let phase = if now_playing.is_some() {
            Phase::Playing
        } else {
            Phase::Idle
        };
        let (phase_tx, _) = watch::channel(phase);

        Self {
            store,
            library,
            gateway,
            settings,
            phase_tx,
            last_played: now_playing.map(|item| item.file),
            last_command_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase_tx.borrow()
    }

    /// Receiver that follows phase changes
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, phase: Phase) {
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            debug!("Reconciler phase {:?} -> {:?}", *current, phase);
            *current = phase;
            true
        });
    }

    /// Handle player events until every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<PlayerEvent>) {
        info!("Playback reconciler started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Player event channel closed, reconciler stopping");
    }

    pub async fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Stopped => {
                let outcome = self.on_stopped().await;
                debug!("Stop handled: {:?}", outcome);
            }
            PlayerEvent::Started { item, observed_at } => {
                self.observe(item, observed_at).await;
            }
        }
    }

    /// Playback stopped: forget what was playing, then pick what comes next
    pub async fn on_stopped(&mut self) -> Outcome {
        info!("Playback stopped, choosing what to play next");
        self.set_phase(Phase::Stopping);

        let was_playing = self.store.read(|state| state.now_playing.is_some()).await;
        if was_playing {
            let finished = self.store.update(|state| state.now_playing.take()).await;
            if let Some(item) = finished {
                self.last_played = Some(item.file);
            }
        }

        let finished = self.last_played.clone();
        self.advance(finished.as_deref()).await
    }

    /// Decide and command until something plays or there is nothing left to try
    pub async fn advance(&mut self, finished: Option<&str>) -> Outcome {
        let limit = self.settings.random_retry_limit.max(1);
        let mut random_failures = 0;

        loop {
            let Some(selection) = self.decide(finished).await else {
                info!("Queue and library are empty, nothing to play");
                self.set_phase(Phase::Idle);
                return Outcome::NothingToPlay;
            };

            info!(file = %selection.file(), "Requesting playback");
            self.set_phase(Phase::Commanding);
            self.last_command_at = Some(Instant::now());

            match self.gateway.play(selection.file()).await {
                Ok(()) => {
                    self.commit_playing(&selection).await;
                    self.set_phase(Phase::Playing);
                    return Outcome::Played(selection);
                }
                Err(e) => {
                    self.record_failure(&selection).await;
                    match &selection {
                        Selection::Queued(entry) => {
                            warn!(file = %entry.file, "Play failed, dropping queued entry: {}", e);
                        }
                        Selection::Random(item) => {
                            random_failures += 1;
                            warn!(
                                file = %item.file,
                                attempt = random_failures,
                                limit,
                                "Play failed for random pick: {}", e
                            );
                            if random_failures >= limit {
                                warn!("Giving up until the next stop event");
                                self.set_phase(Phase::Idle);
                                return Outcome::GaveUp;
                            }
                        }
                    }
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
            }
        }
    }

    /// Highest-voted queue entry, else a random library item
    async fn decide(&self, finished: Option<&str>) -> Option<Selection> {
        if let Some(entry) = self.store.read(|state| state.head().cloned()).await {
            return Some(Selection::Queued(entry));
        }
        self.library.sample(finished).map(Selection::Random)
    }

    async fn commit_playing(&mut self, selection: &Selection) {
        let item = selection.item();
        let from_queue = matches!(selection, Selection::Queued(_));
        let file = item.file.clone();

        let released = self
            .store
            .update(|state| {
                state.now_playing = Some(item.clone());
                if from_queue {
                    state.remove_entry(&file);
                }
                state.clear_voters_for(&file)
            })
            .await;

        info!(
            file = %file,
            released_voters = released.len(),
            "Now playing: {}", item.label
        );
        self.last_played = Some(file);
    }

    /// Drop a failed queued entry (giving its voters their slot back) and
    /// stop tracking the file as playing
    async fn record_failure(&self, selection: &Selection) {
        let file = selection.file().to_string();
        let from_queue = matches!(selection, Selection::Queued(_));
        let tracked = self
            .store
            .read(|state| matches!(&state.now_playing, Some(item) if item.file == file))
            .await;
        if !from_queue && !tracked {
            return;
        }

        self.store
            .update(|state| {
                if from_queue {
                    state.remove_entry(&file);
                    state.clear_voters_for(&file);
                }
                if matches!(&state.now_playing, Some(item) if item.file == file) {
                    state.now_playing = None;
                }
            })
            .await;
    }

    /// Accept the player's report of what is playing
    ///
    /// Returns true if the stored belief changed. Observations taken before
    /// the latest play command are stale and ignored.
    pub async fn observe(&mut self, item: Option<LibraryItem>, observed_at: Instant) -> bool {
        if let Some(command_at) = self.last_command_at {
            if observed_at < command_at {
                debug!("Ignoring observation older than the last play command");
                return false;
            }
        }

        let believed = self.store.read(|state| state.now_playing.clone()).await;
        let changed = believed != item;
        if changed {
            self.store
                .update(|state| state.now_playing = item.clone())
                .await;
            match &item {
                Some(observed) => info!(file = %observed.file, "Now playing (detected): {}", observed.label),
                None => info!("Nothing playing (detected)"),
            }
        }

        match item {
            Some(observed) => {
                self.last_played = Some(observed.file);
                self.set_phase(Phase::Playing);
            }
            None => self.set_phase(Phase::Idle),
        }
        changed
    }
}
