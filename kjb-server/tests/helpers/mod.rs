//! Test helpers for kjb-server integration tests
//!
//! - FakePlayer: scripted in-memory stand-in for Kodi
//! - Jukebox: store, library and vote engine wired over a temp directory

#![allow(dead_code)]

use async_trait::async_trait;
use kjb_common::LibraryItem;
use kjb_server::player::{DirectoryEntry, PlayerError, PlayerGateway};
use kjb_server::{
    BroadcastHub, JsonFileStore, LibraryIndex, Reconciler, ReconcilerSettings, StateStore,
    VoteEngine,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// In-memory player: records play commands, fails on request
#[derive(Default)]
pub struct FakePlayer {
    plays: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
    playing: Mutex<Option<LibraryItem>>,
    listing: Mutex<Option<Vec<DirectoryEntry>>>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Player whose directory listing returns `files`
    pub fn with_files(files: &[&str]) -> Arc<Self> {
        let player = Self::default();
        player.set_listing(files);
        Arc::new(player)
    }

    pub fn set_listing(&self, files: &[&str]) {
        let entries = files.iter().map(|f| DirectoryEntry::new(*f, None)).collect();
        *self.listing.lock().unwrap() = Some(entries);
    }

    /// Make directory listing fail from now on
    pub fn break_listing(&self) {
        *self.listing.lock().unwrap() = None;
    }

    pub fn fail_on(&self, file: &str) {
        self.failing.lock().unwrap().insert(file.to_string());
    }

    pub fn fail_everything(&self) {
        *self.fail_all.lock().unwrap() = true;
    }

    pub fn set_playing(&self, item: Option<LibraryItem>) {
        *self.playing.lock().unwrap() = item;
    }

    /// Every file a play command was issued for, in order
    pub fn plays(&self) -> Vec<String> {
        self.plays.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerGateway for FakePlayer {
    async fn play(&self, file: &str) -> Result<(), PlayerError> {
        self.plays.lock().unwrap().push(file.to_string());
        if *self.fail_all.lock().unwrap() || self.failing.lock().unwrap().contains(file) {
            return Err(PlayerError::Rpc {
                code: -32100,
                message: format!("cannot open {}", file),
            });
        }
        *self.playing.lock().unwrap() = Some(LibraryItem::new(file, file));
        Ok(())
    }

    async fn now_playing(&self) -> Result<Option<LibraryItem>, PlayerError> {
        Ok(self.playing.lock().unwrap().clone())
    }

    async fn list_directory(&self, directory: &str) -> Result<Vec<DirectoryEntry>, PlayerError> {
        self.listing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PlayerError::Network(format!("cannot reach {}", directory)))
    }
}

/// Store, library and vote engine backed by a temp directory
pub struct Jukebox {
    pub dir: TempDir,
    pub store: Arc<StateStore>,
    pub library: Arc<LibraryIndex>,
    pub votes: VoteEngine,
    pub player: Arc<FakePlayer>,
}

impl Jukebox {
    /// Library of `files` (labels equal to file names)
    pub async fn with_library(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let persistence = Arc::new(JsonFileStore::new(dir.path().join("jukebox.json")));
        let store = Arc::new(StateStore::open(persistence, BroadcastHub::new(16)).await);
        let library = Arc::new(LibraryIndex::from_items(
            files.iter().map(|f| LibraryItem::new(*f, *f)).collect(),
        ));
        let votes = VoteEngine::new(store.clone(), library.clone());
        let player = FakePlayer::with_files(files);

        Self {
            dir,
            store,
            library,
            votes,
            player,
        }
    }

    pub async fn reconciler(&self, random_retry_limit: u32) -> Reconciler {
        Reconciler::new(
            self.store.clone(),
            self.library.clone(),
            self.player.clone(),
            ReconcilerSettings {
                retry_backoff: Duration::from_millis(5),
                random_retry_limit,
            },
        )
        .await
    }

    /// Put `file` in the queue with `votes` votes, proposed by `<file>-p`
    pub async fn queue(&self, file: &str, votes: u32) {
        self.votes
            .propose(kjb_server::ProposeRequest {
                label: Some(file.to_string()),
                file: Some(file.to_string()),
                user_id: Some(format!("{}-p", file)),
            })
            .await
            .unwrap();
        for n in 1..votes {
            self.votes
                .vote(kjb_server::VoteRequest {
                    file: Some(file.to_string()),
                    user_id: Some(format!("{}-v{}", file, n)),
                })
                .await
                .unwrap();
        }
    }
}
