//! Jukebox data model
//!
//! [`JukeboxState`] is the aggregate root. It is owned by the state store in
//! `kjb-server`; everything here is plain data plus the pure helpers that keep
//! its invariants (one queue entry per file, one voter record per user,
//! queue ordered by votes then enqueue order).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// A playable item known to the external player. Identity is `file`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryItem {
    pub label: String,
    pub file: String,
}

impl LibraryItem {
    pub fn new(label: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            file: file.into(),
        }
    }
}

/// A proposed, not yet played track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub label: String,
    pub file: String,
    /// Always >= 1 (the proposal counts as the first vote)
    pub votes: u32,
    /// User who proposed the track
    pub proposer: String,
    /// Enqueue sequence number, the tie-breaker between equal vote counts
    #[serde(default)]
    pub seq: u64,
}

impl QueueEntry {
    pub fn as_item(&self) -> LibraryItem {
        LibraryItem::new(self.label.clone(), self.file.clone())
    }
}

/// Queue order: votes descending, then enqueue order ascending
pub fn queue_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.votes.cmp(&a.votes).then(a.seq.cmp(&b.seq))
}

/// The jukebox aggregate: queue, voter records and what is playing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JukeboxState {
    #[serde(default)]
    pub queue: Vec<QueueEntry>,

    /// userId -> file the user proposed or voted for
    #[serde(default)]
    pub voters: BTreeMap<String, String>,

    #[serde(default)]
    pub now_playing: Option<LibraryItem>,

    /// Bumped on every committed mutation
    #[serde(default)]
    pub revision: u64,

    /// Next enqueue sequence number
    #[serde(default)]
    pub next_seq: u64,
}

impl JukeboxState {
    /// Whether the user already used their one proposal/vote
    pub fn has_acted(&self, user_id: &str) -> bool {
        self.voters.contains_key(user_id)
    }

    pub fn is_queued(&self, file: &str) -> bool {
        self.queue.iter().any(|e| e.file == file)
    }

    pub fn entry(&self, file: &str) -> Option<&QueueEntry> {
        self.queue.iter().find(|e| e.file == file)
    }

    /// Highest-voted entry, ties broken by enqueue order
    pub fn head(&self) -> Option<&QueueEntry> {
        self.queue.iter().min_by(|a, b| queue_order(a, b))
    }

    /// Append a new entry with one vote and return its sequence number
    ///
    /// Does not check for duplicates; callers validate first.
    pub fn enqueue(&mut self, label: &str, file: &str, proposer: &str) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueueEntry {
            label: label.to_string(),
            file: file.to_string(),
            votes: 1,
            proposer: proposer.to_string(),
            seq,
        });
        self.sort_queue();
        seq
    }

    /// Add one vote to a queued file, returning the new count
    pub fn add_vote(&mut self, file: &str) -> Option<u32> {
        let entry = self.queue.iter_mut().find(|e| e.file == file)?;
        entry.votes += 1;
        let votes = entry.votes;
        self.sort_queue();
        Some(votes)
    }

    pub fn record_voter(&mut self, user_id: &str, file: &str) {
        self.voters.insert(user_id.to_string(), file.to_string());
    }

    pub fn remove_entry(&mut self, file: &str) -> Option<QueueEntry> {
        let index = self.queue.iter().position(|e| e.file == file)?;
        Some(self.queue.remove(index))
    }

    /// Remove every voter record pointing at `file`, returning the user ids
    pub fn clear_voters_for(&mut self, file: &str) -> Vec<String> {
        let users: Vec<String> = self
            .voters
            .iter()
            .filter(|(_, voted)| voted.as_str() == file)
            .map(|(user, _)| user.clone())
            .collect();
        for user in &users {
            self.voters.remove(user);
        }
        users
    }

    /// Stable sort: votes descending, enqueue order ascending
    pub fn sort_queue(&mut self) {
        self.queue.sort_by(queue_order);
    }

    /// Repair a snapshot read from disk
    ///
    /// Drops entries without a file, collapses duplicate files, clamps votes
    /// to at least one, renumbers duplicated sequence numbers in stored order
    /// and moves `next_seq` past every entry. Returns true if anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();

        self.queue.retain(|e| !e.file.trim().is_empty());

        let mut files = HashSet::new();
        self.queue.retain(|e| files.insert(e.file.clone()));

        for entry in &mut self.queue {
            entry.votes = entry.votes.max(1);
        }

        let mut seqs = HashSet::new();
        if !self.queue.iter().all(|e| seqs.insert(e.seq)) {
            let base = self.next_seq;
            for (offset, entry) in self.queue.iter_mut().enumerate() {
                entry.seq = base + offset as u64;
            }
        }

        if let Some(max_seq) = self.queue.iter().map(|e| e.seq).max() {
            self.next_seq = self.next_seq.max(max_seq + 1);
        }

        if matches!(&self.now_playing, Some(item) if item.file.trim().is_empty()) {
            self.now_playing = None;
        }

        self.sort_queue();
        *self != before
    }
}

/// Media extensions the jukebox will offer
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mp3", "flac", "ogg", "m4a", "wav"];

/// Whether a file path ends in a recognized media extension (case-insensitive)
pub fn is_media_file(file: &str) -> bool {
    match file.rsplit_once('.') {
        Some((_, ext)) => MEDIA_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Drop the last `.ext` of a name, unless the name would become empty
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 && !name[dot + 1..].contains(['/', '\\']) => &name[..dot],
        _ => name,
    }
}

/// Display label derived from a path: file name without extension
///
/// Accepts both `/` and `\` separators since the player may run on Windows.
pub fn label_from_path(file: &str) -> String {
    let name = file.rsplit(['/', '\\']).next().unwrap_or(file);
    strip_extension(name).to_string()
}
