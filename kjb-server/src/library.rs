//! Library index: the catalog of playable items on the player
//!
//! Rebuilt wholesale on refresh and swapped in atomically; readers always see
//! either the old or the new catalog, never a mix.

use crate::player::{DirectoryEntry, PlayerGateway};
use kjb_common::model::{is_media_file, label_from_path, strip_extension};
use kjb_common::{JukeboxError, LibraryItem};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

#[derive(Default)]
pub struct LibraryIndex {
    items: RwLock<Arc<Vec<LibraryItem>>>,
}

/// Turn a raw directory listing into library items
///
/// Keeps recognized media files only, derives labels (provided label minus
/// extension, else file name minus extension) and drops duplicate files.
/// Directory entries are skipped even when their name looks like media.
pub fn build_items(entries: Vec<DirectoryEntry>) -> Vec<LibraryItem> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| entry.filetype.as_deref() != Some("directory"))
        .filter(|entry| !entry.file.is_empty() && is_media_file(&entry.file))
        .filter(|entry| seen.insert(entry.file.clone()))
        .map(|entry| {
            let label = entry
                .label
                .as_deref()
                .map(strip_extension)
                .filter(|label| !label.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| label_from_path(&entry.file));
            LibraryItem::new(label, entry.file)
        })
        .collect()
}

impl LibraryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<LibraryItem>) -> Self {
        let index = Self::new();
        index.replace(items);
        index
    }

    /// Fetch `directory` from the player and replace the index
    ///
    /// On failure the previous index stays in place.
    pub async fn refresh(
        &self,
        gateway: &dyn PlayerGateway,
        directory: &str,
    ) -> Result<usize, JukeboxError> {
        info!("Loading library from player directory {}", directory);
        let entries = gateway.list_directory(directory).await.map_err(|e| {
            warn!("Library refresh failed: {}", e);
            JukeboxError::from(e)
        })?;

        let listed = entries.len();
        let items = build_items(entries);
        let count = items.len();
        self.replace(items);
        info!("Library loaded with {} playable items ({} listed)", count, listed);
        Ok(count)
    }

    pub fn replace(&self, items: Vec<LibraryItem>) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(items);
    }

    /// Current catalog, in player listing order
    pub fn items(&self) -> Arc<Vec<LibraryItem>> {
        Arc::clone(&self.items.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn lookup(&self, file: &str) -> bool {
        self.items().iter().any(|item| item.file == file)
    }

    /// Case-insensitive substring match on labels; a blank query matches all
    pub fn search(&self, query: &str) -> Vec<LibraryItem> {
        let needle = query.trim().to_lowercase();
        self.items()
            .iter()
            .filter(|item| needle.is_empty() || item.label.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Random item, avoiding `excluding` when there is anything else to pick
    pub fn sample(&self, excluding: Option<&str>) -> Option<LibraryItem> {
        self.sample_with(excluding, &mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        excluding: Option<&str>,
        rng: &mut R,
    ) -> Option<LibraryItem> {
        let items = self.items();
        let mut candidates: Vec<&LibraryItem> = items.iter().collect();

        if let Some(excluded) = excluding {
            if candidates.len() > 1 {
                candidates.retain(|item| item.file != excluded);
                if candidates.is_empty() {
                    candidates = items.iter().collect();
                }
            }
        }

        candidates.choose(rng).map(|item| (*item).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn index_of(files: &[&str]) -> LibraryIndex {
        LibraryIndex::from_items(
            files
                .iter()
                .map(|f| LibraryItem::new(label_from_path(f), *f))
                .collect(),
        )
    }

    #[test]
    fn test_build_items_filters_and_labels() {
        let items = build_items(vec![
            DirectoryEntry::new("C:\\Kodi\\Song One.mp3", Some("Song One.mp3")),
            DirectoryEntry::new("C:\\Kodi\\clip.MP4", None),
            DirectoryEntry::new("C:\\Kodi\\cover.jpg", Some("cover.jpg")),
            DirectoryEntry::new("C:\\Kodi\\blank.flac", Some("  ")),
            DirectoryEntry::new("C:\\Kodi\\Song One.mp3", Some("dup")),
            DirectoryEntry::new("", Some("nothing.mp3")),
            DirectoryEntry {
                file: "C:\\Kodi\\Live Set.mp3".to_string(),
                label: Some("Live Set.mp3".to_string()),
                filetype: Some("directory".to_string()),
            },
        ]);

        assert_eq!(
            items,
            vec![
                LibraryItem::new("Song One", "C:\\Kodi\\Song One.mp3"),
                LibraryItem::new("clip", "C:\\Kodi\\clip.MP4"),
                LibraryItem::new("blank", "C:\\Kodi\\blank.flac"),
            ]
        );
    }

    #[test]
    fn test_lookup_and_search() {
        let index = index_of(&["/m/Alpha Song.mp3", "/m/beta.ogg", "/m/Gamma alpha.wav"]);
        assert!(index.lookup("/m/beta.ogg"));
        assert!(!index.lookup("/m/delta.ogg"));
        assert_eq!(index.search("ALPHA").len(), 2);
        assert_eq!(index.search("  ").len(), 3);
        assert!(index.search("zeta").is_empty());
    }

    #[test]
    fn test_sample_excludes_just_finished() {
        let index = index_of(&["a.mp3", "b.mp3"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let item = index.sample_with(Some("a.mp3"), &mut rng).unwrap();
            assert_eq!(item.file, "b.mp3");
        }
    }

    #[test]
    fn test_sample_single_item_library_repeats() {
        let index = index_of(&["a.mp3"]);
        let item = index.sample(Some("a.mp3")).unwrap();
        assert_eq!(item.file, "a.mp3");
    }

    #[test]
    fn test_sample_falls_back_when_exclusion_empties_candidates() {
        // Duplicates are filtered on refresh, but a hand-built index may hold them
        let index = LibraryIndex::from_items(vec![
            LibraryItem::new("a", "a.mp3"),
            LibraryItem::new("a again", "a.mp3"),
        ]);
        let item = index.sample(Some("a.mp3")).unwrap();
        assert_eq!(item.file, "a.mp3");
    }

    #[test]
    fn test_sample_empty_library() {
        assert!(LibraryIndex::new().sample(None).is_none());
    }
}
