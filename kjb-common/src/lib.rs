//! # Kodi Jukebox Common Library
//!
//! Shared code for the jukebox service and its tests:
//! - Data model (library items, queue entries, the jukebox aggregate)
//! - Wire messages for the push channel
//! - Player events reported by the external player
//! - Error taxonomy
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, ErrorKind, JukeboxError, Result};
pub use model::{JukeboxState, LibraryItem, QueueEntry};
