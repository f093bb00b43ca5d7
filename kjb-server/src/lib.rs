//! # Kodi Jukebox Server
//!
//! Vote-driven jukebox in front of a Kodi media player. Users propose
//! library items and vote on queued ones; when the player stops, the
//! highest-voted entry is played, or a random library item when the queue
//! is empty. Every state change is persisted and pushed to browser clients
//! over SSE.
//!
//! Modules, bottom-up:
//! - [`persistence`]: snapshot load/store contract and the JSON file store
//! - [`sse`]: broadcast hub fanning snapshots out to observers
//! - [`store`]: single owner of the jukebox aggregate
//! - [`player`]: Kodi gateway (JSON-RPC client, notification feed, poller)
//! - [`library`]: catalog of playable items
//! - [`votes`]: proposals and votes
//! - [`reconciler`]: playback state machine
//! - [`api`]: HTTP endpoints

pub mod api;
pub mod error;
pub mod library;
pub mod persistence;
pub mod player;
pub mod reconciler;
pub mod sse;
pub mod store;
pub mod votes;

pub use api::{create_router, AppContext};
pub use error::{ApiError, ApiResult};
pub use library::LibraryIndex;
pub use persistence::{JsonFileStore, SnapshotStore};
pub use reconciler::{Outcome, Phase, Reconciler, ReconcilerSettings, Selection};
pub use sse::BroadcastHub;
pub use store::StateStore;
pub use votes::{ProposeRequest, VoteEngine, VoteRequest};
