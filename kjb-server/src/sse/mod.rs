//! Push channel: broadcast hub and its SSE encoding

pub mod hub;

pub use hub::{BroadcastHub, ObserverStream};
