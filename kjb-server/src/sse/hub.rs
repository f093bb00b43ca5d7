//! Broadcast hub: fan-out of full state snapshots to every observer

use futures::stream::{BoxStream, StreamExt};
use kjb_common::events::StateMessage;
use kjb_common::JukeboxState;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Stream of snapshots for one observer: `initial` first, then `update`s
pub type ObserverStream = BoxStream<'static, StateMessage>;

/// Hub manages observer subscriptions and snapshot distribution
///
/// Delivery is best-effort. An observer that falls behind by more than the
/// channel capacity is dropped; the others are unaffected. A disconnected
/// observer drops its receiver and disappears on its own.
#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<StateMessage>,
}

impl BroadcastHub {
    /// Create a new hub
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of snapshots buffered per observer
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        info!("Broadcast hub initialized with capacity {}", capacity);
        Self { tx }
    }

    /// Send an `update` snapshot to every observer, returning how many got it
    pub fn publish(&self, state: &JukeboxState) -> usize {
        match self.tx.send(StateMessage::update(state.clone())) {
            Ok(count) => {
                debug!(revision = state.revision, "Broadcast snapshot to {} observers", count);
                count
            }
            // No observers connected
            Err(_) => 0,
        }
    }

    /// Current number of connected observers
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Register an observer whose first message is `current` as `initial`
    ///
    /// The caller must hold whatever lock serializes publishes while taking
    /// `current`, so the observer sees neither a gap nor a duplicate.
    pub fn subscribe(&self, current: JukeboxState) -> ObserverStream {
        let mut rx = self.tx.subscribe();
        let initial = StateMessage::initial(current);
        info!("Observer subscribed, total observers: {}", self.observer_count());

        let stream = async_stream::stream! {
            yield initial;
            loop {
                match rx.recv().await {
                    Ok(message) => yield message,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Observer lagged behind by {} snapshots, dropping it", skipped);
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };
        stream.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kjb_common::events::SnapshotKind;

    #[tokio::test]
    async fn test_subscribe_yields_initial_first() {
        let hub = BroadcastHub::new(8);
        let mut current = JukeboxState::default();
        current.revision = 3;

        let mut stream = hub.subscribe(current.clone());
        let first = stream.next().await.unwrap();
        assert_eq!(first.kind, SnapshotKind::Initial);
        assert_eq!(first.state, current);

        let mut next = current.clone();
        next.revision = 4;
        assert_eq!(hub.publish(&next), 1);

        let second = stream.next().await.unwrap();
        assert_eq!(second.kind, SnapshotKind::Update);
        assert_eq!(second.state.revision, 4);
    }

    #[tokio::test]
    async fn test_publish_without_observers() {
        let hub = BroadcastHub::new(8);
        assert_eq!(hub.publish(&JukeboxState::default()), 0);
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_observer_is_dropped_others_unaffected() {
        let hub = BroadcastHub::new(2);
        let mut slow = hub.subscribe(JukeboxState::default());
        let mut fast = hub.subscribe(JukeboxState::default());
        slow.next().await.unwrap();
        fast.next().await.unwrap();

        let mut state = JukeboxState::default();
        for revision in 1..=3 {
            state.revision = revision;
            hub.publish(&state);
            let message = fast.next().await.unwrap();
            assert_eq!(message.state.revision, revision);
        }

        // slow missed one of the three buffered updates
        assert!(slow.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_observer_is_removed() {
        let hub = BroadcastHub::new(8);
        let stream = hub.subscribe(JukeboxState::default());
        assert_eq!(hub.observer_count(), 1);
        drop(stream);
        assert_eq!(hub.observer_count(), 0);
    }
}
