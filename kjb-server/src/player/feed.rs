//! Kodi notification feed
//!
//! Listens on Kodi's WebSocket JSON-RPC endpoint and turns player
//! notifications into [`PlayerEvent`]s. The connection is re-established
//! forever on a fixed delay.

use super::{detect_now_playing, PlayerError, PlayerGateway};
use futures::{SinkExt, StreamExt};
use kjb_common::events::PlayerEvent;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

/// Player notifications the jukebox reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// `Player.OnStop`
    Stopped,
    /// `Player.OnPlay`
    Played,
}

/// Classify one text frame; replies to requests (frames with an `id`) and
/// unrelated notifications yield `None`
pub fn parse_notification(text: &str) -> Option<Notification> {
    let message: Value = serde_json::from_str(text).ok()?;
    if message.get("id").is_some() {
        return None;
    }
    match message.get("method")?.as_str()? {
        "Player.OnStop" => Some(Notification::Stopped),
        "Player.OnPlay" => Some(Notification::Played),
        _ => None,
    }
}

pub struct KodiEventFeed {
    ws_url: String,
    gateway: Arc<dyn PlayerGateway>,
    reconnect_delay: Duration,
    settle: Duration,
}

impl KodiEventFeed {
    /// # Arguments
    ///
    /// * `ws_url` - Kodi WebSocket endpoint, e.g. `ws://host:9090/jsonrpc`
    /// * `gateway` - used to resolve what started after `Player.OnPlay`
    /// * `reconnect_delay` - wait between connection attempts
    /// * `settle` - wait after a notification before acting on it
    pub fn new(
        ws_url: String,
        gateway: Arc<dyn PlayerGateway>,
        reconnect_delay: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            ws_url,
            gateway,
            reconnect_delay,
            settle,
        }
    }

    /// Run the feed in the background until the receiver side is dropped
    pub fn spawn(self, tx: mpsc::Sender<PlayerEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(tx))
    }

    async fn run(self, tx: mpsc::Sender<PlayerEvent>) {
        loop {
            match self.listen(&tx).await {
                Ok(()) => info!("Kodi event connection closed"),
                Err(e) => warn!("Kodi event connection failed: {}", e),
            }
            if tx.is_closed() {
                debug!("Event consumer gone, stopping Kodi event feed");
                return;
            }
            info!("Reconnecting to Kodi events in {:?}", self.reconnect_delay);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection lifetime
    async fn listen(&self, tx: &mpsc::Sender<PlayerEvent>) -> Result<(), PlayerError> {
        info!("Connecting to Kodi events at {}", self.ws_url);
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| PlayerError::Network(e.to_string()))?;
        info!("Kodi event connection established");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        while let Some(message) = ws_rx.next().await {
            let message = message.map_err(|e| PlayerError::Network(e.to_string()))?;
            match message {
                Message::Text(text) => match parse_notification(&text) {
                    Some(notification) => self.dispatch(notification, tx),
                    None => trace!("Ignoring Kodi message: {}", text),
                },
                Message::Ping(payload) => {
                    ws_tx
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| PlayerError::Network(e.to_string()))?;
                }
                Message::Close(frame) => {
                    debug!("Kodi closed the event connection: {:?}", frame);
                    return Ok(());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Act on a notification after the settle delay, without blocking reads
    fn dispatch(&self, notification: Notification, tx: &mpsc::Sender<PlayerEvent>) {
        debug!("Kodi notification: {:?}", notification);
        let tx = tx.clone();
        let settle = self.settle;
        let gateway = Arc::clone(&self.gateway);

        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let event = match notification {
                Notification::Stopped => Some(PlayerEvent::Stopped),
                Notification::Played => detect_now_playing(gateway.as_ref()).await,
            };
            if let Some(event) = event {
                // Closed channel means shutdown
                let _ = tx.send(event).await;
            }
        });
    }
}
