//! Detection poller: asks the player what is playing, independently of the
//! notification feed

use super::{detect_now_playing, PlayerGateway};
use kjb_common::events::PlayerEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct DetectionPoller {
    gateway: Arc<dyn PlayerGateway>,
    initial_delay: Duration,
    interval: Option<Duration>,
}

impl DetectionPoller {
    /// One detection after `initial_delay`, then one every `interval`
    /// (`None`: only the initial detection)
    pub fn new(
        gateway: Arc<dyn PlayerGateway>,
        initial_delay: Duration,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            gateway,
            initial_delay,
            interval,
        }
    }

    pub fn spawn(self, tx: mpsc::Sender<PlayerEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(tx))
    }

    async fn run(self, tx: mpsc::Sender<PlayerEvent>) {
        tokio::time::sleep(self.initial_delay).await;
        loop {
            if let Some(event) = detect_now_playing(self.gateway.as_ref()).await {
                if tx.send(event).await.is_err() {
                    debug!("Event consumer gone, stopping detection poller");
                    return;
                }
            }
            match self.interval {
                Some(interval) => tokio::time::sleep(interval).await,
                None => return,
            }
        }
    }
}
