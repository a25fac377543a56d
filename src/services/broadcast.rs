use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::models::PriceUpdate;

pub const DEFAULT_CAPACITY: usize = 64;

/// The one capability the live poller needs from the push side.
pub trait UpdatePublisher: Send + Sync {
    /// Deliver `update` to every current subscriber and return how many
    /// there were. Never blocks.
    fn publish(&self, update: PriceUpdate) -> usize;
}

/// Fan-out of live price updates to connected listeners.
///
/// Each subscriber has its own bounded buffer of `capacity` updates. A
/// subscriber that falls behind loses the oldest updates instead of holding
/// up the publisher or other subscribers. There is no replay: a subscriber
/// sees only what is published after it subscribes.
#[derive(Clone)]
pub struct PriceBroadcast {
    sender: broadcast::Sender<PriceUpdate>,
}

impl PriceBroadcast {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PriceBroadcast {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl UpdatePublisher for PriceBroadcast {
    fn publish(&self, update: PriceUpdate) -> usize {
        // Err only means nobody is listening right now
        self.sender.send(update).unwrap_or(0)
    }
}

/// One listener's view of the broadcast.
pub struct Subscription {
    receiver: broadcast::Receiver<PriceUpdate>,
}

impl Subscription {
    /// Next update, or `None` once the broadcast is gone.
    pub async fn recv(&mut self) -> Option<PriceUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live subscriber fell behind, dropping oldest updates");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = PriceUpdate> {
        stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|update| (update, sub))
        })
    }
}
