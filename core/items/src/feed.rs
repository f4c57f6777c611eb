//! Live pinned-items feed.
//!
//! New subscribers receive the most recent value first, then every later
//! publication in order. Publications are serialized under one lock, so the
//! replayed value and the live stream never overlap or skip.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use passcore_storage::SymmetricallyEncryptedItem;

/// One published pinned set, shared between subscribers.
pub type PinnedItems = Arc<Vec<SymmetricallyEncryptedItem>>;

const DEFAULT_CAPACITY: usize = 16;

/// Replay-latest broadcast of the pinned set.
pub struct PinnedItemsFeed {
    sender: broadcast::Sender<PinnedItems>,
    latest: Mutex<Option<PinnedItems>>,
}

impl Default for PinnedItemsFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PinnedItemsFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how many publications a slow subscriber may lag.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            latest: Mutex::new(None),
        }
    }

    /// Publish a new pinned set to current and future subscribers.
    pub fn publish(&self, items: Vec<SymmetricallyEncryptedItem>) {
        let items = Arc::new(items);
        let mut latest = self.latest();
        *latest = Some(items.clone());
        // No receivers is fine; the value is kept for replay.
        let _ = self.sender.send(items);
    }

    /// Attach a subscriber. It first sees the latest value, if any.
    pub fn subscribe(&self) -> PinnedItemsSubscription {
        let latest = self.latest();
        PinnedItemsSubscription {
            pending: latest.clone(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Most recently published value.
    pub fn current(&self) -> Option<PinnedItems> {
        self.latest().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn latest(&self) -> MutexGuard<'_, Option<PinnedItems>> {
        // The guarded value is a plain Option; a panic elsewhere cannot leave
        // it half-written.
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Receiving half of the pinned feed.
pub struct PinnedItemsSubscription {
    pending: Option<PinnedItems>,
    receiver: broadcast::Receiver<PinnedItems>,
}

impl PinnedItemsSubscription {
    /// Wait for the next value. `None` once the feed is dropped.
    pub async fn next(&mut self) -> Option<PinnedItems> {
        if let Some(items) = self.pending.take() {
            return Some(items);
        }
        loop {
            match self.receiver.recv().await {
                Ok(items) => return Some(items),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Pinned feed subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next value if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<PinnedItems> {
        if let Some(items) = self.pending.take() {
            return Some(items);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(items) => return Some(items),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Pinned feed subscriber lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Adapt into a `Stream` of pinned sets.
    pub fn into_stream(self) -> impl Stream<Item = PinnedItems> {
        stream::unfold(self, |mut subscription| async move {
            subscription.next().await.map(|items| (items, subscription))
        })
    }
}
