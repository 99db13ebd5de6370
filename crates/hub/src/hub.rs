//! Hub registry and delivery queues

use chain_types::Block;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};

/// Subscriber queue depth before `publish` starts waiting on that
/// subscriber.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Identifies one registered consumer.
pub type SubscriberId = u64;

struct HubInner {
    /// Active subscriber queues.
    subscribers: DashMap<SubscriberId, mpsc::Sender<Block>>,
    /// Next subscriber ID.
    next_id: AtomicU64,
    /// Queue capacity handed to new subscribers.
    capacity: usize,
    /// Serializes the publish path so every consumer sees the same
    /// block order even with more than one publishing task.
    publish_lock: Mutex<()>,
}

/// Single-producer, multi-consumer ordered broadcast of tip updates.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct StrongestChainHub {
    inner: Arc<HubInner>,
}

impl StrongestChainHub {
    /// Create a hub with the default per-subscriber queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a hub with an explicit per-subscriber queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Arc::new(HubInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                capacity,
                publish_lock: Mutex::new(()),
            }),
        }
    }

    /// Register a new consumer with an empty backlog.
    ///
    /// The subscription receives only blocks published after this call
    /// returns; there is no historical replay. Every call allocates an
    /// independent queue, so concurrent subscribers never contend for
    /// the same items.
    pub fn subscribe(&self) -> TipSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers.insert(id, sender);
        tracing::debug!("Registered tip subscriber {}", id);
        TipSubscription {
            id,
            receiver,
            hub: self.inner.clone(),
        }
    }

    /// Remove a consumer; subsequent publishes no longer wait on or
    /// write to its queue. Safe to call concurrently with an in-flight
    /// publish. Returns false if the ID was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!("Removed tip subscriber {}", id);
        }
        removed
    }

    /// Deliver `block` to every registered subscriber, in publish
    /// order, without loss.
    ///
    /// Suspends until each subscriber's bounded queue has accepted the
    /// block; a subscriber that stops draining therefore eventually
    /// blocks the publisher until it drains or unsubscribes.
    /// Subscribers whose receiving half has been dropped are pruned.
    pub async fn publish(&self, block: Block) {
        let _guard = self.inner.publish_lock.lock().await;

        // Snapshot so registry mutation is never held across a send.
        let targets: Vec<(SubscriberId, mpsc::Sender<Block>)> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (id, sender) in targets {
            if sender.send(block.clone()).await.is_err() {
                // Receiver dropped without unsubscribing.
                self.inner.subscribers.remove(&id);
                tracing::debug!("Pruned dropped tip subscriber {}", id);
            }
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl Default for StrongestChainHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One consumer's view of the tip stream.
///
/// Dropping the subscription unsubscribes it.
pub struct TipSubscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Block>,
    hub: Arc<HubInner>,
}

impl TipSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next published block.
    ///
    /// Returns `None` once this subscription has been removed via
    /// [`StrongestChainHub::unsubscribe`] and its queue is drained.
    pub async fn recv(&mut self) -> Option<Block> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<Block, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

impl Drop for TipSubscription {
    fn drop(&mut self) {
        self.hub.subscribers.remove(&self.id);
    }
}
