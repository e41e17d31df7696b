use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{model::bucket::Bucket, photo_store::BucketMetrics};

#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub enum EventBusId {
    BookingProjector,
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketChange {
    Added(Bucket),
    Moved { from: Bucket, to: Bucket },
    Removed(Bucket),
}

/// Published after every photo mutation that changes bucket membership.
/// `metrics` is the full per-bucket count for the booking after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoBucketChanged {
    pub booking_id: String,
    pub photo_id: String,
    pub change: BucketChange,
    pub metrics: BucketMetrics,
}

pub type Listener<T> = Box<dyn Fn(T) + Send + Sync>;

/// Listeners run synchronously, in registration order, on the emitting thread.
/// A listener must not register or remove listeners on the same bus.
pub struct EventBus<T> {
    listeners: RwLock<IndexMap<EventBusId, Listener<T>>>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(IndexMap::new()),
        }
    }

    /// Registers `listener`, replacing any listener already using `id`.
    pub fn listen(&self, id: EventBusId, listener: Listener<T>) {
        self.listeners.write().insert(id, listener);
    }

    pub fn emit(&self, event: T) {
        for listener in self.listeners.read().values() {
            listener(event.clone());
        }
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
