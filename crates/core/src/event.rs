//! Named event bus connecting card presence to protocol actions
//!
//! An [`EventBus`] owns its subscription table; cloning the bus yields another
//! handle to the same table. Publishing is synchronous on the caller's
//! thread and works on a snapshot of the subscribers taken when the call
//! starts, so callbacks may subscribe or unsubscribe without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{trace, warn};

/// Error a subscriber may return; it is logged and otherwise ignored
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Callback<A> = Arc<dyn Fn(&A) -> Result<(), SubscriberError> + Send + Sync>;

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Inner<A> {
    subscribers: RwLock<HashMap<String, Vec<(SubscriptionId, Callback<A>)>>>,
    next_id: AtomicU64,
}

/// Publish/subscribe table keyed by event name
pub struct EventBus<A> {
    inner: Arc<Inner<A>>,
}

impl<A> EventBus<A> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `callback` for `name`, after any existing subscribers
    pub fn subscribe<F>(&self, name: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&A) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let name = name.into();
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        trace!(event = %name, %id, "Subscribing");
        self.inner
            .subscribers
            .write()
            .entry(name)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription
    ///
    /// Returns `false` if `id` was not subscribed to `name`.
    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let Some(list) = subscribers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(name);
        }
        removed
    }

    /// Number of subscribers registered for `name`
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner.subscribers.read().get(name).map_or(0, Vec::len)
    }

    /// Invoke every subscriber of `name` in registration order
    ///
    /// A subscriber that returns an error or panics is logged and skipped;
    /// the remaining subscribers still run. Returns the number of
    /// subscribers invoked.
    pub fn publish(&self, name: &str, args: &A) -> usize {
        let snapshot: Vec<_> = match self.inner.subscribers.read().get(name) {
            Some(list) => list.clone(),
            None => return 0,
        };

        trace!(event = name, subscribers = snapshot.len(), "Publishing");
        for (id, callback) in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(args))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(event = name, %id, error = %e, "Subscriber failed"),
                Err(_) => warn!(event = name, %id, "Subscriber panicked"),
            }
        }
        snapshot.len()
    }
}

impl<A> Clone for EventBus<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> Default for EventBus<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventBus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.inner.subscribers.read();
        let mut map = f.debug_map();
        for (name, list) in subscribers.iter() {
            map.entry(name, &list.len());
        }
        map.finish()
    }
}

/// Card presence change reported by a reader monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    /// A card was inserted and answered to reset
    Inserted {
        /// Reader name
        reader: String,
        /// Answer To Reset
        atr: Bytes,
    },
    /// The card was removed
    Removed {
        /// Reader name
        reader: String,
    },
}

impl CardEvent {
    /// Event name for insertions
    pub const INSERT: &'static str = "insert";
    /// Event name for removals
    pub const REMOVE: &'static str = "remove";

    /// Name under which this event is published
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => Self::INSERT,
            Self::Removed { .. } => Self::REMOVE,
        }
    }

    /// Reader the event originated from
    pub fn reader(&self) -> &str {
        match self {
            Self::Inserted { reader, .. } | Self::Removed { reader } => reader,
        }
    }

    /// Publish this event on `bus` under its own name
    pub fn publish_on(&self, bus: &EventBus<Self>) -> usize {
        bus.publish(self.name(), self)
    }
}

impl fmt::Display for CardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted { reader, atr } => {
                write!(f, "+Inserted: {} ({reader})", hex::encode_upper(atr))
            }
            Self::Removed { reader } => write!(f, "-Removed:  {reader}"),
        }
    }
}
