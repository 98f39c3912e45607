//! In-process notifications from the click loop
//!
//! Publishing never blocks: every subscriber gets a small bounded queue and
//! events that do not fit are dropped for that subscriber only.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::lock;
use crate::position::ClickPosition;

const SUBSCRIBER_CAPACITY: usize = 16;

/// Event published by the click loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickEvent {
    /// A tap is about to be dispatched at this position
    TapImminent(ClickPosition),
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Vec<(u64, Sender<ClickEvent>)>>,
    next_id: AtomicU64,
}

/// Fan-out bus for click events
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscriber
    pub fn publish(&self, event: ClickEvent) {
        let mut subscribers = lock(&self.inner.subscribers);
        subscribers.retain(|(id, sender)| match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Subscriber {} is behind, dropping {:?}", id, event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Register a new listener; it stays registered until the `Subscription` is dropped
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = bounded(SUBSCRIBER_CAPACITY);
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.subscribers).push((id, sender));
        Subscription {
            id,
            receiver,
            bus: self.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    fn unsubscribe(&self, id: u64) {
        lock(&self.inner.subscribers).retain(|(sub_id, _)| *sub_id != id);
    }
}

/// Handle to a registration on an `EventBus`
pub struct Subscription {
    id: u64,
    receiver: Receiver<ClickEvent>,
    bus: EventBus,
}

impl Subscription {
    /// Receiving end of this subscription.
    ///
    /// Clones report disconnection once the subscription is dropped.
    pub fn receiver(&self) -> Receiver<ClickEvent> {
        self.receiver.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}
