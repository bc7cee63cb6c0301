//! Subscriber registry
//!
//! The registry is the only structure shared between the publisher and the
//! connection tasks. Each entry owns the sending half of a bounded queue; the
//! receiving half belongs to the connection task that writes frames to the
//! socket. Fan-out iterates over a snapshot so publishing never holds the
//! lock while queuing.
//!
//! A subscriber whose queue is full is evicted: its sender is released, so the
//! connection task drains what is already queued and then ends the stream.
//! A subscriber therefore only ever sees a gap-free prefix of the events
//! published for its filter.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use uuid::Uuid;

use crate::broker::topic;
use crate::utils::{BrokerError, Result};

pub type SubscriberId = String;

/// Outcome of queuing one frame for one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue was full; the subscriber lost its sender and its stream
    /// ends after the frames already queued.
    Evicted,
    /// The connection task is gone, or the subscriber was evicted earlier.
    Closed,
}

/// Registry entry for one open subscriber connection.
#[derive(Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub filter: String,
    sender: Mutex<Option<mpsc::Sender<Bytes>>>,
}

impl Subscriber {
    pub fn matches(&self, topic: &str) -> bool {
        topic::matches(&self.filter, topic)
    }

    pub fn is_alive(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Queues a frame without waiting.
    ///
    /// The lock is held across `try_send`, so once a frame was refused for a
    /// full queue no later frame can slip in behind the gap.
    pub fn deliver(&self, frame: Bytes) -> Delivery {
        let mut sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return Delivery::Closed;
        };
        match tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                sender.take();
                Delivery::Evicted
            }
            Err(TrySendError::Closed(_)) => {
                sender.take();
                Delivery::Closed
            }
        }
    }
}

/// Handle returned by [`Registry::register`]; `receiver` yields the frames
/// queued for this subscriber.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub filter: String,
    pub receiver: mpsc::Receiver<Bytes>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SubscriberId, Arc<Subscriber>>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber with an empty queue of `capacity` frames.
    ///
    /// Fails with [`BrokerError::Stopped`] once [`Registry::close`] ran.
    pub fn register(&self, filter: impl Into<String>, capacity: usize) -> Result<Subscription> {
        let filter = filter.into();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = format!("subscriber-{}", Uuid::new_v4());

        let mut inner = self.inner.write();
        if inner.closed {
            return Err(BrokerError::Stopped);
        }
        inner.entries.insert(
            id.clone(),
            Arc::new(Subscriber {
                id: id.clone(),
                filter: filter.clone(),
                sender: Mutex::new(Some(sender)),
            }),
        );
        debug!(subscriber = %id, filter = %filter, "registered subscriber");

        Ok(Subscription {
            id,
            filter,
            receiver,
        })
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.inner.write().entries.remove(id).is_some();
        if removed {
            debug!(subscriber = %id, "unregistered subscriber");
        }
        removed
    }

    /// Point-in-time copy of the live entries.
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.inner.read().entries.values().cloned().collect()
    }

    /// Refuses further registrations and drops every entry, which closes
    /// every queue. Returns the number of entries dropped.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.inner.write();
            inner.closed = true;
            inner.entries.drain().collect()
        };
        // snapshots held by an in-flight publish must not keep queues open
        for (_, subscriber) in &drained {
            subscriber.sender.lock().take();
        }
        drained.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
