use crate::connection::{ConnectionId, Subscriber};
use async_trait::async_trait;
use log::*;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// What a [`Visitor`] wants done with the subscriber it just visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Remove,
}

/// Callback for [`SubscriberRegistry::for_each_with_removal`].
#[async_trait]
pub trait Visitor: Send {
    async fn visit(&mut self, subscriber: &mut Subscriber) -> Visit;
}

/// Ordered set of live subscribers behind one lock.
///
/// Every operation takes the lock for its whole duration: an insert never
/// lands in the middle of a scan, and a scan never sees a half-inserted
/// subscriber. Newest subscribers are visited first.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<VecDeque<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn insert(&self, subscriber: Subscriber) -> ConnectionId {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.lock().await;
        subscribers.push_front(subscriber);
        debug!("Registered subscriber {id} ({} active)", subscribers.len());
        id
    }

    /// Visits every subscriber in order while holding the lock.
    ///
    /// Subscribers the visitor rejects are closed and removed in place and the
    /// scan carries on with the next one. Returns how many were removed.
    pub async fn for_each_with_removal<V: Visitor>(&self, visitor: &mut V) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        let mut removed = 0;
        let mut index = 0;

        while index < subscribers.len() {
            match visitor.visit(&mut subscribers[index]).await {
                Visit::Keep => index += 1,
                Visit::Remove => {
                    if let Some(subscriber) = subscribers.remove(index) {
                        subscriber.close().await;
                        removed += 1;
                    }
                }
            }
        }

        removed
    }

    /// Closes and removes every subscriber. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        let closed = subscribers.len();
        while let Some(subscriber) = subscribers.pop_front() {
            subscriber.close().await;
        }
        closed
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.subscribers
            .lock()
            .await
            .iter()
            .any(|subscriber| subscriber.id() == id)
    }

    /// Snapshot of the ids in visiting order.
    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.subscribers
            .lock()
            .await
            .iter()
            .map(Subscriber::id)
            .collect()
    }
}
