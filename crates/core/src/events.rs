// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed event fan-out
//!
//! Consumers subscribe for the full `MonitorEvent` stream and match on the
//! variants they care about. Publishing is synchronous and in order, so a
//! single subscriber observes events in the order they were published.

use crate::event::MonitorEvent;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<MonitorEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<MonitorEvent>;

/// Handle for unsubscribing
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

/// Fans published events out to every live subscriber
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<SubscriberId, EventSender>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to the event stream. The label shows up in diagnostics
    /// and doubles as the unsubscribe handle.
    pub fn subscribe(&self, label: impl Into<String>) -> (SubscriberId, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId(label.into());

        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(id.clone(), tx);

        (id, rx)
    }

    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.remove(id);
    }

    /// Publish an event to all subscribers. Subscribers whose receiver was
    /// dropped are pruned on the way through.
    pub fn publish(&self, event: MonitorEvent) {
        let mut closed = Vec::new();
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, tx) in subs.iter() {
                if tx.send(event.clone()).is_err() {
                    closed.push(id.clone());
                }
            }
        }
        if !closed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for id in closed {
                subs.remove(&id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}
