use std::{
    collections::HashMap,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_core::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("subscription key must not be empty")]
    EmptyKey,
}

/// Payload of a `transfer` event on an identity stream: the credential and
/// destination for moving that participant to the support room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferNotice {
    pub token: String,
    pub support_room: String,
}

/// Payload of a `room_event` on a room stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    WarmStarted {
        #[serde(rename = "supportRoom")]
        support_room: String,
    },
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Transfer(TransferNotice),
    Room(RoomEvent),
}

impl StreamEvent {
    pub fn warm_started(support_room: impl Into<String>) -> Self {
        StreamEvent::Room(RoomEvent::WarmStarted {
            support_room: support_room.into(),
        })
    }

    /// SSE event name plus JSON payload.
    pub fn as_named_json(&self) -> (&'static str, String) {
        match self {
            StreamEvent::Transfer(notice) => (
                "transfer",
                serde_json::to_string(notice).unwrap_or_else(|_| "{}".into()),
            ),
            StreamEvent::Room(event) => (
                "room_event",
                serde_json::to_string(event).unwrap_or_else(|_| "{}".into()),
            ),
        }
    }
}

struct StreamSlot {
    id: u64,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

#[derive(Default)]
struct Slots {
    next_id: u64,
    by_key: HashMap<String, Vec<StreamSlot>>,
}

/// Live outbound streams grouped by subscription key. One instance is keyed
/// by participant identity and another by room base name; the map itself does
/// not care which.
#[derive(Clone, Default)]
pub struct SubscriberMap {
    inner: Arc<Mutex<Slots>>,
}

impl SubscriberMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new live stream under `key`. The returned subscription
    /// removes its slot when dropped.
    pub fn subscribe(&self, key: &str) -> Result<Subscription, RegistryError> {
        if key.trim().is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slots = self.inner.lock();
        slots.next_id += 1;
        let id = slots.next_id;
        let streams = slots.by_key.entry(key.to_string()).or_default();
        streams.push(StreamSlot { id, tx: tx.clone() });
        debug!(key, total = streams.len(), "registered subscriber stream");
        drop(slots);
        Ok(Subscription {
            map: self.clone(),
            key: key.to_string(),
            id,
            tx,
            rx,
        })
    }

    /// Delivers `event` to every live stream under `key`. A dead stream never
    /// aborts delivery to the rest; slots whose receiver is gone are pruned.
    /// Returns the number of streams that accepted the event.
    pub fn publish(&self, key: &str, event: &StreamEvent) -> usize {
        let mut slots = self.inner.lock();
        let Some(streams) = slots.by_key.get_mut(key) else {
            return 0;
        };
        let before = streams.len();
        streams.retain(|slot| slot.tx.send(event.clone()).is_ok());
        let delivered = streams.len();
        if delivered < before {
            debug!(key, pruned = before - delivered, "pruned dead subscriber streams");
        }
        if streams.is_empty() {
            slots.by_key.remove(key);
        }
        delivered
    }

    #[cfg(test)]
    fn subscriber_count(&self, key: &str) -> usize {
        self.inner.lock().by_key.get(key).map(Vec::len).unwrap_or(0)
    }

    /// Idempotent: removing a slot that is already gone is a no-op.
    fn remove(&self, key: &str, id: u64) {
        let mut slots = self.inner.lock();
        if let Some(streams) = slots.by_key.get_mut(key) {
            streams.retain(|slot| slot.id != id);
            if streams.is_empty() {
                slots.by_key.remove(key);
            }
        }
    }
}

/// A registered live stream: yields events published to its key and
/// deregisters itself exactly once when dropped.
pub struct Subscription {
    map: SubscriberMap,
    key: String,
    id: u64,
    tx: mpsc::UnboundedSender<StreamEvent>,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl Subscription {
    /// Queues an event for this stream only, ahead of anything published to
    /// its key afterwards.
    pub fn prime(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }
}

impl Stream for Subscription {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.map.remove(&self.key, self.id);
    }
}
