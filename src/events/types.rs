//! Event types emitted by a store.

use crate::error::OperationError;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Kind of lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    BatchUpdated,
    Error,
    /// `loading` went from false to true.
    LoadingStart,
    /// `loading` went back to false.
    LoadingEnd,
}

/// What an event carries.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload<T> {
    /// The created, updated or removed entity.
    Entity(T),
    /// Every entity that succeeded in a batch update.
    Entities(Vec<T>),
    Error(OperationError),
    Loading(bool),
}

impl<T> EventPayload<T> {
    pub fn entity(&self) -> Option<&T> {
        match self {
            EventPayload::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn entities(&self) -> Option<&[T]> {
        match self {
            EventPayload::Entities(entities) => Some(entities),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&OperationError> {
        match self {
            EventPayload::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// A single notification.
#[derive(Clone, Debug, Serialize)]
pub struct StoreEvent<T> {
    pub kind: EventKind,
    pub payload: EventPayload<T>,
    pub timestamp: Timestamp,
    /// Name of the emitting store.
    pub source: String,
}

impl<T> StoreEvent<T> {
    pub fn new(kind: EventKind, payload: EventPayload<T>, source: impl Into<String>) -> Self {
        Self {
            kind,
            payload,
            timestamp: Timestamp::now(),
            source: source.into(),
        }
    }
}

/// Unique identifier for a handler or channel subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a channel subscription.
pub struct SubscriptionHandle<T> {
    pub id: SubscriptionId,
    pub kind: EventKind,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent<T>>,
}

impl<T> SubscriptionHandle<T> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent<T>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent<T>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent<T>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything buffered right now.
    pub fn drain(&self) -> Vec<StoreEvent<T>> {
        self.receiver.try_iter().collect()
    }
}
