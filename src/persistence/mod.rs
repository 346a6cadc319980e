//! Optional durable backing for a store's entities.
//!
//! A store with persistence enabled writes its whole entity list through a
//! [`KeyValueStore`] after every change to the table, and reads it back on
//! construction. The backing store is injected; nothing here is tied to a
//! particular medium.

mod codec;
mod file;
mod memory;

pub use codec::Codec;
pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

use crate::error::Result;
use crate::types::Entity;
use std::sync::Arc;

/// Byte-oriented key-value interface.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage key for a store's entity list.
///
/// `"<persist_key>.<name>.items"` with a persist key, `"<name>.items"`
/// without one.
pub fn items_key(name: &str, persist_key: Option<&str>) -> String {
    match persist_key {
        Some(prefix) => format!("{}.{}.items", prefix, name),
        None => format!("{}.items", name),
    }
}

/// Binding between one store and its backing key.
#[derive(Clone)]
pub struct Persistence {
    key: String,
    backend: Arc<dyn KeyValueStore>,
    codec: Codec,
}

impl Persistence {
    pub fn new(key: impl Into<String>, backend: Arc<dyn KeyValueStore>, codec: Codec) -> Self {
        Self {
            key: key.into(),
            backend,
            codec,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored entity list, in order. `None` when nothing was stored yet.
    pub fn load<T: Entity>(&self) -> Result<Option<Vec<T>>> {
        match self.backend.get(&self.key)? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save<T: Entity>(&self, entities: &[T]) -> Result<()> {
        let bytes = self.codec.encode(&entities)?;
        self.backend.set(&self.key, &bytes)
    }
}
