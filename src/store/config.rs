//! Store configuration.

use crate::error::ValidationError;
use crate::persistence::{Codec, KeyValueStore};
use crate::query::Comparator;
use crate::source::DataSource;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Validation hook run by `create` and `update` before committing.
pub type Validator<T> = Arc<dyn Fn(&T) -> Result<(), ValidationError> + Send + Sync>;

/// Identifier generator used when a created entity has no identity.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Maps a raw data-source record before it is decoded.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Store configuration.
pub struct StoreConfig<T> {
    /// Store name, used for events, logs and the persistence key.
    pub name: String,

    /// Identifying field. Default: `"id"`.
    pub id_field: String,

    /// Seed entities, used when nothing was persisted.
    pub initial_data: Vec<T>,

    /// Write the entity list through to `key_value_store`.
    pub persistent: bool,

    /// Prefix of the persistence key.
    pub persist_key: Option<String>,

    /// Format of persisted data. Default: JSON.
    pub codec: Codec,

    /// Backing store for persistence. An in-memory store is used when
    /// persistence is on and none is given.
    pub key_value_store: Option<Arc<dyn KeyValueStore>>,

    /// Mirror every event to `tracing`.
    pub debug: bool,

    /// Age after which fetched data is reported stale.
    pub ttl: Option<Duration>,

    pub validate: Option<Validator<T>>,

    pub id_generator: Option<IdGenerator>,

    /// Replaces field comparison when a sort is set.
    pub comparator: Option<Comparator<T>>,

    pub transform: Option<Transform>,

    pub data_source: Option<Arc<dyn DataSource>>,
}

impl<T> StoreConfig<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: "id".to_string(),
            initial_data: Vec::new(),
            persistent: false,
            persist_key: None,
            codec: Codec::default(),
            key_value_store: None,
            debug: false,
            ttl: None,
            validate: None,
            id_generator: None,
            comparator: None,
            transform: None,
            data_source: None,
        }
    }

    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn initial_data(mut self, data: Vec<T>) -> Self {
        self.initial_data = data;
        self
    }

    /// Enable persistence through `backend`.
    pub fn persist_to(mut self, backend: Arc<dyn KeyValueStore>) -> Self {
        self.persistent = true;
        self.key_value_store = Some(backend);
        self
    }

    pub fn persist_key(mut self, key: impl Into<String>) -> Self {
        self.persist_key = Some(key.into());
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn validate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(hook));
        self
    }

    pub fn id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    pub fn comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn data_source(mut self, source: impl DataSource + 'static) -> Self {
        self.data_source = Some(Arc::new(source));
        self
    }
}

/// Default identifier generator: random UUID v4.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
