//! # Entity Store
//!
//! A reactive in-memory collection of keyed entities with derived views,
//! validated CRUD, optimistic updates and lifecycle events.
//!
//! ## Core Concepts
//!
//! - **Table**: Entities keyed by an identity field, in insertion order
//! - **Views**: Filter, then stable sort, then paginate, recomputed on read
//! - **Mutations**: Validated writes returning `{ code, message, timestamp }` errors
//! - **Events**: Per-store notifications for every visible change
//! - **Persistence**: Optional write-through to a key-value backend
//!
//! ## Example
//!
//! ```ignore
//! use entity_store::{Filter, SortSpec, Store, StoreConfig};
//! use serde_json::json;
//!
//! let store = Store::new(StoreConfig::new("vms"))?;
//!
//! store.create(json!({"id": "1", "name": "web", "cpu": 4}))?;
//! store.create(json!({"id": "2", "name": "db", "cpu": 8}))?;
//!
//! store.set_filters(vec![Filter::gte("cpu", 6)]);
//! store.set_sort(Some(SortSpec::desc("cpu")));
//! let page = store.paginated();
//! ```

pub mod error;
pub mod events;
pub mod optimistic;
pub mod persistence;
pub mod query;
pub mod source;
pub mod store;
pub mod table;
pub mod types;

// Re-exports
pub use error::{CrudResult, ErrorCode, OperationError, Result, StoreError, ValidationError};
pub use events::{
    EventBus, EventKind, EventPayload, StoreEvent, SubscriptionHandle, SubscriptionId, Unsubscribe,
};
pub use optimistic::OptimisticToken;
pub use persistence::{Codec, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, Persistence};
pub use query::{Comparator, QueryState};
pub use source::DataSource;
pub use store::{generate_id, IdGenerator, Store, StoreConfig, Transform, Validator};
pub use table::{EntityTable, TableEntry};
pub use types::{
    BatchFailure, BatchResult, CollectionState, Entity, Filter, FilterOperator, PageInfo,
    PaginationSpec, Patch, QueryParams, SortDirection, SortSpec, Timestamp, UpdateRequest,
};
