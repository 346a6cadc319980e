//! Main Store struct tying all components together.
//!
//! A [`Store`] owns:
//! - the entity table (authoritative records, insertion-ordered)
//! - the query state (filters, sort, pagination) and the derived views
//! - the event bus for lifecycle notifications
//! - an optional persistence binding
//!
//! Mutations live in `mutations.rs`; optimistic writes in `crate::optimistic`.

mod config;
mod mutations;

pub use config::{generate_id, IdGenerator, StoreConfig, Transform, Validator};

use crate::error::{ErrorCode, OperationError, Result, StoreError, ValidationError};
use crate::events::{
    EventBus, EventKind, EventPayload, StoreEvent, SubscriptionHandle, Unsubscribe,
};
use crate::persistence::{items_key, MemoryKeyValueStore, Persistence};
use crate::query::values::key_of;
use crate::query::{self, Comparator, QueryState};
use crate::source::DataSource;
use crate::table::EntityTable;
use crate::types::{
    CollectionState, Entity, Filter, PageInfo, PaginationSpec, Patch, SortSpec, Timestamp,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Reactive in-memory entity store.
///
/// All methods take `&self`. Derived views are recomputed on read from the
/// current table and query state; a sorted view is reused until either
/// changes.
pub struct Store<T: Entity> {
    pub(crate) inner: Arc<StoreInner<T>>,
}

/// Shared state behind a [`Store`]; optimistic tokens hold a weak reference.
pub(crate) struct StoreInner<T: Entity> {
    pub(crate) name: String,
    pub(crate) id_field: String,
    ttl: Option<Duration>,
    validate: Option<Validator<T>>,
    id_generator: Option<IdGenerator>,
    comparator: Option<Comparator<T>>,
    transform: Option<Transform>,
    data_source: Option<Arc<dyn DataSource>>,

    pub(crate) table: RwLock<EntityTable<T>>,
    query: RwLock<QueryState>,
    status: Mutex<Status>,
    pub(crate) events: EventBus<T>,
    persistence: Option<Persistence>,

    /// Last filtered + sorted key order, tagged with the revisions it was
    /// computed from.
    view_cache: Mutex<Option<SortedView>>,
}

#[derive(Default)]
struct Status {
    /// Nesting depth of in-flight mutating calls; loading while > 0.
    loading_depth: usize,
    last_error: Option<OperationError>,
    last_fetch: Option<Timestamp>,
}

struct SortedView {
    table_revision: u64,
    query_revision: u64,
    keys: Arc<Vec<String>>,
}

/// Keeps `loading` set while alive. Released on every exit path, unwinding
/// included.
pub(crate) struct LoadingGuard<'a, T: Entity> {
    inner: &'a StoreInner<T>,
}

impl<T: Entity> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        let ended = {
            let mut status = self.inner.status.lock();
            status.loading_depth = status.loading_depth.saturating_sub(1);
            status.loading_depth == 0
        };
        if ended && !std::thread::panicking() {
            self.inner
                .emit(EventKind::LoadingEnd, EventPayload::Loading(false));
        }
    }
}

impl<T: Entity> Store<T> {
    /// Build a store from its configuration.
    ///
    /// With persistence on, a previously stored entity list wins over
    /// `initial_data`.
    pub fn new(config: StoreConfig<T>) -> Result<Self> {
        let StoreConfig {
            name,
            id_field,
            initial_data,
            persistent,
            persist_key,
            codec,
            key_value_store,
            debug,
            ttl,
            validate,
            id_generator,
            comparator,
            transform,
            data_source,
        } = config;

        let persistence = if persistent {
            let backend = match key_value_store {
                Some(backend) => backend,
                None => Arc::new(MemoryKeyValueStore::new()),
            };
            Some(Persistence::new(
                items_key(&name, persist_key.as_deref()),
                backend,
                codec,
            ))
        } else {
            None
        };

        let mut table = EntityTable::new(id_field.clone());
        let stored = match &persistence {
            Some(p) => p.load::<T>()?,
            None => None,
        };
        match stored {
            Some(entities) => {
                tracing::debug!(store = %name, count = entities.len(), "restored persisted entities");
                table.replace_all(entities)?;
            }
            None => table.replace_all(initial_data)?,
        }

        let events = EventBus::new(name.clone(), debug);

        Ok(Self {
            inner: Arc::new(StoreInner {
                name,
                id_field,
                ttl,
                validate,
                id_generator,
                comparator,
                transform,
                data_source,
                table: RwLock::new(table),
                query: RwLock::new(QueryState::new()),
                status: Mutex::new(Status::default()),
                events,
                persistence,
                view_cache: Mutex::new(None),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id_field(&self) -> &str {
        &self.inner.id_field
    }

    // --- Lookups ---

    pub fn get_by_id(&self, id: &str) -> Option<T> {
        self.inner.table.read().get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.inner.table.read().contains(id)
    }

    pub fn count(&self) -> usize {
        self.inner.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table.read().is_empty()
    }

    /// Version of an entity's last write. Versions come from one counter per
    /// store, so a removed and re-created entity never gets an old one back.
    pub fn version_of(&self, id: &str) -> Option<u64> {
        self.inner.table.read().version(id)
    }

    /// All entities in insertion order, ignoring the query.
    pub fn entities(&self) -> Vec<T> {
        self.inner.table.read().entities()
    }

    pub fn loading(&self) -> bool {
        self.inner.status.lock().loading_depth > 0
    }

    pub fn last_error(&self) -> Option<OperationError> {
        self.inner.status.lock().last_error.clone()
    }

    pub fn last_fetch(&self) -> Option<Timestamp> {
        self.inner.status.lock().last_fetch
    }

    /// True when a ttl is configured and the data was never fetched or was
    /// fetched longer than ttl ago.
    pub fn is_stale(&self) -> bool {
        let Some(ttl) = self.inner.ttl else {
            return false;
        };
        match self.last_fetch() {
            Some(fetched) => fetched.elapsed_until(Timestamp::now()) > ttl,
            None => true,
        }
    }

    // --- Query state ---

    pub fn filters(&self) -> Vec<Filter> {
        self.inner.query.read().filters().to_vec()
    }

    pub fn sort(&self) -> Option<SortSpec> {
        self.inner.query.read().sort().cloned()
    }

    pub fn pagination(&self) -> Option<PaginationSpec> {
        self.inner.query.read().pagination().copied()
    }

    pub fn set_filters(&self, filters: Vec<Filter>) {
        self.inner.query.write().set_filters(filters);
    }

    pub fn add_filter(&self, filter: Filter) {
        self.inner.query.write().add_filter(filter);
    }

    /// Remove every filter on `field`.
    pub fn remove_filter(&self, field: &str) {
        self.inner.query.write().remove_filter(field);
    }

    pub fn clear_filters(&self) {
        self.inner.query.write().set_filters(Vec::new());
    }

    pub fn set_sort(&self, sort: Option<SortSpec>) {
        self.inner.query.write().set_sort(sort);
    }

    pub fn set_pagination(&self, pagination: Option<PaginationSpec>) {
        self.inner.query.write().set_pagination(pagination);
    }

    // --- Derived views ---

    /// Entities passing every filter, in insertion order.
    pub fn filtered(&self) -> Vec<T> {
        let table = self.inner.table.read();
        let query = self.inner.query.read();
        query::apply_filters(table.iter().collect(), query.filters())
            .into_iter()
            .map(|row| row.entity.clone())
            .collect()
    }

    /// Filtered entities in sort order.
    pub fn sorted(&self) -> Vec<T> {
        self.inner.derive(false)
    }

    /// The current page of the sorted view (all of it without pagination).
    pub fn paginated(&self) -> Vec<T> {
        self.inner.derive(true)
    }

    /// Totals for the current page. `None` without pagination.
    pub fn page_info(&self) -> Option<PageInfo> {
        let table = self.inner.table.read();
        let query = self.inner.query.read();
        let pagination = *query.pagination()?;
        let total = self.inner.sorted_keys(&table, &query).len();
        let total_pages = if pagination.page_size == 0 {
            0
        } else {
            total.div_ceil(pagination.page_size)
        };

        Some(PageInfo {
            page: pagination.page,
            page_size: pagination.page_size,
            total,
            total_pages,
            has_more: pagination.page < total_pages,
        })
    }

    /// Snapshot of the whole store.
    pub fn state(&self) -> CollectionState<T> {
        let (entities, filters, sort, pagination) = {
            let table = self.inner.table.read();
            let query = self.inner.query.read();
            (
                table.entities(),
                query.filters().to_vec(),
                query.sort().cloned(),
                query.pagination().copied(),
            )
        };
        let stale = self.is_stale();
        let status = self.inner.status.lock();

        CollectionState {
            entities,
            loading: status.loading_depth > 0,
            error: status.last_error.clone(),
            filters,
            sort,
            pagination,
            last_fetch: status.last_fetch,
            stale,
        }
    }

    // --- Validation ---

    /// Run the validation hook. Without a hook everything is valid.
    pub fn validate(&self, item: &T) -> std::result::Result<(), ValidationError> {
        match self.inner.run_validation(item) {
            Ok(()) => Ok(()),
            Err(StoreError::Validation(e)) => Err(e),
            Err(other) => Err(ValidationError::new(other.to_string())),
        }
    }

    // --- Events ---

    /// Register a handler for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Unsubscribe
    where
        F: Fn(&StoreEvent<T>) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    /// Receive one event kind over a bounded channel.
    pub fn subscribe(&self, kind: EventKind, buffer_size: usize) -> SubscriptionHandle<T> {
        self.inner.events.subscribe(kind, buffer_size)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle<T>) {
        self.inner.events.unsubscribe(handle);
    }

    /// Emit an event to this store's listeners.
    pub fn emit(&self, event: StoreEvent<T>) {
        self.inner.events.emit(event);
    }

    // --- Bulk state ---

    /// Swap the whole table content, e.g. with results pushed by a data
    /// source. Fails without changes if any entity lacks an identity.
    pub fn replace_all(&self, entities: Vec<T>) -> Result<()> {
        self.inner.table.write().replace_all(entities)?;
        self.inner.persist();
        Ok(())
    }

    /// Empty the table and reset query state and errors. Subscribers stay.
    pub fn clear(&self) {
        self.inner.table.write().clear();
        self.inner.query.write().reset();
        {
            let mut status = self.inner.status.lock();
            status.last_error = None;
            status.last_fetch = None;
        }
        *self.inner.view_cache.lock() = None;
        self.inner.persist();
    }

    /// Tear down: clear everything and drop all subscribers.
    pub fn destroy(&self) {
        self.clear();
        self.inner.events.destroy();
        tracing::debug!(store = %self.inner.name, "store destroyed");
    }
}

impl<T: Entity> StoreInner<T> {
    pub(crate) fn begin_loading(&self) -> LoadingGuard<'_, T> {
        let started = {
            let mut status = self.status.lock();
            status.loading_depth += 1;
            status.loading_depth == 1
        };
        if started {
            self.emit(EventKind::LoadingStart, EventPayload::Loading(true));
        }
        LoadingGuard { inner: self }
    }

    pub(crate) fn emit(&self, kind: EventKind, payload: EventPayload<T>) {
        self.events
            .emit(StoreEvent::new(kind, payload, self.name.clone()));
    }

    /// Record a successful mutation, write it through and notify.
    pub(crate) fn committed(&self, kind: EventKind, payload: EventPayload<T>) {
        self.status.lock().last_error = None;
        self.persist();
        self.emit(kind, payload);
    }

    /// Record a failed operation, notify, and hand back the surfaced error.
    pub(crate) fn fail(&self, code: ErrorCode, error: StoreError) -> OperationError {
        let error = OperationError::from_store_error(code, error);
        tracing::debug!(store = %self.name, code = %error.code, message = %error.message, "operation failed");
        self.status.lock().last_error = Some(error.clone());
        self.emit(EventKind::Error, EventPayload::Error(error.clone()));
        error
    }

    pub(crate) fn run_validation(&self, item: &T) -> Result<()> {
        let Some(validate) = &self.validate else {
            return Ok(());
        };
        match panic::catch_unwind(AssertUnwindSafe(|| validate(item))) {
            Ok(result) => result.map_err(StoreError::Validation),
            Err(payload) => Err(StoreError::HookPanicked(panic_message(payload))),
        }
    }

    pub(crate) fn next_id(&self) -> Result<String> {
        let Some(generator) = &self.id_generator else {
            return Ok(generate_id());
        };
        panic::catch_unwind(AssertUnwindSafe(|| generator()))
            .map_err(|payload| StoreError::HookPanicked(panic_message(payload)))
    }

    /// Put an entity back verbatim, without validation or events.
    pub(crate) fn restore(&self, key: &str, entity: T, fields: Map<String, Value>) -> u64 {
        let version = self.table.write().put(key.to_string(), entity, fields);
        self.persist();
        version
    }

    /// A patch may repeat the entity's identity but never change it.
    pub(crate) fn check_identity(&self, id: &str, updates: &Patch) -> Result<()> {
        match updates.get(&self.id_field) {
            Some(value) if key_of(value).as_deref() != Some(id) => Err(StoreError::IdentityChange {
                id: id.to_string(),
                to: value.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Write the entity list through to the persistence backend, if any.
    ///
    /// The in-memory change stands on failure; it is reported as the last
    /// error with `PERSIST_ERROR` and an `ERROR` event.
    pub(crate) fn persist(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let entities = self.table.read().entities();
        if let Err(e) = persistence.save(&entities) {
            tracing::warn!(store = %self.name, key = persistence.key(), error = %e, "persistence write failed");
            self.fail(ErrorCode::PersistError, e);
        }
    }

    /// Materialize the sorted view, optionally paginated.
    fn derive(&self, paginate: bool) -> Vec<T> {
        let table = self.table.read();
        let query = self.query.read();
        let keys = self.sorted_keys(&table, &query);
        let rows: Vec<&String> = keys.iter().collect();
        let rows = if paginate {
            query::apply_pagination(rows, query.pagination())
        } else {
            rows
        };
        rows.into_iter()
            .filter_map(|key| table.get(key).cloned())
            .collect()
    }

    fn sorted_keys(&self, table: &EntityTable<T>, query: &QueryState) -> Arc<Vec<String>> {
        let revisions = (table.revision(), query.revision());

        if let Some(view) = self.view_cache.lock().as_ref() {
            if (view.table_revision, view.query_revision) == revisions {
                return Arc::clone(&view.keys);
            }
        }

        let keys: Vec<String> = query::run(table, query, self.comparator.as_ref())
            .into_iter()
            .map(|row| row.key.clone())
            .collect();
        let keys = Arc::new(keys);

        *self.view_cache.lock() = Some(SortedView {
            table_revision: revisions.0,
            query_revision: revisions.1,
            keys: Arc::clone(&keys),
        });
        keys
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
