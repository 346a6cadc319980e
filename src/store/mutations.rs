//! CRUD, batch and fetch operations.
//!
//! Every public mutation holds a loading guard for its duration, records
//! failures as the store's last error, and emits exactly one lifecycle event
//! per visible change.

use super::{Store, StoreInner};
use crate::error::{CrudResult, ErrorCode, OperationError, Result, StoreError};
use crate::events::{EventKind, EventPayload};
use crate::query::values::{field, from_object, key_of, to_object};
use crate::source::DataSource;
use crate::types::{BatchFailure, BatchResult, Entity, Patch, QueryParams, Timestamp, UpdateRequest};
use serde_json::Value;

impl<T: Entity> Store<T> {
    /// Validate and insert an entity, generating an identity when it has
    /// none. An entity whose identity already exists replaces it in place.
    pub fn create(&self, item: T) -> CrudResult<T> {
        let _loading = self.inner.begin_loading();
        match self.inner.create_entity(item) {
            Ok(entity) => {
                self.inner
                    .committed(EventKind::Created, EventPayload::Entity(entity.clone()));
                Ok(entity)
            }
            Err(e) => Err(self.inner.fail(ErrorCode::CreateError, e)),
        }
    }

    /// Look up one entity. No events, no error state.
    pub fn read(&self, id: &str) -> CrudResult<T> {
        self.get_by_id(id).ok_or_else(|| {
            OperationError::new(ErrorCode::ReadError, StoreError::NotFound(id.to_string()).to_string())
        })
    }

    /// Shallow-merge `updates` over the current entity, validate, commit.
    pub fn update(&self, id: &str, updates: Patch) -> CrudResult<T> {
        self.update_checked(id, updates, None)
    }

    /// Like [`update`](Self::update), but only if the entity is still at
    /// `expected_version`.
    pub fn update_if_version(&self, id: &str, updates: Patch, expected_version: u64) -> CrudResult<T> {
        self.update_checked(id, updates, Some(expected_version))
    }

    fn update_checked(&self, id: &str, updates: Patch, expected: Option<u64>) -> CrudResult<T> {
        let _loading = self.inner.begin_loading();
        match self.inner.update_entity(id, updates, expected) {
            Ok(entity) => {
                self.inner
                    .committed(EventKind::Updated, EventPayload::Entity(entity.clone()));
                Ok(entity)
            }
            Err(e) => Err(self.inner.fail(ErrorCode::UpdateError, e)),
        }
    }

    /// Remove an entity, returning it.
    pub fn delete(&self, id: &str) -> CrudResult<T> {
        let _loading = self.inner.begin_loading();
        match self.inner.delete_entity(id) {
            Ok(entity) => {
                self.inner
                    .committed(EventKind::Deleted, EventPayload::Entity(entity.clone()));
                Ok(entity)
            }
            Err(e) => Err(self.inner.fail(ErrorCode::DeleteError, e)),
        }
    }

    /// Create each item in order. Failures do not stop the batch.
    pub fn create_many(&self, items: impl IntoIterator<Item = T>) -> BatchResult<T> {
        let _loading = self.inner.begin_loading();
        let mut result = BatchResult::new();

        for item in items {
            match self.create(item.clone()) {
                Ok(entity) => result.succeeded.push(entity),
                Err(error) => result.failed.push(BatchFailure { item, error }),
            }
        }
        result
    }

    /// Apply each update in order, then emit one batch event with the
    /// entities that were updated.
    pub fn update_many(
        &self,
        updates: impl IntoIterator<Item = UpdateRequest>,
    ) -> BatchResult<T, UpdateRequest> {
        let _loading = self.inner.begin_loading();
        let mut result = BatchResult::new();

        for request in updates {
            match self.update(&request.id, request.data.clone()) {
                Ok(entity) => result.succeeded.push(entity),
                Err(error) => result.failed.push(BatchFailure { item: request, error }),
            }
        }

        self.inner.emit(
            EventKind::BatchUpdated,
            EventPayload::Entities(result.succeeded.clone()),
        );
        result
    }

    /// Delete each id in order. Succeeded ids are reported back.
    pub fn delete_many<I, S>(&self, ids: I) -> BatchResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _loading = self.inner.begin_loading();
        let mut result = BatchResult::new();

        for id in ids {
            let id = id.into();
            match self.delete(&id) {
                Ok(_) => result.succeeded.push(id),
                Err(error) => result.failed.push(BatchFailure { item: id, error }),
            }
        }
        result
    }

    /// Merge `params` into the query state and, with a data source
    /// configured, reload the table from it.
    pub fn fetch(&self, params: QueryParams) -> CrudResult<()> {
        self.inner.query.write().apply_params(params);

        let Some(source) = self.inner.data_source.clone() else {
            return Ok(());
        };

        let _loading = self.inner.begin_loading();
        let query = self.inner.query.read().to_params();
        match self.inner.load_from(source.as_ref(), &query) {
            Ok(count) => {
                tracing::debug!(store = %self.inner.name, count, "fetched entities");
                {
                    let mut status = self.inner.status.lock();
                    status.last_fetch = Some(Timestamp::now());
                    status.last_error = None;
                }
                self.inner.persist();
                Ok(())
            }
            Err(e) => Err(self.inner.fail(ErrorCode::ReadError, e)),
        }
    }

    /// Fetch again with the current query state.
    pub fn refresh(&self) -> CrudResult<()> {
        self.fetch(QueryParams::default())
    }
}

impl<T: Entity> StoreInner<T> {
    fn create_entity(&self, item: T) -> Result<T> {
        self.run_validation(&item)?;

        let mut fields = to_object(&item)?;
        let (key, entity, fields) = match key_of(field(&fields, &self.id_field)) {
            Some(key) => (key, item, fields),
            None => {
                let key = self.next_id()?;
                fields.insert(self.id_field.clone(), Value::String(key.clone()));
                let entity: T = from_object(fields)?;
                let fields = to_object(&entity)?;
                (key, entity, fields)
            }
        };

        self.table.write().put(key, entity.clone(), fields);
        Ok(entity)
    }

    fn update_entity(&self, id: &str, updates: Patch, expected: Option<u64>) -> Result<T> {
        self.check_identity(id, &updates)?;

        let (mut merged, version) = {
            let table = self.table.read();
            let entry = table
                .entry(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            (entry.fields.clone(), entry.version)
        };
        if let Some(expected) = expected {
            if expected != version {
                return Err(StoreError::VersionConflict {
                    id: id.to_string(),
                    expected,
                    actual: version,
                });
            }
        }

        merged.extend(updates);
        let entity: T = from_object(merged)?;
        self.run_validation(&entity)?;
        let fields = to_object(&entity)?;

        {
            // The entity may have moved on while the hook ran.
            let mut table = self.table.write();
            match table.version(id) {
                None => return Err(StoreError::NotFound(id.to_string())),
                Some(actual) if actual != version => {
                    return Err(StoreError::VersionConflict {
                        id: id.to_string(),
                        expected: version,
                        actual,
                    })
                }
                Some(_) => {}
            }
            table.put(id.to_string(), entity.clone(), fields);
        }

        Ok(entity)
    }

    fn delete_entity(&self, id: &str) -> Result<T> {
        let removed = self
            .table
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(removed.entity)
    }

    /// Pull records from `source`, decode them and swap them in.
    fn load_from(&self, source: &dyn DataSource, query: &QueryParams) -> Result<usize> {
        let entities = source
            .fetch(query)?
            .into_iter()
            .map(|raw| {
                let raw = match &self.transform {
                    Some(transform) => transform(raw),
                    None => raw,
                };
                serde_json::from_value::<T>(raw).map_err(|e| StoreError::Deserialization(e.to_string()))
            })
            .collect::<Result<Vec<T>>>()?;

        let count = entities.len();
        self.table.write().replace_all(entities)?;
        Ok(count)
    }
}
