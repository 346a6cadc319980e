//! Optimistic updates with explicit rollback.
//!
//! An optimistic update writes straight to the table, skipping validation,
//! loading state and events, and hands back a token that can put the
//! previous value back if the confirming call fails.

use crate::error::{Result, StoreError};
use crate::query::values::{from_object, to_object};
use crate::store::{Store, StoreInner};
use crate::types::{Entity, Patch};
use serde_json::{Map, Value};
use std::sync::Weak;

/// Undo record for one optimistic update.
pub struct OptimisticToken<T: Entity> {
    pub id: String,
    pub previous_value: T,
    pub new_value: T,
    previous_fields: Map<String, Value>,
    /// Entity version written by the optimistic update.
    version: u64,
    store: Weak<StoreInner<T>>,
}

impl<T: Entity> OptimisticToken<T> {
    /// Put the previous value back verbatim, whatever happened since.
    ///
    /// Does nothing once the store is gone.
    pub fn rollback(&self) {
        if let Some(inner) = self.store.upgrade() {
            tracing::debug!(store = %inner.name, id = %self.id, "rolling back optimistic update");
            inner.restore(&self.id, self.previous_value.clone(), self.previous_fields.clone());
        }
    }

    /// True when the entity was written again (or removed) after this
    /// token was taken. Rolling back a stale token overwrites that write.
    pub fn is_stale(&self) -> bool {
        match self.store.upgrade() {
            Some(inner) => inner.table.read().version(&self.id) != Some(self.version),
            None => true,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<T: Entity> Store<T> {
    /// Apply `updates` immediately and return a token to undo them.
    ///
    /// Fails without writing when `id` is missing or `updates` would change
    /// the entity's identity.
    pub fn optimistic_update(&self, id: &str, updates: Patch) -> Result<OptimisticToken<T>> {
        self.inner.check_identity(id, &updates)?;

        let (previous_value, previous_fields) = {
            let table = self.inner.table.read();
            let entry = table
                .entry(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            (entry.entity.clone(), entry.fields.clone())
        };

        let mut merged = previous_fields.clone();
        merged.extend(updates);
        let new_value: T = from_object(merged)?;
        let fields = to_object(&new_value)?;

        let version = self.inner.restore(id, new_value.clone(), fields);

        Ok(OptimisticToken {
            id: id.to_string(),
            previous_value,
            new_value,
            previous_fields,
            version,
            store: std::sync::Arc::downgrade(&self.inner),
        })
    }

    /// Undo an optimistic update.
    pub fn rollback(&self, token: &OptimisticToken<T>) {
        token.rollback();
    }
}
