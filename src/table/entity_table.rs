//! Ordered, keyed entity table.

use crate::error::{Result, StoreError};
use crate::query::values::{field, key_of, to_object};
use crate::types::Entity;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// A stored entity with its object form and version.
#[derive(Clone, Debug)]
pub struct TableEntry<T> {
    pub key: String,
    pub entity: T,
    /// JSON object form, used by filters and sorting.
    pub fields: Map<String, Value>,
    /// Table-wide write counter at the last write to this key. Never
    /// reused, across removals and replacements included.
    pub version: u64,
    /// Insertion position; kept across overwrites.
    position: u64,
}

/// Insertion-ordered map from identity to entity.
pub struct EntityTable<T> {
    id_field: String,
    entries: HashMap<String, TableEntry<T>>,
    order: BTreeMap<u64, String>,
    next_position: u64,
    /// Last version handed out. Survives `replace_all` and `clear`.
    last_version: u64,
    /// Bumped on every mutation of the table.
    revision: u64,
}

impl<T: Entity> EntityTable<T> {
    /// Create an empty table keyed by `id_field`.
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_position: 0,
            last_version: 0,
            revision: 0,
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Identity carried by an object form, if any.
    pub fn key_of(&self, fields: &Map<String, Value>) -> Option<String> {
        key_of(field(fields, &self.id_field))
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key).map(|e| &e.entity)
    }

    pub fn entry(&self, key: &str) -> Option<&TableEntry<T>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn version(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TableEntry<T>> + '_ {
        self.order.values().filter_map(move |key| self.entries.get(key))
    }

    /// Cloned entities in insertion order.
    pub fn entities(&self) -> Vec<T> {
        self.iter().map(|e| e.entity.clone()).collect()
    }

    /// Write an entity under `key`, returning its new version.
    ///
    /// Overwriting keeps the entry's original position.
    pub fn put(&mut self, key: String, entity: T, fields: Map<String, Value>) -> u64 {
        self.revision += 1;
        self.last_version += 1;
        let version = self.last_version;

        if let Some(existing) = self.entries.get_mut(&key) {
            existing.entity = entity;
            existing.fields = fields;
            existing.version = version;
            return version;
        }

        let position = self.next_position;
        self.next_position += 1;
        self.order.insert(position, key.clone());
        self.entries.insert(
            key.clone(),
            TableEntry {
                key,
                entity,
                fields,
                version,
                position,
            },
        );
        version
    }

    /// Upsert an entity under the identity it carries.
    pub fn upsert(&mut self, entity: T) -> Result<String> {
        let fields = to_object(&entity)?;
        let key = self
            .key_of(&fields)
            .ok_or_else(|| StoreError::InvalidFormat(format!("missing {}", self.id_field)))?;
        self.put(key.clone(), entity, fields);
        Ok(key)
    }

    /// Remove and return the entry under `key`.
    pub fn remove(&mut self, key: &str) -> Option<TableEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.position);
        self.revision += 1;
        Some(entry)
    }

    /// Replace the whole content. Either every entity is accepted or the
    /// table is left untouched.
    pub fn replace_all(&mut self, entities: Vec<T>) -> Result<()> {
        let mut fresh = EntityTable::new(self.id_field.clone());
        fresh.last_version = self.last_version;
        for entity in entities {
            fresh.upsert(entity)?;
        }

        self.entries = fresh.entries;
        self.order = fresh.order;
        self.next_position = fresh.next_position;
        self.last_version = fresh.last_version;
        self.revision += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.revision += 1;
    }
}
