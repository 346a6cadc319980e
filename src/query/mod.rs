//! Derived views over the entity table.
//!
//! The pipeline is filter -> sort -> paginate, always in that order, and
//! always computed from the current table and query state:
//!
//! ```ignore
//! let rows = apply_filters(table.iter().collect(), &query.filters);
//! let rows = apply_sort(rows, query.sort.as_ref(), comparator);
//! let page = apply_pagination(rows, query.pagination.as_ref());
//! ```

mod pipeline;
pub mod values;

pub use pipeline::{apply_filters, apply_pagination, apply_sort, matches_filter, run};

use crate::types::{Filter, PaginationSpec, QueryParams, SortSpec};
use std::cmp::Ordering;
use std::sync::Arc;

/// Caller-supplied ordering that replaces field comparison when sorting.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Inputs of the pipeline besides the entities themselves.
#[derive(Clone, Debug, Default)]
pub struct QueryState {
    filters: Vec<Filter>,
    sort: Option<SortSpec>,
    pagination: Option<PaginationSpec>,
    /// Bumped by every setter.
    revision: u64,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn pagination(&self) -> Option<&PaginationSpec> {
        self.pagination.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_filters(&mut self, filters: Vec<Filter>) {
        self.filters = filters;
        self.revision += 1;
    }

    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
        self.revision += 1;
    }

    /// Drop every filter on `field`.
    pub fn remove_filter(&mut self, field: &str) {
        self.filters.retain(|f| f.field != field);
        self.revision += 1;
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.revision += 1;
    }

    pub fn set_pagination(&mut self, pagination: Option<PaginationSpec>) {
        self.pagination = pagination;
        self.revision += 1;
    }

    /// Apply the parts of `params` that are present.
    pub fn apply_params(&mut self, params: QueryParams) {
        if let Some(filters) = params.filters {
            self.set_filters(filters);
        }
        if let Some(sort) = params.sort {
            self.set_sort(Some(sort));
        }
        if let Some(pagination) = params.pagination {
            self.set_pagination(Some(pagination));
        }
    }

    /// Current state as fetch parameters.
    pub fn to_params(&self) -> QueryParams {
        QueryParams {
            filters: Some(self.filters.clone()),
            sort: self.sort.clone(),
            pagination: self.pagination,
        }
    }

    /// Back to no filters, no sort, no pagination.
    pub fn reset(&mut self) {
        self.filters.clear();
        self.sort = None;
        self.pagination = None;
        self.revision += 1;
    }
}
