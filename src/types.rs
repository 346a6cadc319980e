//! Core types for the entity store.

use crate::error::OperationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    /// Time elapsed between this timestamp and `now`, zero if `now` is earlier.
    pub fn elapsed_until(self, now: Timestamp) -> Duration {
        Duration::from_micros(now.0.saturating_sub(self.0).max(0) as u64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Any record the store can hold.
///
/// Field access goes through the record's JSON object form, so the only
/// requirement is a serde round trip. `serde_json::Value` qualifies.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Entity for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Top-level fields to shallow-merge onto an entity.
pub type Patch = serde_json::Map<String, Value>;

/// Comparison applied by a [`Filter`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    /// Case-insensitive substring match on the text form of both sides.
    Contains,
    /// Membership in an array value.
    In,
    /// Anything else. Matches every entity.
    Unknown(String),
}

impl FilterOperator {
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::Unknown(op) => op,
        }
    }
}

impl From<&str> for FilterOperator {
    fn from(op: &str) -> Self {
        match op {
            "eq" => FilterOperator::Eq,
            "neq" => FilterOperator::Neq,
            "gt" => FilterOperator::Gt,
            "lt" => FilterOperator::Lt,
            "gte" => FilterOperator::Gte,
            "lte" => FilterOperator::Lte,
            "contains" => FilterOperator::Contains,
            "in" => FilterOperator::In,
            other => FilterOperator::Unknown(other.to_string()),
        }
    }
}

impl From<String> for FilterOperator {
    fn from(op: String) -> Self {
        FilterOperator::from(op.as_str())
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate over one entity field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<FilterOperator>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gte, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort order for the derived view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// 1-indexed page selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSpec {
    pub page: usize,
    pub page_size: usize,
}

impl PaginationSpec {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    /// Half-open index range `[(page-1)*size, page*size)`.
    ///
    /// Page 0 has no valid range.
    pub fn range(&self) -> Option<std::ops::Range<usize>> {
        let start = self.page.checked_sub(1)?.checked_mul(self.page_size)?;
        let end = start.checked_add(self.page_size)?;
        Some(start..end)
    }
}

/// Totals for the current page of the sorted view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

/// Query state handed to `fetch`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub filters: Option<Vec<Filter>>,
    pub sort: Option<SortSpec>,
    pub pagination: Option<PaginationSpec>,
}

impl QueryParams {
    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn pagination(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// One element of an `update_many` call.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub id: String,
    pub data: Patch,
}

impl UpdateRequest {
    pub fn new(id: impl Into<String>, data: Patch) -> Self {
        Self { id: id.into(), data }
    }
}

/// An element that failed inside a batch, paired with its error.
#[derive(Clone, Debug)]
pub struct BatchFailure<I> {
    pub item: I,
    pub error: OperationError,
}

/// Outcome of a batch call: per-item success and failure lists.
///
/// `F` is the input element type reported back on failure.
#[derive(Clone, Debug)]
pub struct BatchResult<S, F = S> {
    pub succeeded: Vec<S>,
    pub failed: Vec<BatchFailure<F>>,
}

impl<S, F> BatchResult<S, F> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True when no element failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<S, F> Default for BatchResult<S, F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of a store.
#[derive(Clone, Debug)]
pub struct CollectionState<T> {
    /// Entities in insertion order.
    pub entities: Vec<T>,
    pub loading: bool,
    pub error: Option<OperationError>,
    pub filters: Vec<Filter>,
    pub sort: Option<SortSpec>,
    pub pagination: Option<PaginationSpec>,
    pub last_fetch: Option<Timestamp>,
    pub stale: bool,
}
