//! Data-source collaborator behind `fetch` and `refresh`.

use crate::error::Result;
use crate::types::QueryParams;
use serde_json::Value;

/// Supplies raw records for a query.
///
/// The store passes its current filters, sort and pagination; how they are
/// honored (server-side or not at all) is up to the source. Records come back
/// untyped and go through the store's transform before decoding.
pub trait DataSource: Send + Sync {
    fn fetch(&self, query: &QueryParams) -> Result<Vec<Value>>;
}

impl<F> DataSource for F
where
    F: Fn(&QueryParams) -> Result<Vec<Value>> + Send + Sync,
{
    fn fetch(&self, query: &QueryParams) -> Result<Vec<Value>> {
        self(query)
    }
}
