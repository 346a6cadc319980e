//! Filter, sort and paginate stages.
//!
//! Every stage takes rows by value and returns a new row list; the table is
//! only ever read.

use super::values::{compare_values, field, sort_order, to_text, values_equal};
use super::{Comparator, QueryState};
use crate::table::{EntityTable, TableEntry};
use crate::types::{Filter, FilterOperator, PaginationSpec, SortDirection, SortSpec};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Whether one entity's object form satisfies a filter.
pub fn matches_filter(fields: &Map<String, Value>, filter: &Filter) -> bool {
    let value = field(fields, &filter.field);
    let target = &filter.value;

    match &filter.operator {
        FilterOperator::Eq => values_equal(value, target),
        FilterOperator::Neq => !values_equal(value, target),
        FilterOperator::Gt => compare_values(value, target) == Some(Ordering::Greater),
        FilterOperator::Lt => compare_values(value, target) == Some(Ordering::Less),
        FilterOperator::Gte => matches!(
            compare_values(value, target),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::Lte => matches!(
            compare_values(value, target),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::Contains => to_text(value)
            .to_lowercase()
            .contains(&to_text(target).to_lowercase()),
        FilterOperator::In => match target {
            Value::Array(options) => options.iter().any(|o| values_equal(value, o)),
            _ => false,
        },
        FilterOperator::Unknown(_) => true,
    }
}

/// Keep rows matching every filter. No filters keeps everything.
pub fn apply_filters<'a, T>(
    rows: Vec<&'a TableEntry<T>>,
    filters: &[Filter],
) -> Vec<&'a TableEntry<T>> {
    if filters.is_empty() {
        return rows;
    }

    for filter in filters {
        if let FilterOperator::Unknown(op) = &filter.operator {
            tracing::warn!(field = %filter.field, operator = %op, "unknown filter operator matches every entity");
        }
    }

    rows.into_iter()
        .filter(|row| filters.iter().all(|f| matches_filter(&row.fields, f)))
        .collect()
}

/// Stable sort. Ties keep their input order in both directions.
pub fn apply_sort<'a, T>(
    mut rows: Vec<&'a TableEntry<T>>,
    sort: Option<&SortSpec>,
    comparator: Option<&Comparator<T>>,
) -> Vec<&'a TableEntry<T>> {
    let Some(sort) = sort else {
        return rows;
    };

    rows.sort_by(|a, b| {
        let ordering = match comparator {
            Some(compare) => compare(&a.entity, &b.entity),
            None => sort_order(field(&a.fields, &sort.field), field(&b.fields, &sort.field)),
        };
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    rows
}

/// Slice out one page. Pages past the end are empty.
pub fn apply_pagination<R>(rows: Vec<R>, pagination: Option<&PaginationSpec>) -> Vec<R> {
    let Some(pagination) = pagination else {
        return rows;
    };

    match pagination.range() {
        Some(range) if range.start < rows.len() => {
            let end = range.end.min(rows.len());
            rows.into_iter().skip(range.start).take(end - range.start).collect()
        }
        _ => Vec::new(),
    }
}

/// Filter and sort the table under `query`, without paginating.
pub fn run<'a, T: crate::types::Entity>(
    table: &'a EntityTable<T>,
    query: &QueryState,
    comparator: Option<&Comparator<T>>,
) -> Vec<&'a TableEntry<T>> {
    let filtered = apply_filters(table.iter().collect(), query.filters());
    apply_sort(filtered, query.sort(), comparator)
}
