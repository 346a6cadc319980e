//! Property-based tests for the table and the query pipeline.
//!
//! - Uniqueness: no sequence of creates yields two entries for one identity
//! - Stability: equal sort keys keep insertion order in both directions
//! - Purity: deriving twice from the same inputs gives the same output

use entity_store::query::{apply_pagination, run};
use entity_store::{
    EntityTable, Filter, PaginationSpec, QueryState, SortDirection, SortSpec, Store, StoreConfig,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn row_strategy() -> impl Strategy<Value = (u8, i64)> {
    // Small id space so identities collide
    (0u8..16, -5i64..5)
}

fn direction_strategy() -> impl Strategy<Value = SortDirection> {
    prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)]
}

fn store_from(rows: &[(u8, i64)]) -> Store<Value> {
    let store = Store::new(StoreConfig::new("props")).unwrap();
    for (id, score) in rows {
        store
            .create(json!({"id": id.to_string(), "score": score}))
            .unwrap();
    }
    store
}

fn position_map(store: &Store<Value>) -> Vec<String> {
    store
        .entities()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

proptest! {
    #[test]
    fn identities_stay_unique(rows in prop::collection::vec(row_strategy(), 0..64)) {
        let store = store_from(&rows);

        let distinct: HashSet<u8> = rows.iter().map(|(id, _)| *id).collect();
        prop_assert_eq!(store.count(), distinct.len());

        let ids = position_map(&store);
        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());

        // Last write wins
        for id in &distinct {
            let last = rows.iter().rev().find(|(other, _)| other == id).map(|(_, s)| *s);
            prop_assert_eq!(
                store.get_by_id(&id.to_string()).unwrap()["score"].as_i64(),
                last
            );
        }
    }

    #[test]
    fn sort_is_stable(
        rows in prop::collection::vec(row_strategy(), 0..64),
        direction in direction_strategy(),
    ) {
        let store = store_from(&rows);
        let insertion = position_map(&store);

        store.set_sort(Some(SortSpec { field: "score".into(), direction }));
        let sorted = store.sorted();

        for pair in sorted.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (sa, sb) = (a["score"].as_i64().unwrap(), b["score"].as_i64().unwrap());
            match direction {
                SortDirection::Asc => prop_assert!(sa <= sb),
                SortDirection::Desc => prop_assert!(sa >= sb),
            }
            if sa == sb {
                let pa = insertion.iter().position(|id| id == a["id"].as_str().unwrap());
                let pb = insertion.iter().position(|id| id == b["id"].as_str().unwrap());
                prop_assert!(pa < pb);
            }
        }
    }

    #[test]
    fn derivation_is_pure(
        rows in prop::collection::vec(row_strategy(), 0..64),
        threshold in -5i64..5,
        page in 0usize..6,
        page_size in 0usize..6,
    ) {
        let store = store_from(&rows);
        let before = store.entities();

        let filters = vec![Filter::gte("score", threshold)];
        let sort = SortSpec::desc("score");
        let pagination = PaginationSpec::new(page, page_size);

        store.set_filters(filters.clone());
        store.set_sort(Some(sort.clone()));
        store.set_pagination(Some(pagination));

        let first = store.paginated();
        let second = store.paginated();
        prop_assert_eq!(&first, &second);

        // Same inputs through the bare pipeline, with no view cache involved
        let mut table = EntityTable::new("id");
        table.replace_all(before.clone()).unwrap();
        let mut query = QueryState::new();
        query.set_filters(filters);
        query.set_sort(Some(sort));
        query.set_pagination(Some(pagination));
        let expected: Vec<Value> = apply_pagination(run(&table, &query, None), query.pagination())
            .into_iter()
            .map(|row| row.entity.clone())
            .collect();
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(store.entities(), before);
        prop_assert!(first.len() <= page_size);
        prop_assert!(first.iter().all(|e| e["score"].as_i64().unwrap() >= threshold));
    }

    #[test]
    fn optimistic_rollback_restores_exactly(
        rows in prop::collection::vec(row_strategy(), 1..32),
        extra in "[a-z]{1,8}",
        score in any::<i64>(),
    ) {
        let store = store_from(&rows);
        let id = rows[0].0.to_string();
        let before = store.get_by_id(&id);

        let mut patch = Map::new();
        patch.insert("score".into(), json!(score));
        patch.insert(extra, json!(true));

        let token = store.optimistic_update(&id, patch).unwrap();
        token.rollback();
        prop_assert_eq!(store.get_by_id(&id), before);
    }
}
