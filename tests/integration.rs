//! Integration tests for the entity store.

use entity_store::{
    DataSource, ErrorCode, EventKind, Filter, PaginationSpec, QueryParams, Result, SortSpec,
    Store, StoreConfig, StoreError, UpdateRequest,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn scores() -> Store<Value> {
    Store::new(StoreConfig::new("scores").initial_data(vec![
        json!({"id": "1", "name": "a", "score": 10}),
        json!({"id": "2", "name": "b", "score": 5}),
    ]))
    .unwrap()
}

fn ids(entities: &[Value]) -> Vec<String> {
    entities
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

fn patch(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

// --- Realistic Workflow Tests ---

#[test]
fn test_filter_sort_delete_workflow() {
    let store = scores();

    let deleted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&deleted);
    let _unsubscribe = store.on(EventKind::Deleted, move |event| {
        sink.lock().push(event.payload.entity().cloned().unwrap());
    });

    store.set_filters(vec![Filter::gte("score", 6)]);
    assert_eq!(ids(&store.paginated()), vec!["1"]);

    store.clear_filters();
    store.set_sort(Some(SortSpec::desc("score")));
    assert_eq!(ids(&store.paginated()), vec!["1", "2"]);

    store.delete("1").unwrap();
    assert!(store.get_by_id("1").is_none());
    assert_eq!(
        *deleted.lock(),
        vec![json!({"id": "1", "name": "a", "score": 10})]
    );
}

#[test]
fn test_vm_inventory_workflow() {
    let store: Store<Value> = Store::new(StoreConfig::new("virtualization-vms")).unwrap();

    let created = store.create_many(vec![
        json!({"id": "web-1", "status": "running", "cpu": 2}),
        json!({"id": "web-2", "status": "stopped", "cpu": 2}),
        json!({"id": "db-1", "status": "running", "cpu": 8}),
    ]);
    assert!(created.is_complete());

    store.set_filters(vec![Filter::eq("status", "running")]);
    store.set_sort(Some(SortSpec::desc("cpu")));
    assert_eq!(ids(&store.paginated()), vec!["db-1", "web-1"]);

    // A stopped VM starts; the view follows
    store
        .update("web-2", patch(json!({"status": "running", "cpu": 4})))
        .unwrap();
    assert_eq!(ids(&store.paginated()), vec!["db-1", "web-2", "web-1"]);

    let removed = store.delete_many(["web-1", "web-2"]);
    assert_eq!(removed.succeeded, vec!["web-1", "web-2"]);
    assert_eq!(ids(&store.paginated()), vec!["db-1"]);
}

// --- Table Properties ---

#[test]
fn test_create_with_reused_identity_upserts() {
    let store = scores();
    store
        .create(json!({"id": "1", "name": "a2", "score": 11}))
        .unwrap();

    assert_eq!(store.count(), 2);
    // Overwrite keeps the original position
    assert_eq!(ids(&store.entities()), vec!["1", "2"]);
    assert_eq!(store.get_by_id("1").unwrap()["name"], "a2");
}

#[test]
fn test_exists_and_count() {
    let store = scores();
    assert!(store.exists("2"));
    assert!(!store.exists("3"));
    assert_eq!(store.count(), 2);

    store.clear();
    assert!(store.is_empty());
}

// --- Batches ---

#[test]
fn test_update_many_partial_failure() {
    let store = scores();
    let batch = store.subscribe(EventKind::BatchUpdated, 4);

    let result = store.update_many(vec![
        UpdateRequest::new("1", patch(json!({"score": 20}))),
        UpdateRequest::new("missing", patch(json!({"score": 1}))),
    ]);

    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].item.id, "missing");
    assert_eq!(result.failed[0].error.code, ErrorCode::UpdateError);
    assert_eq!(store.get_by_id("1").unwrap()["score"], 20);

    let event = batch.try_recv().unwrap();
    assert_eq!(event.payload.entities().unwrap().len(), 1);
    assert!(batch.try_recv().is_err());
}

#[test]
fn test_batch_items_see_earlier_items() {
    let store: Store<Value> = Store::new(StoreConfig::new("counters")).unwrap();
    store.create(json!({"id": "c", "n": 0, "tag": "x"})).unwrap();

    let result = store.update_many(vec![
        UpdateRequest::new("c", patch(json!({"n": 1}))),
        UpdateRequest::new("c", patch(json!({"tag": "y"}))),
    ]);

    assert!(result.is_complete());
    assert_eq!(store.get_by_id("c").unwrap(), json!({"id": "c", "n": 1, "tag": "y"}));
}

#[test]
fn test_delete_many_reports_missing_ids() {
    let store = scores();
    let result = store.delete_many(vec!["2".to_string(), "9".to_string()]);

    assert_eq!(result.succeeded, vec!["2"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].item, "9");
    assert_eq!(result.failed[0].error.code, ErrorCode::DeleteError);
    assert_eq!(result.failed[0].error.message, "Item with id 9 not found");
}

// --- Pagination ---

#[test]
fn test_pagination_boundary() {
    let store: Store<Value> = Store::new(
        StoreConfig::new("five").initial_data((1..=5).map(|i| json!({"id": i})).collect()),
    )
    .unwrap();

    store.set_pagination(Some(PaginationSpec::new(3, 2)));
    assert_eq!(store.paginated(), vec![json!({"id": 5})]);

    store.set_pagination(Some(PaginationSpec::new(4, 2)));
    assert!(store.paginated().is_empty());

    // The sorted view is not paginated
    assert_eq!(store.sorted().len(), 5);
}

// --- Events ---

#[test]
fn test_events_fire_once_per_change() {
    let store = scores();
    let created = store.subscribe(EventKind::Created, 8);
    let updated = store.subscribe(EventKind::Updated, 8);
    let errors = store.subscribe(EventKind::Error, 8);

    store.create(json!({"id": "3", "score": 1})).unwrap();
    store.update("3", patch(json!({"score": 2}))).unwrap();
    let _ = store.update("nope", patch(json!({"score": 2})));

    assert_eq!(created.drain().len(), 1);
    assert_eq!(updated.drain().len(), 1);

    let failures = errors.drain();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].payload.error().unwrap().code, ErrorCode::UpdateError);
    assert_eq!(failures[0].source, "scores");
}

#[test]
fn test_handlers_run_in_registration_order() {
    let store = scores();
    let calls = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let calls = Arc::clone(&calls);
        store.on(EventKind::Created, move |_| calls.lock().push(tag));
    }

    store.create(json!({"id": "3"})).unwrap();
    assert_eq!(*calls.lock(), vec!["first", "second"]);
}

#[test]
fn test_unsubscribe_and_destroy() {
    let store = scores();
    let calls = Arc::new(Mutex::new(0));

    let counter = Arc::clone(&calls);
    let unsubscribe = store.on(EventKind::Deleted, move |_| *counter.lock() += 1);
    store.delete("1").unwrap();
    unsubscribe.unsubscribe();
    store.delete("2").unwrap();
    assert_eq!(*calls.lock(), 1);

    let handle = store.subscribe(EventKind::Created, 4);
    store.destroy();
    assert!(store.is_empty());
    store.create(json!({"id": "x"})).unwrap();
    assert!(handle.try_recv().is_err());
}

#[test]
fn test_handler_sees_loading_during_mutation() {
    let store = Arc::new(scores());
    let seen = Arc::new(Mutex::new(None));

    let observer = Arc::clone(&store);
    let sink = Arc::clone(&seen);
    store.on(EventKind::Created, move |_| {
        *sink.lock() = Some(observer.loading());
    });

    store.create(json!({"id": "3"})).unwrap();
    assert_eq!(*seen.lock(), Some(true));
    assert!(!store.loading());
}

// --- Fetch ---

#[test]
fn test_fetch_replaces_table_from_source() {
    let seen = Arc::new(Mutex::new(None));
    let recorder = Arc::clone(&seen);

    let store: Store<Value> = Store::new(
        StoreConfig::new("remote")
            .data_source(move |query: &QueryParams| -> Result<Vec<Value>> {
                *recorder.lock() = Some(query.clone());
                Ok(vec![json!({"uuid": "a", "n": 1}), json!({"uuid": "b", "n": 2})])
            })
            .transform(|mut raw| {
                if let Some(uuid) = raw.get("uuid").cloned() {
                    raw["id"] = uuid;
                }
                raw
            }),
    )
    .unwrap();

    store
        .fetch(QueryParams::default().sort(SortSpec::desc("n")))
        .unwrap();

    assert_eq!(ids(&store.paginated()), vec!["b", "a"]);
    assert!(store.last_fetch().is_some());
    assert_eq!(
        seen.lock().as_ref().unwrap().sort,
        Some(SortSpec::desc("n"))
    );
}

struct FailingSource;

impl DataSource for FailingSource {
    fn fetch(&self, _query: &QueryParams) -> Result<Vec<Value>> {
        Err(StoreError::DataSource("connection refused".into()))
    }
}

#[test]
fn test_fetch_failure_keeps_table() {
    let store: Store<Value> = Store::new(
        StoreConfig::new("remote")
            .initial_data(vec![json!({"id": "keep"})])
            .data_source(FailingSource),
    )
    .unwrap();

    let err = store.refresh().unwrap_err();
    assert_eq!(err.code, ErrorCode::ReadError);
    assert_eq!(store.last_error(), Some(err));
    assert!(store.exists("keep"));
    assert!(!store.loading());
}

#[test]
fn test_state_snapshot() {
    let store = scores();
    store.set_filters(vec![Filter::gte("score", 6)]);
    let _ = store.delete("nope");

    let state = store.state();
    assert_eq!(state.entities.len(), 2);
    assert!(!state.loading);
    assert_eq!(state.error.unwrap().code, ErrorCode::DeleteError);
    assert_eq!(state.filters, vec![Filter::gte("score", 6)]);
    assert!(!state.stale);
}
