//! Cursor Paging Tests
//!
//! - Walking every page visits each row exactly once, in sort order
//! - The cursor carries every sort key plus the identity
//! - An unusable cursor restarts from the first page instead of failing

use std::sync::Arc;

use aeroquery::engine::QueryEngine;
use aeroquery::paging::CursorPayload;
use aeroquery::policy::{EntityConfiguration, ValidationConfig};
use aeroquery::projection::{ProjectionBinding, ProjectionRegistry};
use aeroquery::query::{QueryBuilder, QueryResponse};
use aeroquery::storage::{MemoryStorage, StorageProvider};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helper Functions
// =============================================================================

const DATA: &str = r#"{
    "entities": [{
        "name": "Customer",
        "fields": {
            "Id": {"type": "int"},
            "Name": {"type": "string"},
            "Region": {"type": "string"},
            "JoinedAt": {"type": "datetime"}
        },
        "records": [
            {"Id": 1, "Name": "Ada", "Region": "eu", "JoinedAt": "2024-03-01T00:00:00Z"},
            {"Id": 2, "Name": "Linus", "Region": "eu", "JoinedAt": "2024-01-15T00:00:00Z"},
            {"Id": 3, "Name": "Grace", "Region": "us", "JoinedAt": "2024-02-01T00:00:00Z"},
            {"Id": 4, "Name": "Barbara", "Region": null, "JoinedAt": "2024-02-01T00:00:00Z"},
            {"Id": 5, "Name": "Ken", "Region": "us", "JoinedAt": "2023-12-31T23:00:00Z"},
            {"Id": 6, "Name": "Edsger", "Region": "apac", "JoinedAt": "2024-02-01T00:00:00Z"},
            {"Id": 7, "Name": "Radia", "Region": "eu", "JoinedAt": "2024-04-01T00:00:00Z"}
        ]
    }]
}"#;

fn engine() -> QueryEngine {
    let storage = MemoryStorage::from_json(DATA).unwrap();
    let schema = storage.schema("Customer").unwrap();
    let mut registry = ProjectionRegistry::new();
    registry
        .register::<Value>(
            &schema,
            ProjectionBinding::identity_of(["Id", "Name", "Region", "JoinedAt"]),
        )
        .unwrap();

    let policy = ValidationConfig::new().with_entity(
        EntityConfiguration::new("Customer")
            .filterable(["Id", "Region"])
            .sortable(["Id", "Name", "Region", "JoinedAt"])
            .selectable(["Id", "Name", "Region", "JoinedAt"]),
    );
    QueryEngine::new(Arc::new(policy), Arc::new(storage), Arc::new(registry)).unwrap()
}

fn page(engine: &QueryEngine, builder: QueryBuilder, cursor: Option<&str>) -> QueryResponse<Value> {
    let builder = match cursor {
        Some(cursor) => builder.cursor(cursor),
        None => builder,
    };
    engine
        .execute(builder.build().unwrap(), &CancellationToken::new())
        .unwrap()
}

fn ids(response: &QueryResponse<Value>) -> Vec<i64> {
    response
        .items
        .iter()
        .map(|item| item["Id"].as_i64().unwrap())
        .collect()
}

/// Follows next cursors until the last page
fn walk(engine: &QueryEngine, builder: impl Fn() -> QueryBuilder) -> Vec<Vec<i64>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let response = page(engine, builder(), cursor.as_deref());
        pages.push(ids(&response));
        match response.page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return pages,
        }
    }
}

// =============================================================================
// Traversal Tests
// =============================================================================

/// Default order is identity ascending.
#[test]
fn test_walk_by_identity() {
    let engine = engine();
    let pages = walk(&engine, || QueryBuilder::for_entity("Customer").page_size(3));
    assert_eq!(pages, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
}

/// Descending sort with duplicates and a null; nulls sort first ascending,
/// so they come last descending.
#[test]
fn test_walk_with_ties_and_nulls() {
    let engine = engine();
    let pages = walk(&engine, || {
        QueryBuilder::for_entity("Customer")
            .order_by_descending("Region")
            .page_size(2)
    });
    assert_eq!(pages, vec![vec![3, 5], vec![1, 2], vec![7, 6], vec![4]]);
}

/// Timestamps compare as instants across keys.
#[test]
fn test_walk_by_timestamp_then_name() {
    let engine = engine();
    let pages = walk(&engine, || {
        QueryBuilder::for_entity("Customer")
            .order_by("JoinedAt")
            .then_by("Name")
            .page_size(3)
    });
    let flat: Vec<i64> = pages.concat();
    assert_eq!(flat, vec![5, 2, 4, 6, 3, 1, 7]);
}

/// Reverse flips every key, so cursors walk the reversed order.
#[test]
fn test_walk_reversed() {
    let engine = engine();
    let pages = walk(&engine, || QueryBuilder::for_entity("Customer").reverse().page_size(3));
    assert_eq!(pages, vec![vec![7, 6, 5], vec![4, 3, 2], vec![1]]);

    let pages = walk(&engine, || {
        QueryBuilder::for_entity("Customer")
            .order_by_descending("Region")
            .reverse()
            .page_size(3)
    });
    assert_eq!(pages.concat(), vec![4, 6, 7, 2, 1, 5, 3]);
}

/// Walking twice gives identical pages and cursors.
#[test]
fn test_walk_is_deterministic() {
    let engine = engine();
    let cursors = || {
        let mut cursors = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let builder = QueryBuilder::for_entity("Customer").order_by("JoinedAt").page_size(2);
            let response = page(&engine, builder, cursor.as_deref());
            cursors.push((ids(&response), response.page.next_cursor.clone()));
            match response.page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return cursors,
            }
        }
    };
    let first = cursors();
    assert_eq!(first.len(), 4);
    assert_eq!(first, cursors());
}

/// A full last page reports no further cursor.
#[test]
fn test_exact_final_page_has_no_cursor() {
    let engine = engine();
    let response = page(
        &engine,
        QueryBuilder::for_entity("Customer").equals("Region", "eu").page_size(3),
        None,
    );
    assert_eq!(ids(&response), vec![1, 2, 7]);
    assert!(response.page.next_cursor.is_none());
    assert!(!response.has_more());
}

// =============================================================================
// Cursor Format Tests
// =============================================================================

/// Without a sort the cursor holds only the identity.
#[test]
fn test_identity_cursor_shape() {
    let engine = engine();
    let response = page(&engine, QueryBuilder::for_entity("Customer").page_size(2), None);
    let cursor = response.page.next_cursor.unwrap();

    let decoded: Value = serde_json::from_slice(&STANDARD.decode(&cursor).unwrap()).unwrap();
    assert_eq!(decoded, json!({"values": {"Id": 2}, "timestamp": null}));
}

/// Every sort key is carried.
#[test]
fn test_cursor_holds_all_sort_keys() {
    let engine = engine();
    let response = page(
        &engine,
        QueryBuilder::for_entity("Customer").order_by("Name").page_size(1),
        None,
    );
    let payload = CursorPayload::decode(&response.page.next_cursor.unwrap()).unwrap();
    assert_eq!(payload.value("Name"), Some(&json!("Ada")));
    assert_eq!(payload.value("Id"), Some(&json!(1)));
}

// =============================================================================
// Self-Healing Tests
// =============================================================================

/// Garbage restarts from the first page and is counted.
#[test]
fn test_malformed_cursor_restarts() {
    let engine = engine();
    let response = page(
        &engine,
        QueryBuilder::for_entity("Customer").page_size(2),
        Some("%%% not base64 %%%"),
    );
    assert_eq!(ids(&response), vec![1, 2]);
    assert_eq!(engine.metrics().snapshot().cursor_decode_failures, 1);
}

/// A cursor minted under another sort lacks the active keys.
#[test]
fn test_cursor_from_other_sort_restarts() {
    let engine = engine();
    let first = page(&engine, QueryBuilder::for_entity("Customer").page_size(2), None);
    let cursor = first.page.next_cursor.unwrap();

    let response = page(
        &engine,
        QueryBuilder::for_entity("Customer").order_by("Name").page_size(2),
        Some(&cursor),
    );
    assert_eq!(ids(&response), vec![1, 4]);
    assert_eq!(engine.metrics().snapshot().cursor_decode_failures, 1);
}
