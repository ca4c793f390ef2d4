use modelkit_model::ModelError;
use modelkit_repository::{extract_connection, PageInfo};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn nodes_are_taken_with_metadata() {
    let connection = extract_connection(json!({
        "nodes": [{"id": 1}, {"id": 2}],
        "pageInfo": {"hasNextPage": false, "hasPreviousPage": true, "startCursor": "a"},
        "totalCount": 12
    }))
    .unwrap();
    assert_eq!(connection.items, vec![json!({"id": 1}), json!({"id": 2})]);
    assert_eq!(connection.total_count, Some(12));
    assert_eq!(
        connection.page_info,
        Some(PageInfo {
            has_previous_page: true,
            start_cursor: Some("a".into()),
            ..PageInfo::default()
        })
    );
}

#[test]
fn edges_are_unwrapped_to_nodes() {
    let connection = extract_connection(json!({
        "edges": [{"cursor": "a", "node": {"id": 1}}, {"cursor": "b"}]
    }))
    .unwrap();
    assert_eq!(connection.items, vec![json!({"id": 1})]);
    assert_eq!(connection.page_info, None);
    assert_eq!(connection.total_count, None);
}

#[test]
fn bare_arrays_and_null_are_accepted() {
    assert_eq!(extract_connection(json!([1, 2])).unwrap().items.len(), 2);
    assert!(extract_connection(json!(null)).unwrap().items.is_empty());
}

#[test]
fn scalars_are_rejected() {
    assert!(matches!(
        extract_connection(json!("nope")),
        Err(ModelError::Serialization(_))
    ));
}
