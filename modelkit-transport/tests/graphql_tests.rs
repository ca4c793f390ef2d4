use futures::StreamExt;
use modelkit_transport::mock::MockGraphqlTransport;
use modelkit_transport::{
    extract_operation_data, strip_typename, GraphqlDocument, GraphqlErrorBag, GraphqlTransport,
    HttpGraphqlTransport, OperationType, TransportError,
};
use modelkit_types::{into_params, Params};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USERS: &str = "query users($first: Int) { users(first: $first) { nodes { id } } }";

fn transport(server: &MockServer) -> HttpGraphqlTransport {
    HttpGraphqlTransport::new(format!("{}/graphql", server.uri()), Duration::from_secs(5)).unwrap()
}

// ── Documents ───────────────────────────────────────────────────

#[test]
fn parses_operation_header() {
    let doc = GraphqlDocument::parse(USERS).unwrap();
    assert_eq!(doc.name(), "users");
    assert_eq!(doc.operation(), OperationType::Query);
    assert!(!doc.is_mutation());

    let doc: GraphqlDocument = "mutation createUser($input: UserInput!) { createUser(input: $input) { id } }"
        .parse()
        .unwrap();
    assert_eq!(doc.name(), "createUser");
    assert!(doc.is_mutation());

    let doc = GraphqlDocument::parse("subscription onUserAdded { userAdded { id } }").unwrap();
    assert_eq!(doc.operation(), OperationType::Subscription);
}

#[test]
fn anonymous_document_is_rejected() {
    let err = GraphqlDocument::parse("{ users { id } }").unwrap_err();
    assert!(matches!(err, TransportError::InvalidDocument(_)));
}

// ── Payload helpers ─────────────────────────────────────────────

#[test]
fn strip_typename_is_deep() {
    let stripped = strip_typename(json!({
        "__typename": "User",
        "id": 1,
        "address": {"__typename": "Address", "city": "Oslo"},
        "tags": [{"__typename": "Tag", "name": "a"}]
    }));
    assert_eq!(
        stripped,
        json!({"id": 1, "address": {"city": "Oslo"}, "tags": [{"name": "a"}]})
    );
}

#[test]
fn extract_prefers_operation_name() {
    assert_eq!(
        extract_operation_data(json!({"users": [1], "other": 2}), "users"),
        json!([1])
    );
    assert_eq!(extract_operation_data(json!({"allUsers": [1]}), "users"), json!([1]));
    assert_eq!(extract_operation_data(json!({"a": 1, "b": 2}), "users"), json!(null));
    assert_eq!(extract_operation_data(json!(null), "users"), json!(null));
}

#[test]
fn error_bag_first_code() {
    let bag: GraphqlErrorBag = serde_json::from_value(json!({
        "graphQLErrors": [
            {"message": "nope", "extensions": {"errorCode": 401}},
            {"message": "second"}
        ]
    }))
    .unwrap();
    assert_eq!(bag.first_error_code(), Some(401));
    assert_eq!(bag.to_string(), "nope");
    assert_eq!(GraphqlErrorBag::default().first_error_code(), None);
}

// ── HTTP transport ──────────────────────────────────────────────

#[tokio::test]
async fn execute_posts_document_and_extracts_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "users",
            "variables": {"first": 2, "filter": {"name": "a"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"users": {"nodes": [{"id": "1"}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let doc = GraphqlDocument::parse(USERS).unwrap();
    let data = transport(&server)
        .execute(
            &doc,
            into_params(json!({"first": 2, "filter": {"__typename": "F", "name": "a"}})),
        )
        .await
        .unwrap();
    assert_eq!(data, json!({"nodes": [{"id": "1"}]}));
}

#[tokio::test]
async fn execute_maps_errors_to_bag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Unauthenticated", "extensions": {"errorCode": 401}}]
        })))
        .mount(&server)
        .await;

    let doc = GraphqlDocument::parse(USERS).unwrap();
    let err = transport(&server).execute(&doc, Params::new()).await.unwrap_err();
    match err {
        TransportError::Graphql(bag) => assert_eq!(bag.first_error_code(), Some(401)),
        other => panic!("expected graphql error, got {other:?}"),
    }
}

#[tokio::test]
async fn execute_non_json_failure_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let doc = GraphqlDocument::parse(USERS).unwrap();
    let err = transport(&server).execute(&doc, Params::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn execute_json_failure_without_errors_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "internal failure"})),
        )
        .mount(&server)
        .await;

    let doc = GraphqlDocument::parse(USERS).unwrap();
    let err = transport(&server).execute(&doc, Params::new()).await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Status {
            status: 500,
            message: "internal failure".into(),
        }
    );
}

#[tokio::test]
async fn execute_failure_with_data_is_still_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"data": {"users": []}})))
        .mount(&server)
        .await;

    let doc = GraphqlDocument::parse(USERS).unwrap();
    let err = transport(&server).execute(&doc, Params::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn http_subscribe_is_unsupported() {
    let server = MockServer::start().await;
    let doc = GraphqlDocument::parse("subscription userAdded { userAdded { id } }").unwrap();
    let result = transport(&server).subscribe(&doc, Params::new()).await;
    assert!(matches!(result, Err(TransportError::Unsupported(_))));
}

// ── Mock transport ──────────────────────────────────────────────

#[tokio::test]
async fn mock_replays_queue_and_records_calls() {
    let mock = MockGraphqlTransport::new();
    mock.push_response(Ok(json!({"id": 1})));

    let doc = GraphqlDocument::parse(USERS).unwrap();
    let first = mock
        .execute(&doc, into_params(json!({"__typename": "X", "first": 1})))
        .await
        .unwrap();
    let second = mock.execute(&doc, Params::new()).await.unwrap();

    assert_eq!(first, json!({"id": 1}));
    assert!(second.is_null());
    let calls = mock.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].operation_name, "users");
    assert_eq!(calls[0].variables, into_params(json!({"first": 1})));
}

#[tokio::test]
async fn mock_subscription_delivers_in_order() {
    let mock = MockGraphqlTransport::new();
    mock.push_subscription(vec![Ok(json!(1)), Ok(json!(2)), Ok(json!(3))]);

    let doc = GraphqlDocument::parse("subscription ticks { ticks }").unwrap();
    let items: Vec<_> = mock
        .subscribe(&doc, Params::new())
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(items, vec![json!(1), json!(2), json!(3)]);
}
