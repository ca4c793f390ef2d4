use modelkit_events::SubscribeOptions;
use modelkit_model::{Collection, Config, Context, Model, ModelError, ModelProps, ModelResult};
use modelkit_repository::{ModelFactory, PageInfo, QueryOutput, Repository, ResponseShape};
use modelkit_transport::mock::{MockGraphqlTransport, MockRestTransport};
use modelkit_transport::{
    ErrorExtensions, GraphqlDocument, GraphqlError, GraphqlErrorBag, Operation, RequestDescriptor,
    Target, TransportError,
};
use modelkit_types::{event_names, into_params, Event, HttpMethod};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default)]
    name: String,
}

impl ModelProps for User {
    const TYPE_NAME: &'static str = "User";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Article {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    title: String,
}

impl ModelProps for Article {
    const TYPE_NAME: &'static str = "Article";
    const IDENTIFIER: Option<&'static str> = Some("slug");
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Pet {
    #[serde(default)]
    name: String,
    #[serde(default)]
    sound: String,
}

impl ModelProps for Pet {
    const TYPE_NAME: &'static str = "Pet";
}

fn rest_context() -> (Context, MockRestTransport) {
    let mock = MockRestTransport::new();
    let ctx = Context::new(Config::rest("https://api.test")).with_rest(mock.clone());
    (ctx, mock)
}

fn graphql_context() -> (Context, MockGraphqlTransport) {
    let mock = MockGraphqlTransport::new();
    let ctx = Context::new(Config::graphql("https://api.test/graphql")).with_graphql(mock.clone());
    (ctx, mock)
}

fn users_query() -> GraphqlDocument {
    GraphqlDocument::parse("query users { users { id name } }").unwrap()
}

fn user_query() -> GraphqlDocument {
    GraphqlDocument::parse("query user($uuid: ID!) { user(uuid: $uuid) { id name } }").unwrap()
}

fn graphql_failure(code: u16, message: &str) -> TransportError {
    TransportError::Graphql(GraphqlErrorBag::new(vec![GraphqlError {
        message: format!("raw {message}"),
        extensions: Some(ErrorExtensions {
            error_code: Some(code),
            message: Some(message.to_string()),
        }),
    }]))
}

fn record_events<P: ModelProps>(
    repository: &mut Repository<P>,
    kinds: &[&str],
) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in kinds {
        let sink = Arc::clone(&seen);
        repository.on(
            kind,
            move |event: &Event| sink.lock().unwrap().push(event.kind.clone()),
            SubscribeOptions::default(),
        );
    }
    seen
}

// ── Construction ────────────────────────────────────────────────

#[test]
fn fresh_repository_is_idle_and_empty() {
    let (ctx, _) = rest_context();
    let users = Repository::<User>::builder(ctx).build().unwrap();
    assert!(!users.loading());
    assert!(!users.exists());
    assert!(users.dataset().is_empty());
    assert!(users.last_error().is_none());
    assert_eq!(users.method(), None);
    assert_eq!(users.class_name(), "UserRepository");
    assert_eq!(users.display_class_name(), "userrepository");
}

#[test]
fn construct_is_replayed_to_late_subscribers() {
    let (ctx, _) = rest_context();
    let mut users = Repository::<User>::builder(ctx)
        .name("Team")
        .build()
        .unwrap();
    let seen = record_events(&mut users, &[event_names::CONSTRUCT]);
    assert_eq!(*seen.lock().unwrap(), vec!["construct".to_string()]);
    assert_eq!(users.events().target(), "Team");
}

#[test]
fn seeded_values_are_hydrated_skipping_empty_items() {
    let (ctx, _) = rest_context();
    let users = Repository::<User>::builder(ctx)
        .seed(vec![json!({"id": 1, "name": "Ann"}), Value::Null, json!({"id": 2, "name": "Bob"})])
        .build()
        .unwrap();
    let names: Vec<_> = users.dataset().iter().map(|u| u.name.clone()).collect();
    assert_eq!(names, vec!["Ann", "Bob"]);
    assert!(users.dataset().iter().all(Model::exists));
}

#[test]
fn seeded_collection_is_used_as_is() {
    let (ctx, _) = rest_context();
    let seed = Collection::from(vec![Model::new(
        ctx.clone(),
        User {
            id: Some(9),
            name: "Zed".into(),
        },
    )]);
    let users = Repository::<User>::builder(ctx)
        .seed_collection(seed)
        .build()
        .unwrap();
    assert_eq!(users.dataset().count(), 1);
    assert_eq!(users.dataset()[0].id, Some(9));
}

// ── from_array ──────────────────────────────────────────────────

#[test]
fn from_array_respects_skip_empty() {
    let (ctx, _) = rest_context();
    let users = Repository::<User>::builder(ctx).build().unwrap();
    let items = vec![json!({"name": "Ann"}), json!(false), json!({})];

    assert_eq!(users.from_array(items.clone(), true).unwrap().count(), 2);
    let err = users.from_array(items, false).unwrap_err();
    assert!(matches!(err, ModelError::Serialization(_)));
}

#[test]
fn selector_factory_picks_hydrator_per_item() {
    fn cat(data: Value) -> ModelResult<Pet> {
        let mut pet: Pet = serde_json::from_value(data)?;
        pet.sound = "meow".into();
        Ok(pet)
    }
    fn dog(data: Value) -> ModelResult<Pet> {
        let mut pet: Pet = serde_json::from_value(data)?;
        pet.sound = "woof".into();
        Ok(pet)
    }

    let (ctx, _) = rest_context();
    let pets = Repository::<Pet>::builder(ctx)
        .factory(ModelFactory::selector(|data: &Value| {
            if data["__typename"] == "Cat" {
                cat as fn(Value) -> ModelResult<Pet>
            } else {
                dog
            }
        }))
        .build()
        .unwrap();

    let built = pets
        .from_array(
            vec![
                json!({"__typename": "Cat", "name": "Tom"}),
                json!({"__typename": "Dog", "name": "Rex"}),
            ],
            true,
        )
        .unwrap();
    let sounds: Vec<_> = built.iter().map(|p| p.sound.clone()).collect();
    assert_eq!(sounds, vec!["meow", "woof"]);
    assert_eq!(built[0].typename(), Some("Cat"));
}

// ── many ────────────────────────────────────────────────────────

#[tokio::test]
async fn many_without_target_is_invalid_argument() {
    let (ctx, mock) = rest_context();
    let mut users = Repository::<User>::builder(ctx).build().unwrap();
    let seen = record_events(&mut users, &[event_names::BEFORE_QUERY, event_names::ON_ERROR]);

    let err = users.many(None).await.unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));
    assert!(!users.loading());
    assert!(!users.exists());
    assert!(users.last_error().is_none());
    assert!(seen.lock().unwrap().is_empty());
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn rest_many_gets_with_default_query_params() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!([{"id": 1, "name": "Ann"}, {"id": 2, "name": "Bob"}])));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/users")
        .query_params(into_params(json!({"perPage": 2})))
        .build()
        .unwrap();

    let dataset = users.many(None).await.unwrap();
    assert_eq!(dataset.count(), 2);
    assert!(users.exists());
    assert!(!users.loading());
    assert_eq!(users.method(), Some(HttpMethod::Get));

    let call = mock.last_call().unwrap();
    assert_eq!(call.url, "/users");
    assert_eq!(call.method, HttpMethod::Get);
    assert_eq!(call.params, into_params(json!({"perPage": 2})));
}

#[tokio::test]
async fn explicit_params_replace_defaults_and_fill_url_tokens() {
    let (ctx, mock) = rest_context();
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/teams/:team/users")
        .query_params(into_params(json!({"page": 1})))
        .build()
        .unwrap();

    users
        .many(Some(into_params(json!({"team": 7, "active": true}))))
        .await
        .unwrap();

    let call = mock.last_call().unwrap();
    assert_eq!(call.url, "/teams/7/users");
    assert_eq!(call.params, into_params(json!({"active": true})));
    assert!(users.dataset().is_empty());
}

#[tokio::test]
async fn many_emits_query_events_in_order() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!([])));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/users")
        .build()
        .unwrap();
    let seen = record_events(
        &mut users,
        &[event_names::BEFORE_QUERY, event_names::AFTER_QUERY],
    );

    users.many(None).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["beforeQuery", "afterQuery"]);
}

#[tokio::test]
async fn graphql_many_posts_the_document() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Ok(json!([{"id": 1, "name": "Ann", "__typename": "User"}])));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many(users_query())
        .build()
        .unwrap();

    users.many(None).await.unwrap();
    assert_eq!(users.method(), Some(HttpMethod::Post));
    assert_eq!(users.dataset()[0].typename(), Some("User"));
    assert_eq!(mock.last_call().unwrap().operation_name, "users");
}

#[tokio::test]
async fn connection_responses_record_pagination() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Ok(json!({
        "edges": [{"node": {"id": 1, "name": "Ann"}}, {"node": {"id": 2, "name": "Bob"}}],
        "pageInfo": {"hasNextPage": true, "endCursor": "c2"},
        "totalCount": 5
    })));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many(users_query())
        .connection()
        .build()
        .unwrap();

    users.many(None).await.unwrap();
    assert_eq!(users.dataset().count(), 2);
    assert_eq!(users.total_count(), Some(5));
    assert_eq!(
        users.page_info(),
        Some(&PageInfo {
            has_next_page: true,
            end_cursor: Some("c2".into()),
            ..PageInfo::default()
        })
    );
}

#[tokio::test]
async fn non_array_collection_response_is_an_error() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!({"unexpected": true})));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/users")
        .build()
        .unwrap();

    let err = users.many(None).await.unwrap_err();
    assert!(matches!(err, ModelError::Serialization(_)));
    assert!(!users.exists());
    assert!(!users.loading());
}

// ── one ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rest_one_sends_id() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!({"id": 4, "name": "Dee"})));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_one("/users/:id")
        .build()
        .unwrap();

    let user = users.one(4).await.unwrap();
    assert_eq!(user.name, "Dee");
    assert!(user.exists());
    let call = mock.last_call().unwrap();
    assert_eq!(call.url, "/users/4");
    assert_eq!(call.method, HttpMethod::Get);
    assert!(users.dataset().is_empty());
}

#[tokio::test]
async fn graphql_one_sends_uuid() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Ok(json!({"uuid": "u-4", "id": 4, "name": "Dee"})));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_one(user_query())
        .build()
        .unwrap();

    let user = users.one("u-4").await.unwrap();
    assert_eq!(user.uuid(), "u-4");
    assert_eq!(
        mock.last_call().unwrap().variables,
        into_params(json!({"uuid": "u-4"}))
    );
}

#[tokio::test]
async fn identifier_overrides_the_lookup_key() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!({"slug": "hello", "title": "Hello"})));
    let mut articles = Repository::<Article>::builder(ctx)
        .fetch_one("/articles/:slug")
        .build()
        .unwrap();

    let article = articles.one("hello").await.unwrap();
    assert_eq!(article.title, "Hello");
    assert_eq!(mock.last_call().unwrap().url, "/articles/hello");
}

#[tokio::test]
async fn one_with_null_payload_hydrates_defaults() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(Value::Null));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_one("/users/:id")
        .build()
        .unwrap();

    let user = users.one(404).await.unwrap();
    assert_eq!(user.props(), &User::default());
    assert!(users.last_error().is_none());
    assert_eq!(mock.last_call().unwrap().url, "/users/404");
}

#[tokio::test]
async fn one_without_target_is_invalid_argument() {
    let (ctx, _) = rest_context();
    let mut users = Repository::<User>::builder(ctx).build().unwrap();
    assert!(matches!(
        users.one(1).await,
        Err(ModelError::InvalidArgument(_))
    ));
}

// ── Methods ─────────────────────────────────────────────────────

#[tokio::test]
async fn method_hook_overrides_rest_queries() {
    let (ctx, mock) = rest_context();
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/users/search")
        .method_override(|request: &RequestDescriptor<'_>| {
            request
                .operation
                .as_url()
                .filter(|url| url.ends_with("/search"))
                .map(|_| HttpMethod::Post)
        })
        .build()
        .unwrap();

    users.many(None).await.unwrap();
    assert_eq!(mock.last_call().unwrap().method, HttpMethod::Post);
    assert_eq!(users.method(), Some(HttpMethod::Post));
}

#[tokio::test]
async fn raw_query_with_explicit_method() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!({"total": 3})));
    let mut users = Repository::<User>::builder(ctx).build().unwrap();

    let output = users
        .query(
            &Target::url("/users/stats"),
            Default::default(),
            ResponseShape::Raw,
            Some(HttpMethod::Put),
        )
        .await
        .unwrap();
    assert_eq!(output.into_raw(), Some(json!({"total": 3})));
    assert_eq!(mock.last_call().unwrap().method, HttpMethod::Put);
}

#[tokio::test]
async fn deferred_target_is_resolved_per_query() {
    let (ctx, mock) = rest_context();
    mock.push_response(Ok(json!([{"name": "Ann"}])));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many(Target::deferred(|| async {
            Operation::Url("/v2/users".to_string())
        }))
        .build()
        .unwrap();

    users.many(None).await.unwrap();
    assert_eq!(mock.last_call().unwrap().url, "/v2/users");
}

// ── Errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_graphql_errors_are_classified() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Err(graphql_failure(401, "token expired")));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many(users_query())
        .build()
        .unwrap();

    let err = users.many(None).await.unwrap_err();
    assert_eq!(err, ModelError::Unauthorized("token expired".into()));
    assert_eq!(
        users.last_error(),
        Some(&ModelError::Transport(graphql_failure(401, "token expired")))
    );
    assert!(!users.loading());
    assert!(!users.exists());
}

#[tokio::test]
async fn validation_graphql_errors_are_classified() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Err(graphql_failure(422, "name is required")));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_one(user_query())
        .build()
        .unwrap();

    let err = users.one("u-1").await.unwrap_err();
    assert_eq!(err, ModelError::Validation("name is required".into()));
}

#[tokio::test]
async fn other_graphql_errors_are_unexpected() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Err(graphql_failure(503, "maintenance")));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many(users_query())
        .build()
        .unwrap();

    let err = users.many(None).await.unwrap_err();
    assert_eq!(err, ModelError::Unexpected("raw maintenance".into()));
}

#[tokio::test]
async fn rest_failures_pass_through_unclassified() {
    let (ctx, mock) = rest_context();
    let failure = TransportError::Status {
        status: 404,
        message: "Not Found".into(),
    };
    mock.push_response(Err(failure.clone()));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/users")
        .build()
        .unwrap();

    let err = users.many(None).await.unwrap_err();
    assert_eq!(err, ModelError::Transport(failure));
}

#[tokio::test]
async fn error_is_emitted_before_after_query() {
    let (ctx, mock) = graphql_context();
    mock.push_response(Err(graphql_failure(500, "boom")));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many(users_query())
        .build()
        .unwrap();
    let seen = record_events(
        &mut users,
        &[
            event_names::BEFORE_QUERY,
            event_names::ON_ERROR,
            event_names::AFTER_QUERY,
        ],
    );

    assert!(users.many(None).await.is_err());
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["beforeQuery", "onError", "afterQuery"]
    );
}

#[tokio::test]
async fn missing_transport_is_a_config_error() {
    let ctx = Context::new(Config::rest("https://api.test"));
    let mut users = Repository::<User>::builder(ctx)
        .fetch_many("/users")
        .build()
        .unwrap();

    let err = users.many(None).await.unwrap_err();
    assert!(matches!(err, ModelError::Config(_)));
    assert!(matches!(users.last_error(), Some(ModelError::Config(_))));
}

#[test]
fn query_output_accessors() {
    let raw: QueryOutput<User> = QueryOutput::Raw(json!(1));
    assert!(raw.into_collection().is_none());
    let collection: QueryOutput<User> = QueryOutput::Collection(Collection::new());
    assert!(collection.into_collection().unwrap().is_empty());
}
