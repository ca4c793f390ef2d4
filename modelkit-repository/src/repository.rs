//! Repositories.
//!
//! A [`Repository`] fetches models of one type, keeps the last fetched
//! collection as its dataset and tracks the same `loading`/`exists`
//! lifecycle a model does, at collection level.

use crate::factory::ModelFactory;
use crate::shape::{expect_array, extract_connection, PageInfo, QueryOutput, ResponseShape};
use crate::subscription::{
    handler_name, Delivery, SubscriptionDescriptor, SubscriptionFeed, SubscriptionHandler,
};
use futures::stream::{BoxStream, StreamExt};
use modelkit_events::{EventEmitter, SubscribeOptions};
use modelkit_model::{
    classify, Collection, Context, Model, ModelError, ModelProps, ModelResult, ID_KEY, UUID_KEY,
};
use modelkit_transport::{
    default_method, strip_typename, GraphqlDocument, Operation, RequestAction,
    RequestDescriptor, Target,
};
use modelkit_types::{event_names, into_params, is_truthy, Event, HttpMethod, Params};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Method override hook of a repository.
pub type MethodHook = Arc<dyn Fn(&RequestDescriptor<'_>) -> Option<HttpMethod> + Send + Sync>;

enum Seed<P: ModelProps> {
    Empty,
    Values(Vec<Value>),
    Collection(Collection<Model<P>>),
}

/// Configures and builds a [`Repository`].
pub struct RepositoryBuilder<P: ModelProps> {
    context: Context,
    name: String,
    fetch_one_query: Option<Target>,
    fetch_many_query: Option<Target>,
    query_params: Params,
    many_shape: ResponseShape,
    factory: ModelFactory<P>,
    method_override: Option<MethodHook>,
    subscriptions: Vec<SubscriptionDescriptor>,
    handlers: HashMap<String, SubscriptionHandler>,
    seed: Seed<P>,
}

impl<P: ModelProps> RepositoryBuilder<P> {
    fn new(context: Context) -> Self {
        Self {
            context,
            name: format!("{}Repository", P::TYPE_NAME),
            fetch_one_query: None,
            fetch_many_query: None,
            query_params: Params::new(),
            many_shape: ResponseShape::Collection,
            factory: ModelFactory::Fixed,
            method_override: None,
            subscriptions: Vec::new(),
            handlers: HashMap::new(),
            seed: Seed::Empty,
        }
    }

    /// Name used as the target of emitted events. Defaults to
    /// `<TypeName>Repository`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn fetch_one(mut self, target: impl Into<Target>) -> Self {
        self.fetch_one_query = Some(target.into());
        self
    }

    pub fn fetch_many(mut self, target: impl Into<Target>) -> Self {
        self.fetch_many_query = Some(target.into());
        self
    }

    /// Default params of [`Repository::many`].
    pub fn query_params(mut self, params: Params) -> Self {
        self.query_params = params;
        self
    }

    /// Treats `many()` responses as paginated connections.
    pub fn connection(mut self) -> Self {
        self.many_shape = ResponseShape::Connection;
        self
    }

    pub fn factory(mut self, factory: ModelFactory<P>) -> Self {
        self.factory = factory;
        self
    }

    /// Overrides REST methods for this repository, taking precedence over
    /// [`ModelProps::method_override`].
    pub fn method_override<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestDescriptor<'_>) -> Option<HttpMethod> + Send + Sync + 'static,
    {
        self.method_override = Some(Arc::new(hook));
        self
    }

    pub fn subscription(mut self, document: GraphqlDocument, variables: Params) -> Self {
        self.subscriptions
            .push(SubscriptionDescriptor::new(document, variables));
        self
    }

    /// Registers the handler of the subscription named `operation_name`.
    pub fn handler<F>(mut self, operation_name: &str, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.handlers
            .insert(handler_name(operation_name), Arc::new(handler));
        self
    }

    /// Seeds the dataset from raw items, hydrated through the factory.
    pub fn seed(mut self, values: Vec<Value>) -> Self {
        self.seed = Seed::Values(values);
        self
    }

    /// Seeds the dataset with existing models.
    pub fn seed_collection(mut self, collection: Collection<Model<P>>) -> Self {
        self.seed = Seed::Collection(collection);
        self
    }

    /// Builds the repository and emits `construct`.
    pub fn build(self) -> ModelResult<Repository<P>> {
        let mut repository = Repository {
            events: EventEmitter::new(self.name.clone()),
            context: self.context,
            name: self.name,
            dataset: Collection::new(),
            query_params: self.query_params,
            loading: false,
            exists: false,
            last_error: None,
            method: None,
            page_info: None,
            total_count: None,
            fetch_one_query: self.fetch_one_query,
            fetch_many_query: self.fetch_many_query,
            many_shape: self.many_shape,
            factory: self.factory,
            method_override: self.method_override,
            subscriptions: self.subscriptions,
            handlers: self.handlers,
        };

        repository.dataset = match self.seed {
            Seed::Empty => Collection::new(),
            Seed::Values(values) => repository.from_array(values, true)?,
            Seed::Collection(collection) => collection,
        };

        repository.events.emit(event_names::CONSTRUCT, None);
        debug!(repository = %repository.name, seeded = repository.dataset.count(), "repository constructed");
        Ok(repository)
    }
}

/// Fetches and holds models of type `P`.
pub struct Repository<P: ModelProps> {
    context: Context,
    name: String,
    dataset: Collection<Model<P>>,
    query_params: Params,
    loading: bool,
    exists: bool,
    last_error: Option<ModelError>,
    method: Option<HttpMethod>,
    page_info: Option<PageInfo>,
    total_count: Option<u64>,
    fetch_one_query: Option<Target>,
    fetch_many_query: Option<Target>,
    many_shape: ResponseShape,
    factory: ModelFactory<P>,
    method_override: Option<MethodHook>,
    subscriptions: Vec<SubscriptionDescriptor>,
    handlers: HashMap<String, SubscriptionHandler>,
    events: EventEmitter,
}

impl<P: ModelProps> Repository<P> {
    pub fn builder(context: Context) -> RepositoryBuilder<P> {
        RepositoryBuilder::new(context)
    }

    // ── State ───────────────────────────────────────────────────

    pub fn dataset(&self) -> &Collection<Model<P>> {
        &self.dataset
    }

    pub fn into_dataset(self) -> Collection<Model<P>> {
        self.dataset
    }

    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    pub fn set_query_params(&mut self, params: Params) {
        self.query_params = params;
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Whether `many()` has succeeded at least once.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn last_error(&self) -> Option<&ModelError> {
        self.last_error.as_ref()
    }

    /// Method of the last query.
    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub fn page_info(&self) -> Option<&PageInfo> {
        self.page_info.as_ref()
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn subscriptions(&self) -> &[SubscriptionDescriptor] {
        &self.subscriptions
    }

    pub fn class_name(&self) -> &str {
        &self.name
    }

    pub fn display_class_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Subscribes to the repository's lifecycle events. A late `construct`
    /// subscriber still receives the construction event.
    pub fn on<F>(&mut self, kind: &str, callback: F, options: SubscribeOptions)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on(kind, callback, options);
    }

    // ── Hydration ───────────────────────────────────────────────

    /// Hydrates raw items through the model factory. With `skip_empty`,
    /// falsy items are dropped first.
    pub fn from_array(
        &self,
        values: Vec<Value>,
        skip_empty: bool,
    ) -> ModelResult<Collection<Model<P>>> {
        values
            .into_iter()
            .filter(|value| !skip_empty || is_truthy(value))
            .map(|value| self.factory.build(&self.context, value))
            .collect::<ModelResult<Vec<_>>>()
            .map(Collection::from)
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Fetches the collection and makes it the dataset.
    ///
    /// Without `params` the repository's default query params are sent.
    /// Fails with [`ModelError::InvalidArgument`] before touching any
    /// state when no fetch-many target is configured.
    pub async fn many(&mut self, params: Option<Params>) -> ModelResult<&Collection<Model<P>>> {
        let Some(target) = self.fetch_many_query.clone() else {
            return Err(ModelError::InvalidArgument(
                "fetch many query is not set for this repository".to_string(),
            ));
        };
        let params = params.unwrap_or_else(|| self.query_params.clone());
        let shape = match self.many_shape {
            ResponseShape::Raw => ResponseShape::Collection,
            shape => shape,
        };

        let output = self.query(&target, params, shape, None).await?;
        if let Some(collection) = output.into_collection() {
            self.dataset = collection;
        }
        self.exists = true;
        info!(repository = %self.name, count = self.dataset.count(), "fetched collection");
        Ok(&self.dataset)
    }

    /// Fetches one model by identifier.
    ///
    /// The identifier is sent as [`ModelProps::IDENTIFIER`], or as `uuid`
    /// in GraphQL mode and `id` in REST mode. A `null` response is not an
    /// error: it hydrates a model from the props type's defaults.
    pub async fn one(&mut self, id: impl Into<Value>) -> ModelResult<Model<P>> {
        let Some(target) = self.fetch_one_query.clone() else {
            return Err(ModelError::InvalidArgument(
                "fetch one query is not set for this repository".to_string(),
            ));
        };
        let key = P::IDENTIFIER.unwrap_or(if self.context.is_graphql() {
            UUID_KEY
        } else {
            ID_KEY
        });
        let mut params = Params::new();
        params.insert(key.to_string(), id.into());

        let data = self
            .query(&target, params, ResponseShape::Raw, None)
            .await?
            .into_raw()
            .unwrap_or(Value::Null);

        self.factory
            .build(&self.context, data)
            .map_err(|err| self.on_error(err))
    }

    /// Issues a query and shapes the response.
    ///
    /// `beforeQuery` is emitted before the request. On failure the error is
    /// recorded, `onError` is emitted and the classified error returned.
    /// `afterQuery` is emitted either way. `method` defaults to `get` for
    /// REST targets and `post` for GraphQL documents.
    pub async fn query(
        &mut self,
        target: &Target,
        mut params: Params,
        shape: ResponseShape,
        method: Option<HttpMethod>,
    ) -> ModelResult<QueryOutput<P>> {
        let operation = target.resolve(&mut params).await;
        let method = method.unwrap_or_else(|| default_method(RequestAction::Query, &operation));
        let method = match &operation {
            Operation::Url(_) => {
                let request =
                    RequestDescriptor::new(RequestAction::Query, &operation, &params, method);
                match &self.method_override {
                    Some(hook) => request.resolve_method(|r| hook(r)),
                    None => request.resolve_method(P::method_override),
                }
            }
            Operation::Document(_) => method,
        };
        self.method = Some(method);

        self.before_query();
        let result = match self.dispatch(&operation, params, method).await {
            Ok(data) => self.shape(data, shape),
            Err(err) => Err(err),
        };
        let result = result.map_err(|err| self.on_error(err));
        self.after_query();
        result
    }

    async fn dispatch(
        &self,
        operation: &Operation,
        params: Params,
        method: HttpMethod,
    ) -> ModelResult<Value> {
        match operation {
            Operation::Document(document) => {
                debug!(repository = %self.name, operation = document.name(), "dispatching query");
                let variables = into_params(strip_typename(Value::Object(params)));
                Ok(self.context.graphql()?.execute(document, variables).await?)
            }
            Operation::Url(url) => {
                debug!(repository = %self.name, %method, %url, "dispatching query");
                Ok(self.context.rest()?.request(url, params, method).await?)
            }
        }
    }

    fn shape(&mut self, data: Value, shape: ResponseShape) -> ModelResult<QueryOutput<P>> {
        match shape {
            ResponseShape::Raw => Ok(QueryOutput::Raw(data)),
            ResponseShape::Collection => {
                let items = expect_array(data)?;
                Ok(QueryOutput::Collection(self.from_array(items, true)?))
            }
            ResponseShape::Connection => {
                let connection = extract_connection(data)?;
                self.page_info = connection.page_info;
                self.total_count = connection.total_count;
                Ok(QueryOutput::Collection(
                    self.from_array(connection.items, true)?,
                ))
            }
        }
    }

    fn before_query(&mut self) {
        self.loading = true;
        self.events.emit(event_names::BEFORE_QUERY, None);
    }

    fn after_query(&mut self) {
        self.loading = false;
        self.events.emit(event_names::AFTER_QUERY, None);
    }

    /// Records the raw error, emits `onError` and returns the classified
    /// error.
    fn on_error(&mut self, err: ModelError) -> ModelError {
        warn!(repository = %self.name, error = %err, "repository query failed");
        self.last_error = Some(err.clone());
        self.events
            .emit(event_names::ON_ERROR, Some(json!({ "message": err.to_string() })));
        match err {
            ModelError::Transport(transport) => classify(transport),
            other => other,
        }
    }

    // ── Subscriptions ───────────────────────────────────────────

    /// Opens every configured subscription.
    ///
    /// Each subscription needs a handler registered under its operation
    /// name; a missing handler fails with [`ModelError::InvalidArgument`]
    /// before anything is opened.
    pub async fn subscribe_to_more(&mut self) -> ModelResult<SubscriptionFeed> {
        let mut plan = Vec::with_capacity(self.subscriptions.len());
        for descriptor in &self.subscriptions {
            let name = descriptor.handler_name();
            let handler = self.handlers.get(&name).cloned().ok_or_else(|| {
                ModelError::InvalidArgument(format!("{} has no {name} handler", self.name))
            })?;
            plan.push((descriptor.clone(), name, handler));
        }
        if plan.is_empty() {
            return Ok(SubscriptionFeed::new(Vec::new()));
        }

        let graphql = Arc::clone(self.context.graphql()?);
        let mut streams: Vec<BoxStream<'static, Delivery>> = Vec::with_capacity(plan.len());
        for (descriptor, name, handler) in plan {
            let variables = into_params(strip_typename(Value::Object(descriptor.variables)));
            let stream = match graphql.subscribe(&descriptor.document, variables).await {
                Ok(stream) => stream,
                Err(err) => return Err(self.on_error(err.into())),
            };
            debug!(repository = %self.name, handler = %name, "subscription opened");
            streams.push(
                stream
                    .map(move |item| (name.clone(), Arc::clone(&handler), item))
                    .boxed(),
            );
        }
        Ok(SubscriptionFeed::new(streams))
    }
}

impl<P: ModelProps> fmt::Debug for Repository<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("count", &self.dataset.count())
            .field("loading", &self.loading)
            .field("exists", &self.exists)
            .field("factory", &self.factory)
            .finish()
    }
}
