//! Typed models.
//!
//! A [`Model`] wraps a plain properties struct with identity, lifecycle
//! flags, an event emitter and the [`Context`] it talks to the backend
//! through. The properties struct describes itself through [`ModelProps`]:
//! its backend type name, which fields are submittable and where its
//! mutations go.

use crate::collection::Collection;
use crate::context::Context;
use crate::error::{ModelError, ModelResult};
use futures::future::{BoxFuture, FutureExt};
use modelkit_events::{EventEmitter, SubscribeOptions};
use modelkit_transport::{
    strip_typename, Operation, RequestAction, RequestDescriptor, SchemaProvider, Target,
};
use modelkit_types::{camel_case, event_names, into_params, is_truthy, Event, HttpMethod, Params};
use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};
use uuid::Uuid;

/// Key the per-instance identity is serialized under.
pub const UUID_KEY: &str = "uuid";
/// Key carrying the backend type name in GraphQL payloads.
pub const TYPENAME_KEY: &str = "__typename";
/// Key of the REST identifier.
pub const ID_KEY: &str = "id";
const LOADING_KEY: &str = "loading";

/// Describes a properties struct to the model layer.
///
/// Only [`TYPE_NAME`](Self::TYPE_NAME) is required.
pub trait ModelProps: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Backend type name, e.g. `"User"`. The GraphQL input type is this
    /// name suffixed with `Input`.
    const TYPE_NAME: &'static str;

    /// Parameter name a repository's `one(id)` sends the identifier under.
    /// `None` means `uuid` in GraphQL mode and `id` in REST mode.
    const IDENTIFIER: Option<&'static str> = None;

    /// Fields sent by REST mutations when no explicit params are given.
    /// Empty means nothing is submitted.
    fn submittable_props() -> &'static [&'static str] {
        &[]
    }

    fn create_mutation() -> Option<Target> {
        None
    }

    fn update_mutation() -> Option<Target> {
        None
    }

    fn delete_mutation() -> Option<Target> {
        None
    }

    /// Overrides the HTTP method of a REST request.
    fn method_override(_request: &RequestDescriptor<'_>) -> Option<HttpMethod> {
        None
    }
}

/// A properties struct with identity, lifecycle state and backend access.
pub struct Model<P: ModelProps> {
    props: P,
    uuid: String,
    typename: Option<String>,
    exists: bool,
    loading: bool,
    last_error: Option<ModelError>,
    events: EventEmitter,
    context: Context,
}

impl<P: ModelProps> Model<P> {
    /// Wraps `props`. The model exists if the props carry a truthy `id`.
    pub fn new(context: Context, props: P) -> Self {
        let mut model = Self {
            props,
            uuid: Uuid::new_v4().to_string(),
            typename: None,
            exists: false,
            loading: false,
            last_error: None,
            events: EventEmitter::new(P::TYPE_NAME),
            context,
        };
        model.exists = model.id().is_some();
        model
    }

    /// A model built from the props type's defaults.
    pub fn with_defaults(context: Context) -> Self
    where
        P: Default,
    {
        Self::new(context, P::default())
    }

    /// Builds a model from server data. Hydrated models always exist.
    ///
    /// `uuid` and `__typename` are taken from the data when present.
    pub fn hydrate(context: Context, data: Value) -> ModelResult<Self> {
        Self::hydrate_with(context, data, |data| Ok(serde_json::from_value(data)?))
    }

    /// Like [`Self::hydrate`], with `build` turning the data into props.
    ///
    /// A `null` payload, such as an empty `201`/`204` body, is hydrated as
    /// an empty object, so props with serde defaults build their defaults.
    pub fn hydrate_with<F>(context: Context, data: Value, build: F) -> ModelResult<Self>
    where
        F: FnOnce(Value) -> ModelResult<P>,
    {
        let data = match data {
            Value::Null => Value::Object(Params::new()),
            data => data,
        };
        let uuid = data
            .get(UUID_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);
        let typename = data
            .get(TYPENAME_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);
        let props = build(data)?;

        let mut model = Self::new(context, props);
        if let Some(uuid) = uuid {
            model.uuid = uuid;
        }
        model.typename = typename;
        model.exists = true;
        debug!(model = P::TYPE_NAME, uuid = %model.uuid, "hydrated model");
        Ok(model)
    }

    pub fn props(&self) -> &P {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut P {
        &mut self.props
    }

    pub fn into_props(self) -> P {
        self.props
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn typename(&self) -> Option<&str> {
        self.typename.as_deref()
    }

    /// The `id` property, if set to a truthy value.
    pub fn id(&self) -> Option<Value> {
        serde_json::to_value(&self.props)
            .ok()
            .and_then(|mut value| value.get_mut(ID_KEY).map(Value::take))
            .filter(is_truthy)
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn mark_exists(&mut self) {
        self.exists = true;
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&ModelError> {
        self.last_error.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn class_name(&self) -> &'static str {
        P::TYPE_NAME
    }

    pub fn display_class_name(&self) -> String {
        P::TYPE_NAME.to_lowercase()
    }

    /// Subscribes to this instance's lifecycle events.
    pub fn on<F>(&mut self, kind: &str, callback: F, options: SubscribeOptions)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on(kind, callback, options);
    }

    // ── Projections ─────────────────────────────────────────────

    /// The serialized props plus `uuid` and `__typename`.
    ///
    /// A `uuid` field on the props themselves takes precedence over the
    /// generated one.
    pub fn to_props(&self) -> ModelResult<Params> {
        let mut map = match serde_json::to_value(&self.props)? {
            Value::Object(map) => map,
            other => {
                return Err(ModelError::Serialization(format!(
                    "{} props must serialize to an object, got {other}",
                    P::TYPE_NAME
                )));
            }
        };
        if !map.contains_key(UUID_KEY) {
            map.insert(UUID_KEY.to_string(), Value::String(self.uuid.clone()));
        }
        if let Some(typename) = &self.typename {
            map.insert(TYPENAME_KEY.to_string(), Value::String(typename.clone()));
        }
        Ok(map)
    }

    /// Property values in declaration order, optionally without falsy ones.
    pub fn to_collection(&self, skip_empty: bool) -> ModelResult<Collection<Value>> {
        let values = self.to_props()?.into_iter().map(|(_, v)| v).collect();
        Ok(Collection::from_values(values, skip_empty))
    }

    pub fn to_array(&self, skip_empty: bool) -> ModelResult<Vec<Value>> {
        Ok(self.to_collection(skip_empty)?.into_vec())
    }

    /// The allow-listed properties.
    ///
    /// Only `null` values are removed; `false`, `0` and `""` are submitted
    /// as they are. `props` overrides [`ModelProps::submittable_props`]. An
    /// empty allow-list yields an empty map.
    pub fn to_submittable(&self, props: Option<&[&str]>) -> ModelResult<Params> {
        let allow: &[&str] = props.unwrap_or(P::submittable_props());
        if allow.is_empty() {
            return Ok(Params::new());
        }
        Ok(self
            .to_props()?
            .into_iter()
            .filter(|(key, value)| allow.contains(&key.as_str()) && !value.is_null())
            .collect())
    }

    /// Projects the model onto the fields of its `<TypeName>Input` schema
    /// type.
    ///
    /// Nested objects carrying a `__typename` are projected onto their own
    /// input types, recursively. `__typename` and `loading` never appear in
    /// the result.
    pub async fn update_variables(&self) -> ModelResult<Params> {
        let schema = self.context.schema()?;
        let input_type = format!("{}Input", P::TYPE_NAME);
        let fields = schema
            .input_field_names(&input_type)
            .await?
            .ok_or_else(|| ModelError::Unexpected(format!("schema has no type {input_type}")))?;

        let mut variables = Params::new();
        for (key, value) in self.to_props()? {
            if key == LOADING_KEY || !fields.contains(&key) {
                continue;
            }
            let value = project_nested(&**schema, value).await?;
            variables.insert(key, value);
        }
        let variables = strip_typename(Value::Object(variables));
        Ok(into_params(strip_loading(variables)))
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Sends a mutation and returns the raw response.
    ///
    /// `afterMutate` runs whether or not the request succeeds. On success
    /// the model is marked as existing; on failure the error is recorded,
    /// `onError` is emitted and the error is returned.
    pub async fn mutate(
        &mut self,
        target: &Target,
        mut params: Params,
        method: HttpMethod,
    ) -> ModelResult<Value> {
        let operation = target.resolve(&mut params).await;

        self.before_mutate();
        let result = self.dispatch(operation, params, method).await;
        self.after_mutate();

        match result {
            Ok(data) => {
                self.mark_exists();
                Ok(data)
            }
            Err(err) => Err(self.on_error(err)),
        }
    }

    /// Creates the model on the backend and returns the stored version.
    ///
    /// Without explicit `params`, GraphQL mode sends the update variables and
    /// REST mode sends the submittable props. In GraphQL mode the params are
    /// wrapped under the camel-cased type name.
    pub async fn create(
        &mut self,
        params: Option<Params>,
        target: Option<Target>,
    ) -> ModelResult<Model<P>> {
        let target = target.or_else(P::create_mutation).ok_or_else(|| {
            ModelError::InvalidArgument(format!("create mutation is not set for {}", P::TYPE_NAME))
        })?;
        self.save(target, params).await
    }

    /// Updates the model on the backend and returns the stored version.
    ///
    /// Parameters are resolved the same way as for [`Self::create`].
    pub async fn update(
        &mut self,
        params: Option<Params>,
        target: Option<Target>,
    ) -> ModelResult<Model<P>> {
        let target = target.or_else(P::update_mutation).ok_or_else(|| {
            ModelError::InvalidArgument(format!("update mutation is not set for {}", P::TYPE_NAME))
        })?;
        self.save(target, params).await
    }

    /// Deletes the model on the backend.
    ///
    /// Params default to `{uuid}` in GraphQL mode and `{id}` in REST mode,
    /// where the request uses `delete`. The response is returned unchanged.
    pub async fn delete(
        &mut self,
        target: Option<Target>,
        params: Option<Params>,
    ) -> ModelResult<Value> {
        let target = target.or_else(P::delete_mutation).ok_or_else(|| {
            ModelError::InvalidArgument(format!("delete mutation is not set for {}", P::TYPE_NAME))
        })?;

        let graphql = self.context.is_graphql();
        let params = params.unwrap_or_else(|| {
            let mut params = Params::new();
            if graphql {
                params.insert(UUID_KEY.to_string(), Value::String(self.uuid.clone()));
            } else {
                params.insert(ID_KEY.to_string(), self.id().unwrap_or(Value::Null));
            }
            params
        });
        let method = if graphql {
            HttpMethod::Post
        } else {
            HttpMethod::Delete
        };

        let data = self.mutate(&target, params, method).await?;
        self.exists = false;
        Ok(data)
    }

    async fn save(&mut self, target: Target, params: Option<Params>) -> ModelResult<Model<P>> {
        let params = match self.mutation_params(params).await {
            Ok(params) => params,
            Err(err) => return Err(self.on_error(err)),
        };
        let data = self.mutate(&target, params, HttpMethod::Post).await?;
        Model::hydrate(self.context.clone(), data).map_err(|err| self.on_error(err))
    }

    async fn mutation_params(&self, params: Option<Params>) -> ModelResult<Params> {
        if !self.context.is_graphql() {
            return match params {
                Some(params) => Ok(params),
                None => self.to_submittable(None),
            };
        }

        let inner = match params {
            Some(params) => params,
            None => self.update_variables().await?,
        };
        let mut wrapped = Params::new();
        wrapped.insert(camel_case(P::TYPE_NAME), Value::Object(inner));
        Ok(wrapped)
    }

    async fn dispatch(
        &self,
        operation: Operation,
        params: Params,
        method: HttpMethod,
    ) -> ModelResult<Value> {
        match &operation {
            Operation::Document(document) => {
                debug!(model = P::TYPE_NAME, operation = document.name(), "dispatching mutation");
                let variables = into_params(strip_typename(Value::Object(params)));
                Ok(self.context.graphql()?.execute(document, variables).await?)
            }
            Operation::Url(url) => {
                let method =
                    RequestDescriptor::new(RequestAction::Mutation, &operation, &params, method)
                        .resolve_method(P::method_override);
                debug!(model = P::TYPE_NAME, %method, %url, "dispatching mutation");
                Ok(self.context.rest()?.request(url, params, method).await?)
            }
        }
    }

    fn before_mutate(&mut self) {
        self.loading = true;
        self.events.emit(event_names::BEFORE_MUTATE, None);
    }

    fn after_mutate(&mut self) {
        self.loading = false;
        self.events.emit(event_names::AFTER_MUTATE, None);
    }

    fn on_error(&mut self, err: ModelError) -> ModelError {
        warn!(model = P::TYPE_NAME, error = %err, "model operation failed");
        self.last_error = Some(err.clone());
        self.events
            .emit(event_names::ON_ERROR, Some(json!({ "message": err.to_string() })));
        err
    }
}

/// Removes `loading` at every depth.
fn strip_loading(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != LOADING_KEY)
                .map(|(key, value)| (key, strip_loading(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_loading).collect()),
        other => other,
    }
}

fn project_nested(schema: &dyn SchemaProvider, value: Value) -> BoxFuture<'_, ModelResult<Value>> {
    async move {
        match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(project_nested(schema, item).await?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let Some(typename) = map.get(TYPENAME_KEY).and_then(Value::as_str) else {
                    return Ok(Value::Object(map));
                };
                let input_type = format!("{typename}Input");
                let Some(fields) = schema.input_field_names(&input_type).await? else {
                    return Ok(Value::Object(map));
                };
                let mut out = Params::new();
                for (key, value) in map {
                    if key == LOADING_KEY || !fields.contains(&key) {
                        continue;
                    }
                    out.insert(key, project_nested(schema, value).await?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        }
    }
    .boxed()
}

impl<P: ModelProps> Deref for Model<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.props
    }
}

impl<P: ModelProps> DerefMut for Model<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.props
    }
}

/// Deep copy treated as new: `exists` is reset, subscribers are not
/// carried over, the uuid is kept.
impl<P: ModelProps> Clone for Model<P> {
    fn clone(&self) -> Self {
        Self {
            props: self.props.clone(),
            uuid: self.uuid.clone(),
            typename: self.typename.clone(),
            exists: false,
            loading: false,
            last_error: self.last_error.clone(),
            events: EventEmitter::new(P::TYPE_NAME),
            context: self.context.clone(),
        }
    }
}

impl<P: ModelProps> Serialize for Model<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_props()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<P: ModelProps + fmt::Debug> fmt::Debug for Model<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("type", &P::TYPE_NAME)
            .field("props", &self.props)
            .field("uuid", &self.uuid)
            .field("exists", &self.exists)
            .field("loading", &self.loading)
            .finish()
    }
}
