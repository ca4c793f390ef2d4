//! Response shaping.

use modelkit_model::{Collection, Model, ModelError, ModelProps, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a query response is turned into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseShape {
    /// Returned as received.
    Raw,
    /// An array of items, hydrated into a collection.
    #[default]
    Collection,
    /// A paginated connection: items under `nodes` or `edges[].node`, with
    /// `pageInfo` and `totalCount` alongside.
    Connection,
}

/// Pagination state of a connection response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Result of [`Repository::query`](crate::Repository::query).
pub enum QueryOutput<P: ModelProps> {
    Raw(Value),
    Collection(Collection<Model<P>>),
}

impl<P: ModelProps> QueryOutput<P> {
    pub fn into_raw(self) -> Option<Value> {
        match self {
            Self::Raw(value) => Some(value),
            Self::Collection(_) => None,
        }
    }

    pub fn into_collection(self) -> Option<Collection<Model<P>>> {
        match self {
            Self::Collection(collection) => Some(collection),
            Self::Raw(_) => None,
        }
    }
}

/// The items of a connection plus its pagination metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connection {
    pub items: Vec<Value>,
    pub page_info: Option<PageInfo>,
    pub total_count: Option<u64>,
}

/// Splits a connection response. A bare array is accepted as a connection
/// without metadata.
pub fn extract_connection(data: Value) -> ModelResult<Connection> {
    let mut map = match data {
        Value::Array(items) => {
            return Ok(Connection {
                items,
                ..Connection::default()
            });
        }
        Value::Null => return Ok(Connection::default()),
        Value::Object(map) => map,
        other => {
            return Err(ModelError::Serialization(format!(
                "expected a connection object, got {other}"
            )));
        }
    };

    let page_info = match map.shift_remove("pageInfo") {
        Some(Value::Null) | None => None,
        Some(value) => Some(serde_json::from_value(value)?),
    };
    let total_count = map.get("totalCount").and_then(Value::as_u64);

    let items = if let Some(Value::Array(nodes)) = map.shift_remove("nodes") {
        nodes
    } else if let Some(Value::Array(edges)) = map.shift_remove("edges") {
        edges
            .into_iter()
            .filter_map(|mut edge| edge.get_mut("node").map(Value::take))
            .collect()
    } else {
        Vec::new()
    };

    Ok(Connection {
        items,
        page_info,
        total_count,
    })
}

/// The items of a collection response. `null` is an empty collection.
pub fn expect_array(data: Value) -> ModelResult<Vec<Value>> {
    match data {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(ModelError::Serialization(format!(
            "expected an array response, got {other}"
        ))),
    }
}
