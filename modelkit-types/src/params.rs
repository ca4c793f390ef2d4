//! The parameter bag and its value helpers.
//!
//! Parameter bags keep insertion order (`serde_json` is built with
//! `preserve_order`), so query strings and variables come out in the order
//! the caller wrote them.

use convert_case::{Case, Casing};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// An ordered string-keyed bag of JSON values.
pub type Params = Map<String, Value>;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex is valid"));

/// Converts an object value into a bag. Any other value yields an empty bag.
pub fn into_params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Truthiness as understood by the backends this library talks to:
/// `null`, `false`, `0` and `""` are falsy, everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Whether a value is sent as a query-string parameter.
///
/// Truthy values are present, and so is numeric zero.
pub fn is_present(value: &Value) -> bool {
    is_truthy(value) || value.as_f64() == Some(0.0)
}

/// Renders a parameter value the way it appears inside a URL.
///
/// Strings are taken verbatim, arrays are joined with `,`, objects are
/// rendered as compact JSON.
pub fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(param_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// `pageSize` → `page-size`. Only a lower-case letter followed by an
/// upper-case letter is a boundary; the result is lower-cased.
pub fn camel_to_kebab(input: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(input, "$1-$2")
        .to_lowercase()
}

/// `UserProfile` → `userProfile`.
pub fn camel_case(input: &str) -> String {
    input.to_case(Case::Camel)
}
