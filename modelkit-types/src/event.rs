//! Lifecycle event records.
//!
//! Models and repositories broadcast their lifecycle through events. An
//! event carries its type, the name of the emitter that produced it and an
//! optional JSON payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known event types emitted by models and repositories.
pub mod event_names {
    /// A repository finished construction.
    pub const CONSTRUCT: &str = "construct";
    /// A repository query is about to be dispatched.
    pub const BEFORE_QUERY: &str = "beforeQuery";
    /// A repository query settled (success or failure).
    pub const AFTER_QUERY: &str = "afterQuery";
    /// A model mutation is about to be dispatched.
    pub const BEFORE_MUTATE: &str = "beforeMutate";
    /// A model mutation settled (success or failure).
    pub const AFTER_MUTATE: &str = "afterMutate";
    /// A transport or classification error was recorded.
    pub const ON_ERROR: &str = "onError";
}

/// A single emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event type (e.g. `"afterQuery"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Name of the emitter that produced the event.
    pub target: String,
    /// Optional data attached by the emitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(kind: impl Into<String>, target: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            payload,
        }
    }

    /// Returns true if the event is of the given type.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}
