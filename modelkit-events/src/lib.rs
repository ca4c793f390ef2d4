//! Publish/subscribe with fired-event memory.
//!
//! Every model and repository owns an [`EventEmitter`]. Emission is
//! synchronous: subscribers run on the caller's stack, in registration
//! order, before `emit` returns.
//!
//! The emitter remembers the last event of each type. A subscriber that
//! registers after that type has already fired receives the remembered
//! event immediately (once), and stays registered for later emissions.
//! This lets late observers of a repository still see its `construct`
//! event.

use modelkit_types::Event;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Subscriber callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Options accepted by [`EventEmitter::on`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Stored on the subscriber. Replay is driven solely by the fired
    /// history, so this flag currently changes nothing.
    pub immediate: bool,
}

struct Subscriber {
    callback: Listener,
    immediate: bool,
    fired: bool,
}

/// Synchronous event emitter with last-event replay.
pub struct EventEmitter {
    target: String,
    listeners: HashMap<String, Vec<Subscriber>>,
    fired: HashMap<String, Event>,
}

impl EventEmitter {
    /// Creates an emitter whose events carry `target` as their origin.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            listeners: HashMap::new(),
            fired: HashMap::new(),
        }
    }

    /// Name stamped on every emitted event.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Emits an event to every subscriber registered for `kind`.
    ///
    /// Delivery runs over a snapshot of the subscriber list. Returns whether
    /// any subscriber existed for that type. A panicking subscriber
    /// propagates to the caller and later subscribers are skipped.
    pub fn emit(&mut self, kind: &str, payload: Option<Value>) -> bool {
        let event = Event::new(kind, self.target.clone(), payload);
        self.fired.insert(kind.to_string(), event.clone());

        let Some(subscribers) = self.listeners.get_mut(kind) else {
            trace!(target_name = %self.target, kind, "event emitted without subscribers");
            return false;
        };
        if subscribers.is_empty() {
            return false;
        }

        let snapshot: Vec<Listener> = subscribers
            .iter_mut()
            .map(|subscriber| {
                subscriber.fired = true;
                Arc::clone(&subscriber.callback)
            })
            .collect();

        trace!(target_name = %self.target, kind, subscribers = snapshot.len(), "dispatching event");
        for callback in snapshot {
            callback(&event);
        }
        true
    }

    /// Registers a subscriber for `kind`.
    ///
    /// If an event of this type already fired, `callback` is invoked right
    /// away with the last one.
    pub fn on<F>(&mut self, kind: &str, callback: F, options: SubscribeOptions)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let callback: Listener = Arc::new(callback);
        self.listeners
            .entry(kind.to_string())
            .or_default()
            .push(Subscriber {
                callback: Arc::clone(&callback),
                immediate: options.immediate,
                fired: false,
            });

        if let Some(last) = self.fired.get(kind) {
            callback(last);
        }
    }

    /// Removes every subscriber of `kind`, returning how many were removed.
    pub fn off(&mut self, kind: &str) -> usize {
        self.listeners.remove(kind).map_or(0, |subs| subs.len())
    }

    /// Number of subscribers registered for `kind`.
    pub fn listener_count(&self, kind: &str) -> usize {
        self.listeners.get(kind).map_or(0, Vec::len)
    }

    /// Number of subscribers for `kind` flagged `immediate`.
    pub fn immediate_count(&self, kind: &str) -> usize {
        self.listeners
            .get(kind)
            .map_or(0, |subs| subs.iter().filter(|s| s.immediate).count())
    }

    /// Number of subscribers for `kind` that have received at least one emission.
    pub fn delivered_count(&self, kind: &str) -> usize {
        self.listeners
            .get(kind)
            .map_or(0, |subs| subs.iter().filter(|s| s.fired).count())
    }

    /// The last event of `kind`, if one fired.
    pub fn last_event(&self, kind: &str) -> Option<&Event> {
        self.fired.get(kind)
    }

    /// Whether an event of `kind` fired at least once.
    pub fn has_fired(&self, kind: &str) -> bool {
        self.fired.contains_key(kind)
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("target", &self.target)
            .field("listener_types", &self.listeners.keys().collect::<Vec<_>>())
            .field("fired", &self.fired.keys().collect::<Vec<_>>())
            .finish()
    }
}
