/*!
The store contract consumed by the orchestrator, plus a small in-memory store.

A store holds a state tree, runs dispatched [`Action`]s through a reducer and
notifies subscribed listeners after every dispatch.
*/

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// Action type dispatched with the persisted state once it has been loaded.
pub const REHYDRATE: &str = "@@REHYDRATE";

/// Action type the in-memory store initialises its reducer with.
pub const INIT: &str = "@@INIT";

/// A dispatched action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Action {
    pub fn new<S: Into<String>>(action_type: S) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// The rehydration action carrying `payload`
    pub fn rehydrate(payload: Value) -> Self {
        Self::new(REHYDRATE).with_payload(payload)
    }

    pub fn is_rehydrate(&self) -> bool {
        self.action_type == REHYDRATE
    }
}

/// Change notification callback
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Reducer: `(current state, action) -> next state`. The state is `None` only
/// while the store is being initialised without a preloaded state.
pub type Reducer = Arc<dyn Fn(Option<Value>, &Action) -> Value + Send + Sync>;

/// Store abstraction the orchestrator persists and rehydrates
#[cfg_attr(test, mockall::automock)]
pub trait Store: Send + Sync {
    /// Run `action` through the reducer and notify listeners
    fn dispatch(&self, action: Action);

    /// Register a listener called after every dispatch
    fn subscribe(&self, listener: Listener);

    /// Snapshot of the current state
    fn get_state(&self) -> Value;
}

impl<T: Store + ?Sized> Store for Arc<T> {
    fn dispatch(&self, action: Action) {
        (**self).dispatch(action)
    }

    fn subscribe(&self, listener: Listener) {
        (**self).subscribe(listener)
    }

    fn get_state(&self) -> Value {
        (**self).get_state()
    }
}

/// Minimal thread-safe store
///
/// Listeners are invoked after the state lock is released, so they may read
/// the state or dispatch further actions.
pub struct MemoryStore {
    reducer: Reducer,
    state: Mutex<Value>,
    listeners: Mutex<Vec<Listener>>,
}

impl MemoryStore {
    /// Build a store, running the reducer once with [`INIT`] to compute the
    /// initial state from `preloaded`.
    pub fn new(reducer: Reducer, preloaded: Option<Value>) -> Self {
        let state = reducer(preloaded, &Action::new(INIT));
        Self {
            reducer,
            state: Mutex::new(state),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Build a store from a reducer closure
    pub fn from_fn<F>(reducer: F, preloaded: Option<Value>) -> Self
    where
        F: Fn(Option<Value>, &Action) -> Value + Send + Sync + 'static,
    {
        Self::new(Arc::new(reducer), preloaded)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("state", &self.get_state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Store for MemoryStore {
    fn dispatch(&self, action: Action) {
        trace!(action = %action.action_type, "Dispatching action");
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let current = std::mem::take(&mut *state);
            *state = (self.reducer)(Some(current), &action);
        }

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener();
        }
    }

    fn subscribe(&self, listener: Listener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn get_state(&self) -> Value {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
