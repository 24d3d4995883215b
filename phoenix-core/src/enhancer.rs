/*!
Store-creation wrapper that teaches a reducer to absorb [`REHYDRATE`] actions.

[`auto_rehydrate`] wraps a store creator. The reducer it hands down deep-merges
the payload of a rehydration action onto the current state before delegating
to the original reducer, so persisted data lands on top of whatever initial
state the store was built with. It works with or without
[`persist_store`](crate::persist_store); the orchestrator's own dispatch is
just one source of rehydration actions.
*/

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::path;
use crate::store::{Action, Reducer, REHYDRATE};

/// The second store-creation argument: either a preloaded state or, when the
/// caller skips the preloaded state, the enhancer itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Preloaded<E> {
    State(Value),
    Enhancer(E),
}

/// Wrap `reducer` so [`REHYDRATE`] payloads are merged into the state first.
pub fn rehydrate_reducer(reducer: Reducer) -> Reducer {
    Arc::new(move |state: Option<Value>, action: &Action| {
        if action.action_type == REHYDRATE {
            let merged = path::merged(state.as_ref(), action.payload.as_ref());
            reducer(Some(merged), action)
        } else {
            reducer(state, action)
        }
    })
}

/// Resolve the `(preloaded, enhancer)` pair a store creator actually receives.
///
/// An enhancer passed in the preloaded position with no explicit enhancer is
/// moved into the enhancer position.
pub fn normalize_args<E>(
    preloaded: Option<Preloaded<E>>,
    enhancer: Option<E>,
) -> (Option<Value>, Option<E>) {
    match (preloaded, enhancer) {
        (Some(Preloaded::State(state)), enhancer) => (Some(state), enhancer),
        (Some(Preloaded::Enhancer(positional)), None) => (None, Some(positional)),
        (Some(Preloaded::Enhancer(_)), Some(explicit)) => {
            warn!("Two enhancers passed to store creation; keeping the explicit one");
            (None, Some(explicit))
        }
        (None, enhancer) => (None, enhancer),
    }
}

/// Wrap the store creator `next`.
///
/// # Example
/// ```rust
/// use phoenix_core::{auto_rehydrate, Action, MemoryStore, Preloaded, Reducer, Store};
/// use serde_json::{json, Value};
/// use std::sync::Arc;
///
/// let create = auto_rehydrate(|reducer, preloaded, _enhancer: Option<()>| {
///     MemoryStore::new(reducer, preloaded)
/// });
/// let reducer: Reducer =
///     Arc::new(|state: Option<Value>, _action: &Action| state.unwrap_or_else(|| json!({})));
/// let store = create(
///     reducer,
///     Some(Preloaded::State(json!({"theme": "light", "lang": "en"}))),
///     None,
/// );
/// store.dispatch(Action::rehydrate(json!({"theme": "dark"})));
/// assert_eq!(store.get_state(), json!({"theme": "dark", "lang": "en"}));
/// ```
pub fn auto_rehydrate<S, E, N>(next: N) -> impl Fn(Reducer, Option<Preloaded<E>>, Option<E>) -> S
where
    N: Fn(Reducer, Option<Value>, Option<E>) -> S,
{
    move |reducer, preloaded, enhancer| {
        let (preloaded, enhancer) = normalize_args(preloaded, enhancer);
        next(rehydrate_reducer(reducer), preloaded, enhancer)
    }
}
