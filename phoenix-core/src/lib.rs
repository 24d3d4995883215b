/*!
# Phoenix Core

Persistence and rehydration for reducer-driven state stores.

A store built around a reducer keeps its whole application state in one JSON
tree. This crate saves a filtered, transformed copy of that tree to a
key-value storage backend after every change and restores it when the store is
created again:

- [`persist_store`] loads the saved envelope, discards it when expired, runs
  pending migrations, filters it and dispatches it as a [`REHYDRATE`] action,
  then keeps storage in sync with the store
- [`auto_rehydrate`] wraps a store creator so its reducer deep-merges
  [`REHYDRATE`] payloads into the current state
- [`TransformMap`] rewrites the state before it is saved
- [`Migration`]s evolve persisted data between application versions

## Architecture

Storage backends and codecs are pluggable adapters behind the
[`AsyncStorageAdapter`] and [`Codec`] traits. Synchronous backends such as
[`LocalFileStorage`] and [`MemoryStorage`] implement [`StorageAdapter`] and
are lifted with [`ImmediateStorage`].

## Usage

```rust
use std::sync::Arc;
use phoenix_core::{
    auto_rehydrate, persist_store, Action, ImmediateStorage, MemoryStorage, MemoryStore,
    PersistConfig, Preloaded, Reducer, Store,
};
use serde_json::{json, Value};

# #[tokio::main(flavor = "current_thread")]
# async fn main() -> phoenix_core::Result<()> {
let storage = MemoryStorage::with_item("app", r#"{"persistedState":{"theme":"dark"}}"#);
let create = auto_rehydrate(|reducer, preloaded, _enhancer: Option<()>| {
    MemoryStore::new(reducer, preloaded)
});
let reducer: Reducer = Arc::new(|state: Option<Value>, _action: &Action| {
    state.unwrap_or_else(|| json!({}))
});
let store = Arc::new(create(
    reducer,
    Some(Preloaded::State(json!({"theme": "light", "lang": "en"}))),
    None,
));

let config = PersistConfig::new(ImmediateStorage::new(storage)).with_key("app");
let store = persist_store(store, config).await?;
assert_eq!(store.get_state(), json!({"theme": "dark", "lang": "en"}));
# Ok(())
# }
```
*/

pub mod codec;
pub mod config;
pub mod enhancer;
pub mod envelope;
pub mod error;
pub mod migration;
pub mod observability;
pub mod path;
pub mod persist;
pub mod storage;
pub mod store;
pub mod throttle;
pub mod transform;


pub use codec::{Codec, FnCodec, JsonCodec};
pub use config::{Clock, PersistConfig, PersistOptions, DEFAULT_KEY};
pub use enhancer::{auto_rehydrate, rehydrate_reducer, Preloaded};
pub use envelope::{ExpireAfter, PersistedEnvelope, TimeUnit};
pub use error::{PhoenixError, Result};
pub use migration::{
    applied_ledger, migrations_to_run, run_migrations, Direction, Migration, MigrationStep,
};
#[cfg(feature = "metrics")]
pub use observability::PhoenixMetrics;
pub use observability::{init_default_observability, init_observability};
pub use persist::{filter_state, persist_store};
pub use storage::{
    AsyncStorageAdapter, ImmediateStorage, LocalFileStorage, MemoryStorage, StorageAdapter,
};
pub use store::{Action, Listener, MemoryStore, Reducer, Store, REHYDRATE};
pub use transform::{transform, Derived, TransformMap};
