/*!
End-to-end tests for persisting and rehydrating stores.
These tests drive real in-memory stores through several simulated sessions
against shared storage backends.
*/

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use phoenix_core::{
    auto_rehydrate, persist_store, Action, ExpireAfter, ImmediateStorage, LocalFileStorage,
    MemoryStorage, MemoryStore, Migration, PersistConfig, Preloaded, Reducer, Result,
    StorageAdapter, Store, TimeUnit, TransformMap,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const NOW_MS: i64 = 1_700_000_000_000;

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(NOW_MS).unwrap()
}

fn initial_state() -> Value {
    json!({"todos": [], "session": {"token": null}})
}

fn todo_reducer(state: Option<Value>, action: &Action) -> Value {
    let mut state = state.unwrap_or_else(initial_state);
    if action.action_type == "ADD_TODO" {
        if let (Some(todos), Some(todo)) = (state["todos"].as_array_mut(), action.payload.clone()) {
            todos.push(todo);
        }
    }
    state
}

fn add_todo(title: &str) -> Action {
    Action::new("ADD_TODO").with_payload(json!({"title": title}))
}

/// Build a fresh store the way an application would at startup.
fn new_store() -> Arc<MemoryStore> {
    let create = auto_rehydrate(|reducer, preloaded, _enhancer: Option<()>| {
        MemoryStore::new(reducer, preloaded)
    });
    let reducer: Reducer = Arc::new(todo_reducer);
    Arc::new(create(reducer, Some(Preloaded::State(initial_state())), None))
}

/// Let spawned save tasks reach storage.
async fn flush() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn stored(storage: &impl StorageAdapter, key: &str) -> Value {
    let raw = storage.get_item(key).unwrap().expect("envelope saved");
    serde_json::from_str(&raw).unwrap()
}

/// Memory storage that counts writes.
#[derive(Default)]
struct CountingStorage {
    inner: MemoryStorage,
    writes: AtomicUsize,
}

impl StorageAdapter for CountingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_item(key, value)
    }
}

#[tokio::test(start_paused = true)]
async fn test_complete_session_lifecycle() {
    let storage = Arc::new(MemoryStorage::new());
    let config = || {
        PersistConfig::new(ImmediateStorage::shared(Arc::clone(&storage)))
            .with_blacklist(["session"])
            .with_clock(fixed_now)
    };

    // Session 1: nothing saved yet
    let store = persist_store(new_store(), config()).await.unwrap();
    assert_eq!(store.get_state(), initial_state());

    store.dispatch(add_todo("write tests"));
    store.dispatch(Action::new("LOGIN").with_payload(json!({"token": "secret"})));
    store.dispatch(add_todo("ship it"));
    flush().await;

    assert_eq!(
        stored(storage.as_ref(), "redux"),
        json!({
            "persistedState": {
                "todos": [{"title": "write tests"}, {"title": "ship it"}]
            },
            "saveDate": NOW_MS
        })
    );

    // Session 2: a fresh store picks up where the first left off
    let restored = persist_store(new_store(), config()).await.unwrap();
    assert_eq!(
        restored.get_state(),
        json!({
            "todos": [{"title": "write tests"}, {"title": "ship it"}],
            "session": {"token": null}
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_default_config_merges_saved_state_over_preloaded() {
    let storage = MemoryStorage::with_item("redux", r#"{"persistedState":{"theme":"dark"}}"#);
    let create = auto_rehydrate(|reducer, preloaded, _enhancer: Option<()>| {
        MemoryStore::new(reducer, preloaded)
    });
    let reducer: Reducer =
        Arc::new(|state: Option<Value>, _action: &Action| state.unwrap_or_else(|| json!({})));
    let store = Arc::new(create(
        reducer,
        Some(Preloaded::State(json!({"lang": "en"}))),
        None,
    ));

    let store = persist_store(store, PersistConfig::new(ImmediateStorage::new(storage)))
        .await
        .unwrap();

    assert_eq!(store.get_state(), json!({"lang": "en", "theme": "dark"}));
}

#[tokio::test(start_paused = true)]
async fn test_file_storage_keeps_old_state_without_expiry() {
    let temp_dir = TempDir::new().unwrap();
    let files = Arc::new(LocalFileStorage::with_base_dir(temp_dir.path()));
    files
        .set_item(
            "todos",
            &json!({
                "persistedState": {"todos": [{"title": "stale"}]},
                "saveDate": NOW_MS - 7 * 24 * 60 * 60 * 1000
            })
            .to_string(),
        )
        .unwrap();

    let config = PersistConfig::new(ImmediateStorage::shared(files))
        .with_key("todos")
        .with_clock(fixed_now);
    let store = persist_store(new_store(), config).await.unwrap();

    assert_eq!(store.get_state()["todos"], json!([{"title": "stale"}]));
}

#[tokio::test(start_paused = true)]
async fn test_file_storage_discards_expired_state() {
    let temp_dir = TempDir::new().unwrap();
    let files = Arc::new(LocalFileStorage::with_base_dir(temp_dir.path()));
    let week_old = NOW_MS - 7 * 24 * 60 * 60 * 1000;
    files
        .set_item(
            "todos",
            &json!({
                "persistedState": {"todos": [{"title": "stale"}]},
                "saveDate": week_old
            })
            .to_string(),
        )
        .unwrap();

    let config = PersistConfig::new(ImmediateStorage::shared(Arc::clone(&files)))
        .with_key("todos")
        .with_expire_date(ExpireAfter::new(1, TimeUnit::Days))
        .with_clock(fixed_now);
    let store = persist_store(new_store(), config).await.unwrap();
    assert_eq!(store.get_state(), initial_state());

    store.dispatch(add_todo("fresh"));
    flush().await;

    assert!(temp_dir.path().join("todos.json").exists());
    let envelope = stored(files.as_ref(), "todos");
    assert_eq!(envelope["saveDate"], json!(NOW_MS));
    assert_eq!(envelope["persistedState"]["todos"], json!([{"title": "fresh"}]));
}

#[tokio::test(start_paused = true)]
async fn test_file_storage_restores_fresh_state() {
    let temp_dir = TempDir::new().unwrap();
    let files = Arc::new(LocalFileStorage::with_base_dir(temp_dir.path()));
    files
        .set_item(
            "todos",
            &json!({
                "persistedState": {"todos": [{"title": "recent"}]},
                "saveDate": NOW_MS - 60 * 60 * 1000
            })
            .to_string(),
        )
        .unwrap();

    let config = PersistConfig::new(ImmediateStorage::shared(files))
        .with_key("todos")
        .with_expire_date("1 day".parse().unwrap())
        .with_clock(fixed_now);
    let store = persist_store(new_store(), config).await.unwrap();

    assert_eq!(store.get_state()["todos"], json!([{"title": "recent"}]));
}

#[tokio::test(start_paused = true)]
async fn test_migrations_run_once_across_sessions() {
    let storage = Arc::new(MemoryStorage::with_item(
        "redux",
        json!({"persistedState": {"todos": [{"title": "legacy"}]}, "saveDate": NOW_MS}).to_string(),
    ));
    let runs = Arc::new(AtomicUsize::new(0));
    let config = || {
        let counter = Arc::clone(&runs);
        let add_done = Migration::new("add-done").with_up(move |mut state: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(todos) = state["todos"].as_array_mut() {
                for todo in todos {
                    todo["done"] = json!(false);
                }
            }
            Ok(state)
        });
        PersistConfig::new(ImmediateStorage::shared(Arc::clone(&storage)))
            .with_migrations(vec![add_done])
            .with_clock(fixed_now)
    };

    let store = persist_store(new_store(), config()).await.unwrap();
    assert_eq!(
        store.get_state()["todos"],
        json!([{"title": "legacy", "done": false}])
    );
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    store.dispatch(add_todo("new"));
    flush().await;
    assert_eq!(stored(storage.as_ref(), "redux")["migrations"], json!(["add-done"]));

    let store = persist_store(new_store(), config()).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.get_state()["todos"],
        json!([{"title": "legacy", "done": false}, {"title": "new"}])
    );
}

#[tokio::test(start_paused = true)]
async fn test_throttled_burst_writes_once() {
    let storage = Arc::new(CountingStorage::default());
    let config = PersistConfig::new(ImmediateStorage::shared(Arc::clone(&storage)))
        .with_throttle(Duration::from_millis(100));
    let store = persist_store(new_store(), config).await.unwrap();

    for i in 0..10 {
        store.dispatch(add_todo(&format!("todo {i}")));
    }
    flush().await;
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    let envelope = stored(storage.as_ref(), "redux");
    assert_eq!(envelope["persistedState"]["todos"].as_array().map(Vec::len), Some(10));
}

#[tokio::test(start_paused = true)]
async fn test_map_writes_derived_keys() {
    let storage = Arc::new(MemoryStorage::new());
    let map = TransformMap::new().derive("todos", |_, value, _| {
        let count = value.and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        phoenix_core::Derived::target("stats.count", json!(count))
    });
    let config = PersistConfig::new(ImmediateStorage::shared(Arc::clone(&storage)))
        .with_whitelist(["todos", "stats"])
        .with_map(map);
    let store = persist_store(new_store(), config).await.unwrap();

    store.dispatch(add_todo("one"));
    store.dispatch(add_todo("two"));
    flush().await;

    let persisted = &stored(storage.as_ref(), "redux")["persistedState"];
    assert_eq!(persisted["stats"], json!({"count": 2}));
    assert_eq!(persisted["todos"].as_array().map(Vec::len), Some(2));
    assert!(persisted.get("session").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_persistence_leaves_store_alone() {
    let storage = Arc::new(CountingStorage::default());
    let config =
        PersistConfig::new(ImmediateStorage::shared(Arc::clone(&storage))).with_disabled(true);
    let store = persist_store(new_store(), config).await.unwrap();

    store.dispatch(add_todo("not saved"));
    flush().await;

    assert_eq!(store.listener_count(), 0);
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
}
