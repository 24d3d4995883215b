/*!
The persist/rehydrate orchestrator.

[`persist_store`] loads the envelope saved under the configured key, drops it
when it has expired, migrates it, filters it and dispatches it into the store
as a [`REHYDRATE`](crate::REHYDRATE) action. It then subscribes a save
procedure that writes a fresh envelope after every store change (or once per
throttle window).

Saves are encoded synchronously inside the store listener and handed to a
single background writer task, so writes reach storage in the order the
changes happened and a slow backend never blocks a dispatch.
*/

use std::sync::{Arc, Weak};

use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::config::{Clock, PersistConfig};
use crate::envelope::PersistedEnvelope;
use crate::migration::{applied_ledger, migrations_to_run, run_migrations};
#[cfg(feature = "metrics")]
use crate::observability::PhoenixMetrics;
use crate::path;
use crate::storage::AsyncStorageAdapter;
use crate::store::{Action, Listener, Store};
use crate::throttle::Throttle;
use crate::transform::TransformMap;
use crate::{PhoenixError, Result};

/// Keep the whitelisted paths (when a whitelist is set), then drop the
/// blacklisted ones. Absent or non-object state filters to `{}`.
pub fn filter_state(
    state: Option<&Value>,
    whitelist: Option<&[String]>,
    blacklist: Option<&[String]>,
) -> Value {
    let blacklist = blacklist.unwrap_or_default();
    match (state, whitelist) {
        (Some(state), Some(whitelist)) => path::omit(&path::pick(state, whitelist), blacklist),
        (Some(state), None) => path::omit(state, blacklist),
        (None, _) => Value::Object(Map::new()),
    }
}

/// Rehydrate `store` from storage and keep storage in sync with it.
///
/// Resolves with the same store once the rehydration action has been
/// dispatched and the save procedure subscribed. When the configuration is
/// disabled, storage is read but nothing is dispatched, subscribed or written.
///
/// # Errors
/// * `PhoenixError::Runtime` - if called outside a Tokio runtime
/// * `PhoenixError::Validation` - if the configuration is invalid
/// * Storage, codec and migration errors from loading the envelope
///
/// Nothing is dispatched or subscribed when an error is returned. Failures
/// while saving later on are logged and never surface here.
///
/// # Example
/// ```rust
/// use phoenix_core::{
///     persist_store, Action, ImmediateStorage, MemoryStorage, MemoryStore, PersistConfig, Store,
/// };
/// use serde_json::{json, Value};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> phoenix_core::Result<()> {
/// let store = std::sync::Arc::new(MemoryStore::from_fn(
///     |state: Option<Value>, _action: &Action| state.unwrap_or_else(|| json!({"todos": []})),
///     None,
/// ));
/// let config = PersistConfig::new(ImmediateStorage::new(MemoryStorage::new()))
///     .with_blacklist(["session"]);
/// let store = persist_store(store, config).await?;
/// store.dispatch(Action::new("ADD_TODO"));
/// # Ok(())
/// # }
/// ```
pub async fn persist_store<S>(store: Arc<S>, config: PersistConfig) -> Result<Arc<S>>
where
    S: Store + 'static,
{
    config.validate()?;
    let handle = Handle::try_current()
        .map_err(|e| PhoenixError::Runtime(format!("persist_store needs a Tokio runtime: {e}")))?;
    let options = &config.options;

    let raw = config.storage.get_item(&options.key).await?;
    if options.disabled {
        debug!(key = %options.key, "Persistence disabled; leaving store untouched");
        return Ok(store);
    }

    let envelope = match raw.as_deref() {
        Some(raw) => config.codec.deserialize(raw)?,
        None => None,
    }
    .unwrap_or_default();

    let state = restore_state(&config, &envelope)?;
    let restored = state.is_some();
    let payload = filter_state(
        state.as_ref(),
        options.whitelist.as_deref(),
        options.blacklist.as_deref(),
    );

    store.dispatch(Action::rehydrate(payload));
    #[cfg(feature = "metrics")]
    PhoenixMetrics::global().record_rehydration();
    info!(key = %options.key, restored, "Store rehydrated");

    let saver = Arc::new(Saver {
        store: Arc::downgrade(&store),
        map: config.map.clone(),
        whitelist: options.whitelist.clone(),
        blacklist: options.blacklist.clone(),
        ledger: config.migrations.as_deref().map(applied_ledger),
        codec: Arc::clone(&config.codec),
        clock: Arc::clone(&config.clock),
        writer: spawn_writer(&handle, Arc::clone(&config.storage), options.key.clone()),
    });

    let listener: Listener = if options.throttle_ms > 0 {
        let save = Arc::clone(&saver);
        let throttle = Throttle::new(options.throttle(), handle, Arc::new(move || save.save()));
        Arc::new(move || {
            throttle.notify();
        })
    } else {
        Arc::new(move || saver.save())
    };
    store.subscribe(listener);

    Ok(store)
}

/// Apply expiration and migrations to the loaded envelope.
fn restore_state(config: &PersistConfig, envelope: &PersistedEnvelope) -> Result<Option<Value>> {
    let mut state = envelope.persisted_state.clone();

    let expired = match (&config.options.expire_date, &state) {
        (Some(expire_after), Some(_)) => envelope.is_expired(expire_after, config.now()),
        _ => false,
    };
    if expired {
        info!(
            key = %config.options.key,
            save_date = ?envelope.save_date,
            "Persisted state expired; discarding"
        );
        #[cfg(feature = "metrics")]
        PhoenixMetrics::global().record_expired();
        state = None;
    }

    let Some(migrations) = &config.migrations else {
        return Ok(state);
    };
    let Some(current) = state else {
        return Ok(None);
    };

    let applied = envelope.migrations.as_deref().unwrap_or_default();
    let steps = migrations_to_run(applied, migrations);
    if !steps.is_empty() {
        info!(steps = steps.len(), "Migrating persisted state");
    }
    #[cfg(feature = "metrics")]
    PhoenixMetrics::global().record_migration_steps(steps.len());
    run_migrations(&steps, current).map(Some)
}

/// Drains encoded envelopes into storage, one write at a time.
fn spawn_writer(
    handle: &Handle,
    storage: Arc<dyn AsyncStorageAdapter>,
    key: String,
) -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    handle.spawn(async move {
        while let Some(encoded) = rx.recv().await {
            match storage.set_item(&key, &encoded).await {
                Ok(()) => {
                    debug!(key = %key, bytes = encoded.len(), "Saved state");
                    #[cfg(feature = "metrics")]
                    PhoenixMetrics::global().record_save(encoded.len());
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to save state");
                    #[cfg(feature = "metrics")]
                    PhoenixMetrics::global().record_save_error();
                }
            }
        }
    });
    tx
}

/// The save procedure subscribed to the store.
struct Saver<S> {
    store: Weak<S>,
    map: TransformMap,
    whitelist: Option<Vec<String>>,
    blacklist: Option<Vec<String>>,
    ledger: Option<Vec<String>>,
    codec: Arc<dyn Codec>,
    clock: Clock,
    writer: mpsc::UnboundedSender<String>,
}

impl<S: Store> Saver<S> {
    fn save(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        match self.encode(&store.get_state()) {
            Ok(encoded) => {
                if self.writer.send(encoded).is_err() {
                    warn!("Save writer has stopped; dropping snapshot");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode state for saving");
                #[cfg(feature = "metrics")]
                PhoenixMetrics::global().record_save_error();
            }
        }
    }

    fn encode(&self, state: &Value) -> Result<String> {
        let transformed = self.map.apply(state);
        let subset = filter_state(
            Some(&transformed),
            self.whitelist.as_deref(),
            self.blacklist.as_deref(),
        );
        let envelope = PersistedEnvelope::new(subset, (self.clock)(), self.ledger.clone());
        self.codec.serialize(&envelope)
    }
}
