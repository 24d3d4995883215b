//! Configuration for persisting and rehydrating a store
//!
//! Configuration is split in two. [`PersistOptions`] holds the plain data
//! settings and can be loaded from JSON (for example a settings file).
//! [`PersistConfig`] adds the runtime collaborators that cannot be expressed
//! as data: the storage backend, codec, transform map, migrations and clock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{Codec, JsonCodec};
use crate::envelope::ExpireAfter;
use crate::migration::Migration;
use crate::storage::AsyncStorageAdapter;
use crate::transform::TransformMap;
use crate::{PhoenixError, Result};

/// Storage key used when none is configured
pub const DEFAULT_KEY: &str = "redux";

/// Source of the current time, used for save dates and expiration checks
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Data-only persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistOptions {
    /// Storage key the envelope is saved under (default `"redux"`)
    pub key: String,
    /// Paths to keep; when set, everything else is dropped before the blacklist applies
    pub whitelist: Option<Vec<String>>,
    /// Paths to drop
    pub blacklist: Option<Vec<String>>,
    /// Discard persisted state older than this
    pub expire_date: Option<ExpireAfter>,
    /// Minimum spacing between saves in milliseconds; 0 saves on every change
    pub throttle_ms: u64,
    /// Skip rehydration and saving entirely
    pub disabled: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            whitelist: None,
            blacklist: None,
            expire_date: None,
            throttle_ms: 0,
            disabled: false,
        }
    }
}

impl PersistOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Save throttle window
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(PhoenixError::validation("Storage key cannot be empty"));
        }
        let lists = [&self.whitelist, &self.blacklist];
        if lists
            .into_iter()
            .flatten()
            .flatten()
            .any(|path| path.is_empty())
        {
            return Err(PhoenixError::validation(
                "Whitelist and blacklist paths cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Full persistence configuration
#[derive(Clone)]
pub struct PersistConfig {
    pub options: PersistOptions,
    pub storage: Arc<dyn AsyncStorageAdapter>,
    pub codec: Arc<dyn Codec>,
    pub map: TransformMap,
    pub migrations: Option<Vec<Migration>>,
    pub clock: Clock,
}

impl PersistConfig {
    /// Create a configuration with default options around `storage`
    ///
    /// The storage backend is always explicit; there is no ambient default.
    pub fn new<S: AsyncStorageAdapter + 'static>(storage: S) -> Self {
        Self::from_options(PersistOptions::default(), storage)
    }

    /// Combine previously loaded options with a storage backend
    pub fn from_options<S: AsyncStorageAdapter + 'static>(
        options: PersistOptions,
        storage: S,
    ) -> Self {
        Self {
            options,
            storage: Arc::new(storage),
            codec: Arc::new(JsonCodec::new()),
            map: TransformMap::new(),
            migrations: None,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_key<S: Into<String>>(mut self, key: S) -> Self {
        self.options.key = key.into();
        self
    }

    pub fn with_whitelist<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.whitelist = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_blacklist<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.blacklist = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_expire_date(mut self, expire_after: ExpireAfter) -> Self {
        self.options.expire_date = Some(expire_after);
        self
    }

    pub fn with_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_map(mut self, map: TransformMap) -> Self {
        self.map = map;
        self
    }

    /// Throttle saves; sub-millisecond precision is dropped
    pub fn with_throttle(mut self, window: Duration) -> Self {
        self.options.throttle_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.options.disabled = disabled;
        self
    }

    pub fn with_migrations(mut self, migrations: Vec<Migration>) -> Self {
        self.migrations = Some(migrations);
        self
    }

    /// Replace the clock, mainly for deterministic tests
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Current time according to the configured clock
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.options.validate()
    }
}

impl fmt::Debug for PersistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistConfig")
            .field("options", &self.options)
            .field("codec", &self.codec.name())
            .field("map", &self.map)
            .field("migrations", &self.migrations)
            .finish_non_exhaustive()
    }
}
