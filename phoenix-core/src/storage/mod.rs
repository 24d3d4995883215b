/*!
Storage adapters for persisted envelopes.

This module defines the storage abstraction (port) and concrete implementations (adapters).
The orchestrator only ever talks to [`AsyncStorageAdapter`]; synchronous backends implement
[`StorageAdapter`] and are lifted with [`ImmediateStorage`], which resolves every call
immediately. Storage is a flat string key-value space, one envelope per key.
*/

pub mod local;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

pub use local::LocalFileStorage;
pub use memory::MemoryStorage;

/// Synchronous storage abstraction
///
/// Implementations store opaque encoded envelopes under string keys.
pub trait StorageAdapter: Send + Sync {
    /// Read the value stored under `key`
    ///
    /// # Returns
    /// `Ok(None)` when nothing has been stored under the key
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// Async storage abstraction used by the persist orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AsyncStorageAdapter: Send + Sync {
    /// Read the value stored under `key`
    ///
    /// # Returns
    /// `Ok(None)` when nothing has been stored under the key
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
impl<T: AsyncStorageAdapter + ?Sized> AsyncStorageAdapter for Arc<T> {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value).await
    }
}

/// Async view of a synchronous storage adapter
///
/// Every call runs the wrapped adapter inline and resolves immediately, so the
/// orchestrator can await synchronous and asynchronous backends uniformly.
#[derive(Debug)]
pub struct ImmediateStorage<S: StorageAdapter> {
    inner: Arc<S>,
}

impl<S: StorageAdapter> ImmediateStorage<S> {
    pub fn new(adapter: S) -> Self {
        Self {
            inner: Arc::new(adapter),
        }
    }

    /// Wrap an adapter that is also used elsewhere
    pub fn shared(adapter: Arc<S>) -> Self {
        Self { inner: adapter }
    }
}

impl<S: StorageAdapter> Clone for ImmediateStorage<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<S: StorageAdapter> AsyncStorageAdapter for ImmediateStorage<S> {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_item(key, value)
    }
}
