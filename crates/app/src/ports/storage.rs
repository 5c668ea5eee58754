//! Storage port — durable string key-value pairs.

use std::future::Future;

use relaysync_domain::error::RelaySyncError;

/// Minimal durable key-value store.
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, RelaySyncError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str)
    -> impl Future<Output = Result<(), RelaySyncError>> + Send;
}

impl<T: KeyValueStore + Send + Sync> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, RelaySyncError>> + Send {
        (**self).get(key)
    }

    fn put(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        (**self).put(key, value)
    }
}
