//! Key-value storage interface

use async_trait::async_trait;

use crate::error::Result;

/// Minimal byte store keyed by string
///
/// Keys are built from validated session IDs plus a fixed suffix, so they
/// only contain `[A-Za-z0-9_.-]`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Bytes stored under `key`, or `None` if absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the bytes stored under `key`
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
