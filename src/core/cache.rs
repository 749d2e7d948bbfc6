use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named key-value collection with optional per-entry expiry.
///
/// Storage failures are logged by implementations and surface as misses,
/// so callers never have to handle them.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);

    async fn remove(&self, key: &[u8]);

    /// Live entries whose key starts with `prefix`, ordered by key.
    async fn entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

pub trait Store: Send + Sync {
    /// Returns the collection called `name`, creating it when missing.
    /// `None` when a persistent collection cannot be opened.
    fn get_collection(&self, name: &str, persist: bool) -> Option<Arc<dyn KeyValueCollection>>;
}
