use crate::core::cache::KeyValueCollection;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// In-memory collection backed by an ordered map
#[derive(Default)]
pub struct MemoryCollection {
    inner: Mutex<BTreeMap<Vec<u8>, CacheValue>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut cache = self.inner.lock().await;
        let now = Instant::now();
        match cache.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!(key = %String::from_utf8_lossy(key), "Cache entry expired");
                cache.remove(key);
                None
            }
            Some(entry) => {
                debug!(key = %String::from_utf8_lossy(key), "Cache HIT");
                Some(entry.value.clone())
            }
            None => {
                debug!(key = %String::from_utf8_lossy(key), "Cache MISS");
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let mut cache = self.inner.lock().await;
        cache.insert(
            key.to_vec(),
            CacheValue {
                value: value.to_vec(),
                expires_at,
            },
        );
    }

    async fn remove(&self, key: &[u8]) {
        self.inner.lock().await.remove(key);
    }

    async fn entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let cache = self.inner.lock().await;
        let now = Instant::now();
        cache
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }
}
