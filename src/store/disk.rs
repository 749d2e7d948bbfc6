use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<SystemTime>,
}

impl CacheEntry {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Persistent collection stored in one fjall partition
pub struct DiskCollection {
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(partition: PartitionHandle) -> Self {
        Self { partition }
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(raw) = self.partition.get(key)? else {
            debug!(key = %String::from_utf8_lossy(key), "Cache MISS");
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        if entry.is_expired(SystemTime::now()) {
            debug!(key = %String::from_utf8_lossy(key), "Cache entry expired");
            self.partition.remove(key)?;
            return Ok(None);
        }
        debug!(key = %String::from_utf8_lossy(key), "Cache HIT");
        Ok(Some(entry.value))
    }

    fn write(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at: ttl.map(|d| SystemTime::now() + d),
        };
        self.partition.insert(key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    /// Unreadable entries are skipped so one bad record never hides the rest.
    fn scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let now = SystemTime::now();
        let mut live = Vec::new();
        for item in self.partition.prefix(prefix) {
            let (key, raw) = match item {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            match serde_json::from_slice::<CacheEntry>(&raw) {
                Ok(entry) if !entry.is_expired(now) => live.push((key.to_vec(), entry.value)),
                Ok(_) => {}
                Err(e) => {
                    let key = String::from_utf8_lossy(&key);
                    warn!(error = %e, %key, "Skipping corrupt entry");
                }
            }
        }
        live
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.read(key).unwrap_or_else(|e| {
            warn!(error = %e, "DiskCollection get failed");
            None
        })
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        if let Err(e) = self.write(key, value, ttl) {
            warn!(error = %e, "DiskCollection put failed");
        }
    }

    async fn remove(&self, key: &[u8]) {
        if let Err(e) = self.partition.remove(key) {
            warn!(error = %e, "DiskCollection remove failed");
        }
    }

    async fn entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.scan(prefix)
    }
}
