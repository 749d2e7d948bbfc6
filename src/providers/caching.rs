use crate::core::cache::KeyValueCollection;
use crate::core::{CurrencyCode, RateError, RateProvider, RateTable};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Memoizes successful rate tables per base currency for `ttl`.
/// Failures always go back to the inner provider on the next call.
pub struct CachingRateProvider<T: RateProvider> {
    inner: T,
    cache: Arc<dyn KeyValueCollection>,
    ttl: Duration,
}

impl<T: RateProvider> CachingRateProvider<T> {
    pub fn new(inner: T, cache: Arc<dyn KeyValueCollection>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl<T: RateProvider> RateProvider for CachingRateProvider<T> {
    async fn get_rates(&self, base: &CurrencyCode) -> Result<RateTable, RateError> {
        let key = format!("rates:{base}");
        if let Some(cached) = self.cache.get(key.as_bytes()).await {
            match serde_json::from_slice::<RateTable>(&cached) {
                Ok(table) => {
                    debug!("Cache hit for rates: {}", base);
                    return Ok(table);
                }
                Err(e) => warn!(error = %e, %base, "Discarding unreadable cached rates"),
            }
        }

        debug!("Cache miss for rates: {}", base);
        let table = self.inner.get_rates(base).await?;
        match serde_json::to_vec(&table) {
            Ok(bytes) => self.cache.put(key.as_bytes(), &bytes, Some(self.ttl)).await,
            Err(e) => warn!(error = %e, %base, "Failed to serialize rates for caching"),
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RateProvider for CountingProvider {
        async fn get_rates(&self, base: &CurrencyCode) -> Result<RateTable, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RateError::ProviderUnreachable("down".to_string()));
            }
            Ok(RateTable::new(
                base.clone(),
                BTreeMap::from([(CurrencyCode::new("EUR").unwrap(), 0.9)]),
            ))
        }
    }

    fn caching(fail: bool, ttl: Duration) -> CachingRateProvider<CountingProvider> {
        CachingRateProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
                fail,
            },
            Arc::new(MemoryCollection::new()),
            ttl,
        )
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let provider = caching(false, Duration::from_secs(60));
        let usd = CurrencyCode::new("USD").unwrap();

        let first = provider.get_rates(&usd).await.unwrap();
        let second = provider.get_rates(&usd).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bases_are_cached_separately() {
        let provider = caching(false, Duration::from_secs(60));

        let usd = CurrencyCode::new("USD").unwrap();
        let gbp = CurrencyCode::new("GBP").unwrap();

        let usd = provider.get_rates(&usd).await.unwrap();
        let gbp = provider.get_rates(&gbp).await.unwrap();

        assert_eq!(usd.base.as_str(), "USD");
        assert_eq!(gbp.base.as_str(), "GBP");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = caching(true, Duration::from_secs(60));
        let usd = CurrencyCode::new("USD").unwrap();

        assert!(provider.get_rates(&usd).await.is_err());
        assert!(provider.get_rates(&usd).await.is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let provider = caching(false, Duration::from_millis(10));
        let usd = CurrencyCode::new("USD").unwrap();

        provider.get_rates(&usd).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        provider.get_rates(&usd).await.unwrap();

        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }
}
