use crate::core::{CurrencyCode, RateError, RateProvider, RateTable};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

/// Rates from an open.er-api.com style endpoint: `GET {base_url}/{BASE}`
pub struct OpenErApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OpenErApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("currenz/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    rates: Option<HashMap<String, f64>>,
}

#[async_trait]
impl RateProvider for OpenErApiProvider {
    async fn get_rates(&self, base: &CurrencyCode) -> Result<RateTable, RateError> {
        let url = format!("{}/{}", self.base_url, base);
        debug!("Requesting exchange rates from {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, %base, "Rate request failed");
            RateError::ProviderUnreachable(format!("{e} for base currency: {base}"))
        })?;

        if !response.status().is_success() {
            return Err(RateError::ProviderRejected(format!(
                "HTTP error: {} for base currency: {}",
                response.status(),
                base
            )));
        }

        let text = response.text().await.map_err(|e| {
            RateError::ProviderUnreachable(format!("{e} while reading rates for: {base}"))
        })?;

        let data: LatestRatesResponse = serde_json::from_str(&text).map_err(|e| {
            RateError::ProviderRejected(format!("Failed to parse response for {base}: {e}"))
        })?;

        if data.result.as_deref() != Some("success") {
            return Err(RateError::ProviderRejected(format!(
                "API error: {} for base currency: {}",
                data.error_type.as_deref().unwrap_or("unknown"),
                base
            )));
        }

        let raw_rates = data.rates.ok_or_else(|| {
            RateError::ProviderRejected(format!("No rates in response for: {base}"))
        })?;

        let rates: BTreeMap<CurrencyCode, f64> = raw_rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .filter_map(|(code, rate)| CurrencyCode::new(&code).ok().map(|c| (c, rate)))
            .collect();

        debug!(%base, count = rates.len(), "Fetched exchange rates");
        Ok(RateTable::new(base.clone(), rates))
    }
}
