//! Currency codes, rate tables and the rate provider abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 3-4 letter currency or crypto-asset code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(pub(crate) String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{0}' is not a currency code, expected 3 or 4 letters")]
pub struct CurrencyCodeError(pub String);

impl CurrencyCode {
    pub fn new(raw: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = raw.trim();
        let len = trimmed.len();
        if !(3..=4).contains(&len) || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exchange multipliers for one base currency, from a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub base: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, f64>,
}

impl RateTable {
    pub fn new(base: CurrencyCode, rates: BTreeMap<CurrencyCode, f64>) -> Self {
        Self { base, rates }
    }

    pub fn rate(&self, target: &CurrencyCode) -> Option<f64> {
        self.rates.get(target).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateError {
    #[error("rate provider unreachable: {0}")]
    ProviderUnreachable(String),
    #[error("rate provider rejected the request: {0}")]
    ProviderRejected(String),
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn get_rates(&self, base: &CurrencyCode) -> Result<RateTable, RateError>;
}
