use crate::core::{CurrencyCode, RateError, RateProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("rates unavailable: {0}")]
    RateUnavailable(#[from] RateError),
    #[error("currency not found: {0}")]
    TargetNotFound(CurrencyCode),
}

/// A completed conversion at full provider precision
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub source: CurrencyCode,
    pub target: CurrencyCode,
    pub result: f64,
}

impl Conversion {
    /// Units of target per unit of source
    pub fn rate(&self) -> f64 {
        self.result / self.amount
    }
}

/// Converts amounts using a fresh rate table keyed on the source currency.
#[derive(Clone)]
pub struct Converter {
    rates: Arc<dyn RateProvider>,
}

impl Converter {
    pub fn new(rates: Arc<dyn RateProvider>) -> Self {
        Self { rates }
    }

    pub async fn convert(
        &self,
        amount: f64,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<f64, ConversionError> {
        if source == target {
            return Ok(amount);
        }

        let table = self.rates.get_rates(source).await?;
        let rate = table
            .rate(target)
            .ok_or_else(|| ConversionError::TargetNotFound(target.clone()))?;
        debug!(%source, %target, rate, "Converted {}", amount);
        Ok(amount * rate)
    }

    pub async fn run(
        &self,
        amount: f64,
        source: CurrencyCode,
        target: CurrencyCode,
    ) -> Result<Conversion, ConversionError> {
        let result = self.convert(amount, &source, &target).await?;
        Ok(Conversion {
            amount,
            source,
            target,
            result,
        })
    }
}
