//! Usage analytics abstractions

use crate::core::chat::{ChatUser, UserId};
use crate::core::currency::CurrencyCode;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Append-only usage record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageEvent {
    Command {
        name: String,
        user_id: UserId,
        date: NaiveDate,
    },
    Conversion {
        from: CurrencyCode,
        to: CurrencyCode,
        amount: f64,
        user_id: UserId,
        date: NaiveDate,
    },
}

impl UsageEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            UsageEvent::Command { date, .. } | UsageEvent::Conversion { date, .. } => *date,
        }
    }
}

/// Write side used by the bot. Failures are the sink's own business.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record_user_seen(&self, user: &ChatUser);

    async fn record_command(&self, name: &str, user_id: UserId);

    async fn record_conversion(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
        amount: f64,
        user_id: UserId,
    );
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyStats {
    pub month: String,
    pub active_users: usize,
    pub new_users: usize,
    pub total_users: usize,
    pub total_commands: usize,
    pub total_conversions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCount {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub count: usize,
}

/// Read side used by the reporting endpoint and the `report` command.
/// Months are formatted `YYYY-MM`.
#[async_trait]
pub trait UsageReport: Send + Sync {
    async fn user_count(&self) -> usize;

    async fn monthly_stats(&self, month: &str) -> MonthlyStats;

    async fn top_commands(&self, limit: usize) -> Vec<CommandCount>;

    async fn popular_conversions(&self, limit: usize) -> Vec<PairCount>;
}
