//! Usage analytics kept in a key-value collection.
//!
//! Layout: `user:{id}` holds a [`UserRecord`], `event:{seq}` holds one
//! [`UsageEvent`] with a zero-padded sequence so events scan in order.

use crate::core::analytics::{CommandCount, MonthlyStats, PairCount};
use crate::core::cache::KeyValueCollection;
use crate::core::{AnalyticsSink, ChatUser, CurrencyCode, UsageEvent, UsageReport, UserId};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const USER_PREFIX: &str = "user:";
const EVENT_PREFIX: &str = "event:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub interactions: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// Interactions per `YYYY-MM`
    #[serde(default)]
    pub monthly_usage: BTreeMap<String, u64>,
}

fn month_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn event_seq(key: &[u8]) -> Option<u64> {
    std::str::from_utf8(key)
        .ok()?
        .strip_prefix(EVENT_PREFIX)?
        .parse()
        .ok()
}

pub struct UsageLog {
    records: Arc<dyn KeyValueCollection>,
    // Serializes read-modify-write of user records and the event sequence
    next_seq: Mutex<Option<u64>>,
    today: fn() -> NaiveDate,
}

impl UsageLog {
    pub fn new(records: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            records,
            next_seq: Mutex::new(None),
            today: || Local::now().date_naive(),
        }
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn user_key(id: UserId) -> Vec<u8> {
        format!("{USER_PREFIX}{id}").into_bytes()
    }

    pub async fn user(&self, id: UserId) -> Option<UserRecord> {
        let raw = self.records.get(&Self::user_key(id)).await?;
        serde_json::from_slice(&raw)
            .inspect_err(|e| warn!(error = %e, user = %id, "Unreadable user record"))
            .ok()
    }

    async fn touch_user(&self, user: &ChatUser, date: NaiveDate) {
        let _guard = self.next_seq.lock().await;
        let mut record = self.user(user.id).await.unwrap_or_else(|| UserRecord {
            first_seen: date,
            last_seen: date,
            interactions: 0,
            username: None,
            first_name: None,
            monthly_usage: BTreeMap::new(),
        });
        record.last_seen = record.last_seen.max(date);
        record.interactions += 1;
        if user.username.is_some() {
            record.username.clone_from(&user.username);
        }
        if user.first_name.is_some() {
            record.first_name.clone_from(&user.first_name);
        }
        *record.monthly_usage.entry(month_of(date)).or_default() += 1;

        match serde_json::to_vec(&record) {
            Ok(bytes) => self.records.put(&Self::user_key(user.id), &bytes, None).await,
            Err(e) => warn!(error = %e, user = %user.id, "Failed to serialize user record"),
        }
    }

    async fn append(&self, event: UsageEvent) {
        let bytes = match serde_json::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to serialize usage event");
                return;
            }
        };

        let mut next_seq = self.next_seq.lock().await;
        let seq = match *next_seq {
            Some(seq) => seq,
            None => self.last_seq().await.map_or(0, |last| last + 1),
        };
        let key = format!("{EVENT_PREFIX}{seq:020}");
        self.records.put(key.as_bytes(), &bytes, None).await;
        *next_seq = Some(seq + 1);
        debug!(seq, "Recorded usage event");
    }

    async fn last_seq(&self) -> Option<u64> {
        self.records
            .entries(EVENT_PREFIX.as_bytes())
            .await
            .last()
            .and_then(|(key, _)| event_seq(key))
    }

    pub async fn events(&self) -> Vec<UsageEvent> {
        self.records
            .entries(EVENT_PREFIX.as_bytes())
            .await
            .into_iter()
            .filter_map(|(key, raw)| match serde_json::from_slice(&raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    let key = String::from_utf8_lossy(&key);
                    warn!(error = %e, %key, "Skipping unreadable event");
                    None
                }
            })
            .collect()
    }

    pub async fn users(&self) -> Vec<UserRecord> {
        self.records
            .entries(USER_PREFIX.as_bytes())
            .await
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_slice(&raw).ok())
            .collect()
    }
}

#[async_trait]
impl AnalyticsSink for UsageLog {
    async fn record_user_seen(&self, user: &ChatUser) {
        self.touch_user(user, (self.today)()).await;
    }

    async fn record_command(&self, name: &str, user_id: UserId) {
        self.append(UsageEvent::Command {
            name: name.to_string(),
            user_id,
            date: (self.today)(),
        })
        .await;
    }

    async fn record_conversion(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
        amount: f64,
        user_id: UserId,
    ) {
        self.append(UsageEvent::Conversion {
            from: source.clone(),
            to: target.clone(),
            amount,
            user_id,
            date: (self.today)(),
        })
        .await;
    }
}

/// Sorts by count descending, then by key, and keeps the first `limit`.
fn ranked<K: Ord>(counts: HashMap<K, usize>, limit: usize) -> Vec<(K, usize)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(ka, a), (kb, b)| b.cmp(a).then_with(|| ka.cmp(kb)));
    ranked.truncate(limit);
    ranked
}

#[async_trait]
impl UsageReport for UsageLog {
    async fn user_count(&self) -> usize {
        self.records.entries(USER_PREFIX.as_bytes()).await.len()
    }

    async fn monthly_stats(&self, month: &str) -> MonthlyStats {
        let users = self.users().await;
        let events = self.events().await;

        let in_month = |event: &&UsageEvent| month_of(event.date()) == month;
        MonthlyStats {
            month: month.to_string(),
            active_users: users
                .iter()
                .filter(|u| u.monthly_usage.contains_key(month))
                .count(),
            new_users: users
                .iter()
                .filter(|u| month_of(u.first_seen) == month)
                .count(),
            total_users: users
                .iter()
                .filter(|u| month_of(u.first_seen).as_str() <= month)
                .count(),
            total_commands: events
                .iter()
                .filter(in_month)
                .filter(|e| matches!(e, UsageEvent::Command { .. }))
                .count(),
            total_conversions: events
                .iter()
                .filter(in_month)
                .filter(|e| matches!(e, UsageEvent::Conversion { .. }))
                .count(),
        }
    }

    async fn top_commands(&self, limit: usize) -> Vec<CommandCount> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for event in self.events().await {
            if let UsageEvent::Command { name, .. } = event {
                *counts.entry(name).or_default() += 1;
            }
        }
        ranked(counts, limit)
            .into_iter()
            .map(|(name, count)| CommandCount { name, count })
            .collect()
    }

    async fn popular_conversions(&self, limit: usize) -> Vec<PairCount> {
        let mut counts: HashMap<(CurrencyCode, CurrencyCode), usize> = HashMap::new();
        for event in self.events().await {
            if let UsageEvent::Conversion { from, to, .. } = event {
                *counts.entry((from, to)).or_default() += 1;
            }
        }
        ranked(counts, limit)
            .into_iter()
            .map(|((from, to), count)| PairCount { from, to, count })
            .collect()
    }
}
