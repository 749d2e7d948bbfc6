//! The multi-step conversion wizard: base → target → amount.
//!
//! State lives in an injected [`KeyValueCollection`] keyed by user id. Every
//! transition goes through a [`FlowSession`], which holds that user's lock,
//! so one user's events never mutate the state concurrently.

use crate::bot::engine::{Conversion, ConversionError, Converter};
use crate::core::cache::KeyValueCollection;
use crate::core::{ConversationState, CurrencyCode, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

const LOCK_PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WizardError {
    #[error("no conversion in progress")]
    NoActiveFlow,
    #[error("unexpected step while {0}")]
    UnexpectedStep(&'static str),
    #[error("invalid amount: '{0}'")]
    InvalidAmount(String),
    #[error("could not convert {base} to {target}: {error}")]
    Conversion {
        base: CurrencyCode,
        target: CurrencyCode,
        #[source]
        error: ConversionError,
    },
}

pub struct ConversationStore {
    states: Arc<dyn KeyValueCollection>,
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl ConversationStore {
    pub fn new(states: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            states,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive access to `user`'s conversation.
    pub async fn session(&self, user: UserId) -> FlowSession<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(user).or_default())
        };
        FlowSession {
            store: self,
            user,
            _guard: lock.lock_owned().await,
        }
    }

    fn key(user: UserId) -> Vec<u8> {
        format!("state:{user}").into_bytes()
    }

    async fn load(&self, user: UserId) -> Option<ConversationState> {
        let raw = self.states.get(&Self::key(user)).await?;
        match serde_json::from_slice(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, %user, "Dropping unreadable conversation state");
                self.states.remove(&Self::key(user)).await;
                None
            }
        }
    }

    async fn save(&self, user: UserId, state: &ConversationState) {
        match serde_json::to_vec(state) {
            Ok(bytes) => self.states.put(&Self::key(user), &bytes, None).await,
            Err(e) => warn!(error = %e, %user, "Failed to serialize conversation state"),
        }
    }

    async fn clear(&self, user: UserId) {
        self.states.remove(&Self::key(user)).await;
    }
}

/// Exclusive handle on one user's conversation for the span of one event
pub struct FlowSession<'a> {
    store: &'a ConversationStore,
    user: UserId,
    _guard: OwnedMutexGuard<()>,
}

impl FlowSession<'_> {
    pub async fn state(&self) -> Option<ConversationState> {
        self.store.load(self.user).await
    }

    /// Starts a fresh flow, discarding whatever was in progress.
    pub async fn start_flow(&self) {
        debug!(user = %self.user, "Starting conversion flow");
        self.store
            .save(self.user, &ConversationState::AwaitingBase)
            .await;
    }

    pub async fn choose_base(&self, code: CurrencyCode) -> Result<ConversationState, WizardError> {
        match self.state().await {
            None => Err(WizardError::NoActiveFlow),
            Some(ConversationState::AwaitingBase) => {
                let next = ConversationState::AwaitingTarget { base: code };
                self.store.save(self.user, &next).await;
                Ok(next)
            }
            Some(other) => Err(WizardError::UnexpectedStep(other.stage_name())),
        }
    }

    pub async fn choose_target(
        &self,
        code: CurrencyCode,
    ) -> Result<ConversationState, WizardError> {
        match self.state().await {
            None => Err(WizardError::NoActiveFlow),
            Some(ConversationState::AwaitingTarget { base }) => {
                let next = ConversationState::AwaitingAmount { base, target: code };
                self.store.save(self.user, &next).await;
                Ok(next)
            }
            Some(other) => Err(WizardError::UnexpectedStep(other.stage_name())),
        }
    }

    /// Converts `text` as the amount. A bad amount keeps the flow waiting;
    /// any attempted conversion ends it, whatever the outcome.
    pub async fn submit_amount(
        &self,
        text: &str,
        converter: &Converter,
    ) -> Result<Conversion, WizardError> {
        let (base, target) = match self.state().await {
            None => return Err(WizardError::NoActiveFlow),
            Some(ConversationState::AwaitingAmount { base, target }) => (base, target),
            Some(other) => return Err(WizardError::UnexpectedStep(other.stage_name())),
        };

        let Some(amount) = parse_amount(text) else {
            return Err(WizardError::InvalidAmount(text.to_string()));
        };

        let outcome = converter.run(amount, base.clone(), target.clone()).await;
        self.store.clear(self.user).await;
        outcome.map_err(|error| WizardError::Conversion {
            base,
            target,
            error,
        })
    }

    /// Ends any flow in progress. Returns whether there was one.
    pub async fn cancel(&self) -> bool {
        let active = self.state().await.is_some();
        self.store.clear(self.user).await;
        active
    }
}

fn parse_amount(text: &str) -> Option<f64> {
    let amount: f64 = text.trim().parse().ok()?;
    (amount.is_finite() && amount > 0.0).then_some(amount)
}
