//! Core business logic abstractions

pub mod analytics;
pub mod cache;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod currency;
pub mod log;

// Re-export main types for cleaner imports
pub use analytics::{AnalyticsSink, UsageEvent, UsageReport};
pub use chat::{ChatUser, Inbound, InboundKind, Reply, UserId};
pub use conversation::ConversationState;
pub use currency::{CurrencyCode, RateError, RateProvider, RateTable};
