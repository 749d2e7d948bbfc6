//! Per-user conversion wizard state

use crate::core::currency::CurrencyCode;
use serde::{Deserialize, Serialize};

/// Stage of an active wizard. Absence of a state means no flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingBase,
    AwaitingTarget {
        base: CurrencyCode,
    },
    AwaitingAmount {
        base: CurrencyCode,
        target: CurrencyCode,
    },
}

impl ConversationState {
    pub fn base(&self) -> Option<&CurrencyCode> {
        match self {
            ConversationState::AwaitingBase => None,
            ConversationState::AwaitingTarget { base }
            | ConversationState::AwaitingAmount { base, .. } => Some(base),
        }
    }

    pub fn target(&self) -> Option<&CurrencyCode> {
        match self {
            ConversationState::AwaitingAmount { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn stage_name(&self) -> &'static str {
        match self {
            ConversationState::AwaitingBase => "awaiting_base",
            ConversationState::AwaitingTarget { .. } => "awaiting_target",
            ConversationState::AwaitingAmount { .. } => "awaiting_amount",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_with_stage_tag() {
        let state = ConversationState::AwaitingAmount {
            base: CurrencyCode::new("EUR").unwrap(),
            target: CurrencyCode::new("USD").unwrap(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"stage":"awaiting_amount","base":"EUR","target":"USD"}"#
        );
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base().map(CurrencyCode::as_str), Some("EUR"));
        assert_eq!(back.target().map(CurrencyCode::as_str), Some("USD"));
    }
}
