//! Inbound events and outbound reply descriptors exchanged with a transport

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl ChatUser {
    pub fn new(id: i64) -> Self {
        Self {
            id: UserId(id),
            username: None,
            first_name: None,
        }
    }

    pub fn with_first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("there")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    Command { name: String, args: Vec<String> },
    /// A keyboard button press carrying its opaque payload
    Callback { payload: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub user: ChatUser,
    pub kind: InboundKind,
}

impl Inbound {
    pub fn command(user: ChatUser, name: &str, args: &[&str]) -> Self {
        Self {
            user,
            kind: InboundKind::Command {
                name: name.to_ascii_lowercase(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        }
    }

    pub fn callback(user: ChatUser, payload: impl Into<String>) -> Self {
        Self {
            user,
            kind: InboundKind::Callback {
                payload: payload.into(),
            },
        }
    }

    pub fn text(user: ChatUser, text: impl Into<String>) -> Self {
        Self {
            user,
            kind: InboundKind::Text(text.into()),
        }
    }

    /// Classifies a raw message: `/name args...` is a command, anything
    /// else is free text. A `@botname` suffix on the command is dropped.
    pub fn from_text(user: ChatUser, raw: &str) -> Self {
        let trimmed = raw.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::text(user, trimmed);
        };
        let mut parts = rest.split_whitespace();
        let name = parts
            .next()
            .map(|n| n.split('@').next().unwrap_or(n))
            .unwrap_or_default();
        if name.is_empty() {
            return Self::text(user, trimmed);
        }
        let args: Vec<&str> = parts.collect();
        Self::command(user, name, &args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

/// What the transport should send back for one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}
