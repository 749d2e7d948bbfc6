//! Line-oriented console transport for talking to the bot locally.
//!
//! `/command args` runs a command, `#CODE` presses the keyboard button with
//! that payload, and anything else is sent as free text.

use super::ui;
use crate::bot::{Dispatcher, ReplySink, pump};
use crate::core::chat::ButtonAction;
use crate::core::{ChatUser, Inbound, Reply};
use anyhow::Result;
use async_trait::async_trait;
use console::Term;
use futures::StreamExt;
use indicatif::ProgressBar;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

/// Classifies one console line into an inbound event.
pub fn parse_line(user: ChatUser, line: &str) -> Inbound {
    match line.trim().strip_prefix('#') {
        Some(payload) => Inbound::callback(user, payload.trim()),
        None => Inbound::from_text(user, line),
    }
}

/// Reply text followed by its keyboard, one line per row.
pub fn render_reply(reply: &Reply) -> String {
    let mut output = reply.text.clone();
    let Some(keyboard) = &reply.keyboard else {
        return output;
    };

    output.push('\n');
    for row in &keyboard.rows {
        let buttons: Vec<String> = row
            .iter()
            .map(|button| match &button.action {
                ButtonAction::Callback(payload) => {
                    format!("[{}] #{payload}", button.label)
                }
                ButtonAction::Url(url) => format!("[{}] {url}", button.label),
            })
            .collect();
        output.push('\n');
        output.push_str(&ui::style_text(&buttons.join("   "), ui::StyleType::Button));
    }
    output
}

struct ConsoleTransport {
    term: Term,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleTransport {
    fn new() -> Self {
        Self {
            term: Term::stdout(),
            spinner: Mutex::new(None),
        }
    }

    fn begin(&self) {
        let spinner = ui::new_spinner("Thinking...");
        if let Some(previous) = self
            .spinner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(spinner)
        {
            previous.finish_and_clear();
        }
    }

    fn prompt(&self) -> std::io::Result<()> {
        self.term
            .write_str(&ui::style_text("> ", ui::StyleType::Prompt))
    }
}

#[async_trait]
impl ReplySink for ConsoleTransport {
    async fn deliver(&self, _user: &ChatUser, reply: Reply) -> Result<()> {
        if let Some(spinner) = self
            .spinner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            spinner.finish_and_clear();
        }
        self.term.write_line(&render_reply(&reply))?;
        self.term.write_line("")?;
        self.prompt()?;
        Ok(())
    }
}

pub async fn run(dispatcher: Arc<Dispatcher>, user: ChatUser) -> Result<()> {
    let transport = Arc::new(ConsoleTransport::new());
    transport.term.write_line(&ui::style_text(
        &format!("Chatting as {} (user {})", user.display_name(), user.id),
        ui::StyleType::Title,
    ))?;
    transport.term.write_line(&ui::style_text(
        "Type /start to begin, #CODE to press a button, /quit to leave.",
        ui::StyleType::Subtle,
    ))?;
    transport.prompt()?;

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let lines = futures::stream::unfold(lines, |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if QUIT_COMMANDS.contains(&line.to_ascii_lowercase().as_str()) {
                        return None;
                    }
                    return Some((line, lines));
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    return None;
                }
            }
        }
    });

    let starter = Arc::clone(&transport);
    let events = lines.map(move |line| {
        starter.begin();
        parse_line(user.clone(), &line)
    });

    // One event at a time keeps replies in typing order
    pump::run(events, dispatcher, transport, 1).await;
    Ok(())
}
