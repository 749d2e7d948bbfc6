//! Routes one inbound event to a command handler, a wizard step or the
//! free-text parser, and turns every outcome into a reply.

use crate::bot::engine::{Conversion, ConversionError, Converter};
use crate::bot::parser;
use crate::bot::pump::ReplySink;
use crate::bot::replies;
use crate::bot::wizard::{ConversationStore, FlowSession, WizardError};
use crate::core::config::BotConfig;
use crate::core::{
    AnalyticsSink, ChatUser, ConversationState, CurrencyCode, Inbound, InboundKind, RateError,
    RateProvider, Reply,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Rates,
    Currencies,
    Compare,
    Convert,
    Cancel,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "rates" => Command::Rates,
            "currencies" => Command::Currencies,
            "compare" => Command::Compare,
            "convert" => Command::Convert,
            "cancel" => Command::Cancel,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Rates => "rates",
            Command::Currencies => "currencies",
            Command::Compare => "compare",
            Command::Convert => "convert",
            Command::Cancel => "cancel",
        }
    }
}

pub struct Dispatcher {
    conversations: ConversationStore,
    converter: Converter,
    rates: Arc<dyn RateProvider>,
    analytics: Arc<dyn AnalyticsSink>,
    config: BotConfig,
}

impl Dispatcher {
    pub fn new(
        conversations: ConversationStore,
        rates: Arc<dyn RateProvider>,
        analytics: Arc<dyn AnalyticsSink>,
        config: BotConfig,
    ) -> Self {
        Self {
            conversations,
            converter: Converter::new(Arc::clone(&rates)),
            rates,
            analytics,
            config,
        }
    }

    /// Handles one event and returns its reply. Events of the same user
    /// are serialized here.
    pub async fn handle(&self, event: &Inbound) -> Reply {
        let session = self.conversations.session(event.user.id).await;
        self.respond(&session, event).await
    }

    /// Handles one event and delivers its reply while still holding the
    /// user's session, so replies reach the user in arrival order.
    pub async fn handle_and_deliver(&self, event: &Inbound, sink: &dyn ReplySink) -> Result<()> {
        let session = self.conversations.session(event.user.id).await;
        let reply = self.respond(&session, event).await;
        sink.deliver(&event.user, reply).await
    }

    async fn respond(&self, session: &FlowSession<'_>, event: &Inbound) -> Reply {
        let user = &event.user;
        self.analytics.record_user_seen(user).await;

        match &event.kind {
            InboundKind::Command { name, args } => {
                self.handle_command(session, user, name, args).await
            }
            InboundKind::Callback { payload } => self.handle_selection(session, payload).await,
            InboundKind::Text(text) => self.handle_text(session, user, text).await,
        }
    }

    async fn handle_command(
        &self,
        session: &FlowSession<'_>,
        user: &ChatUser,
        name: &str,
        args: &[String],
    ) -> Reply {
        let Some(command) = Command::parse(name) else {
            debug!(command = name, "Unknown command");
            return replies::unknown_command(name);
        };

        // Any command ends a wizard in progress
        if session.cancel().await && command != Command::Cancel {
            info!(
                user = %user.id,
                command = command.as_str(),
                "Command interrupted conversion flow"
            );
        }
        self.analytics
            .record_command(command.as_str(), user.id)
            .await;

        let referral = self.config.referral_link.as_deref();
        match command {
            Command::Start => replies::welcome(user, referral),
            Command::Help => replies::help(),
            Command::Rates => self.rates_command(args).await,
            Command::Currencies => self.currencies_command().await,
            Command::Compare => self.compare_command(args).await,
            Command::Convert => {
                session.start_flow().await;
                replies::choose_base(&self.config.popular_currencies)
            }
            Command::Cancel => replies::cancelled(),
        }
    }

    async fn rates_command(&self, args: &[String]) -> Reply {
        let base = match args.first() {
            Some(raw) => match CurrencyCode::new(raw) {
                Ok(code) => code,
                Err(_) => return replies::invalid_code(raw),
            },
            None => self.config.default_base_currency.clone(),
        };

        match self.rates.get_rates(&base).await {
            Ok(table) if !table.is_empty() => replies::rates(
                &table,
                &self.config.popular_currencies,
                self.config.referral_link.as_deref(),
            ),
            Ok(_) => replies::rates_unavailable(&base),
            Err(e @ RateError::ProviderUnreachable(_)) => {
                warn!(error = %e, %base, "Rates lookup failed");
                replies::try_again_later()
            }
            Err(e) => {
                warn!(error = %e, %base, "Rates lookup failed");
                replies::rates_unavailable(&base)
            }
        }
    }

    async fn currencies_command(&self) -> Reply {
        match self
            .rates
            .get_rates(&self.config.default_base_currency)
            .await
        {
            Ok(table) => replies::currencies(&table, &self.config.popular_currencies),
            Err(e) => {
                warn!(error = %e, "Currency listing failed");
                replies::currencies_unavailable()
            }
        }
    }

    async fn compare_command(&self, args: &[String]) -> Reply {
        let mut codes = Vec::with_capacity(args.len());
        for raw in args {
            match CurrencyCode::new(raw) {
                Ok(code) => codes.push(code),
                Err(_) => return replies::invalid_code(raw),
            }
        }
        let Some((base, targets)) = codes.split_first().filter(|(_, t)| !t.is_empty()) else {
            return replies::compare_usage();
        };

        match self.rates.get_rates(base).await {
            Ok(table) => {
                let mut entries: Vec<(CurrencyCode, f64)> = Vec::new();
                for target in targets {
                    if entries.iter().any(|(code, _)| code == target) {
                        continue;
                    }
                    if let Some(rate) = table.rate(target) {
                        entries.push((target.clone(), rate));
                    }
                }
                if entries.is_empty() {
                    replies::comparison_empty(base)
                } else {
                    replies::comparison(base, &entries, self.config.referral_link.as_deref())
                }
            }
            Err(e @ RateError::ProviderUnreachable(_)) => {
                warn!(error = %e, %base, "Comparison failed");
                replies::try_again_later()
            }
            Err(e) => {
                warn!(error = %e, %base, "Comparison failed");
                replies::comparison_empty(base)
            }
        }
    }

    async fn handle_selection(&self, session: &FlowSession<'_>, payload: &str) -> Reply {
        let Some(state) = session.state().await else {
            debug!(payload, "Selection without an active flow");
            return replies::no_active_flow();
        };
        let code = match CurrencyCode::new(payload) {
            Ok(code) => code,
            Err(_) => return replies::invalid_code(payload),
        };

        let step = match state {
            ConversationState::AwaitingBase => session.choose_base(code).await,
            ConversationState::AwaitingTarget { .. } => session.choose_target(code).await,
            ConversationState::AwaitingAmount { .. } => {
                Err(WizardError::UnexpectedStep(state.stage_name()))
            }
        };

        match step {
            Ok(ConversationState::AwaitingTarget { base }) => {
                replies::choose_target(&base, &self.config.popular_currencies)
            }
            Ok(ConversationState::AwaitingAmount { base, target }) => {
                replies::enter_amount(&base, &target)
            }
            Ok(ConversationState::AwaitingBase) => {
                replies::choose_base(&self.config.popular_currencies)
            }
            Err(e) => self.wizard_error_reply(e),
        }
    }

    async fn handle_text(&self, session: &FlowSession<'_>, user: &ChatUser, text: &str) -> Reply {
        if let Some(ConversationState::AwaitingAmount { .. }) = session.state().await {
            return match session.submit_amount(text, &self.converter).await {
                Ok(conversion) => self.completed(user, conversion).await,
                Err(e) => self.wizard_error_reply(e),
            };
        }

        let Some(intent) = parser::parse(text) else {
            debug!(user = %user.id, "Text did not match a conversion request");
            return replies::not_understood();
        };

        let (source, target) = (intent.source.clone(), intent.target.clone());
        match self
            .converter
            .run(intent.amount, intent.source, intent.target)
            .await
        {
            Ok(conversion) => self.completed(user, conversion).await,
            Err(e) => self.conversion_error_reply(&source, &target, e),
        }
    }

    async fn completed(&self, user: &ChatUser, conversion: Conversion) -> Reply {
        info!(
            user = %user.id,
            source = %conversion.source,
            target = %conversion.target,
            amount = conversion.amount,
            "Conversion completed"
        );
        self.analytics
            .record_conversion(
                &conversion.source,
                &conversion.target,
                conversion.amount,
                user.id,
            )
            .await;
        replies::conversion(&conversion, self.config.referral_link.as_deref())
    }

    fn wizard_error_reply(&self, error: WizardError) -> Reply {
        match error {
            WizardError::NoActiveFlow => replies::no_active_flow(),
            WizardError::UnexpectedStep(_) => replies::unexpected_step(),
            WizardError::InvalidAmount(_) => replies::invalid_amount(),
            WizardError::Conversion {
                base,
                target,
                error,
            } => self.conversion_error_reply(&base, &target, error),
        }
    }

    fn conversion_error_reply(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
        error: ConversionError,
    ) -> Reply {
        warn!(error = %error, %source, %target, "Conversion failed");
        match error {
            ConversionError::RateUnavailable(RateError::ProviderUnreachable(_)) => {
                replies::try_again_later()
            }
            ConversionError::RateUnavailable(RateError::ProviderRejected(_)) => {
                replies::conversion_failed(source, target)
            }
            ConversionError::TargetNotFound(code) => replies::unknown_currency(&code),
        }
    }
}
