pub mod bot;
pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;

use crate::bot::{ConversationStore, Dispatcher};
use crate::core::cache::Store;
use crate::core::config::{AppConfig, ProviderConfig};
use crate::core::{ChatUser, RateProvider};
use crate::providers::{CachingRateProvider, OpenErApiProvider};
use crate::store::KeyValueStore;
use crate::store::usage::UsageLog;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Chat {
        user_id: i64,
        name: Option<String>,
        username: Option<String>,
    },
    Serve,
    Report { month: Option<String> },
}

/// The bot wired from configuration, ready to hand to a transport.
pub struct Services {
    pub dispatcher: Arc<Dispatcher>,
    pub usage: Arc<UsageLog>,
}

fn build_rate_provider(
    config: &ProviderConfig,
    store: &dyn Store,
) -> Result<Arc<dyn RateProvider>> {
    let http = OpenErApiProvider::new(&config.base_url, config.timeout())?;
    match config.cache_ttl() {
        Some(ttl) => {
            let cache = store
                .get_collection("rates", false)
                .context("Failed to open rate cache")?;
            Ok(Arc::new(CachingRateProvider::new(http, cache, ttl)))
        }
        None => {
            debug!("Rate caching disabled");
            Ok(Arc::new(http))
        }
    }
}

pub fn build_services(config: &AppConfig, store: &dyn Store) -> Result<Services> {
    let rates = build_rate_provider(&config.provider, store)?;

    let conversations = store
        .get_collection("conversations", false)
        .context("Failed to open conversation store")?;

    let usage_records = match store.get_collection("usage", true) {
        Some(collection) => collection,
        None => {
            warn!("Usage analytics will not survive a restart");
            store
                .get_collection("usage", false)
                .context("Failed to open usage store")?
        }
    };
    let usage = Arc::new(UsageLog::new(usage_records));

    let dispatcher = Arc::new(Dispatcher::new(
        ConversationStore::new(conversations),
        rates,
        usage.clone(),
        config.bot.clone(),
    ));

    Ok(Services { dispatcher, usage })
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.data_path()?;
    std::fs::create_dir_all(&data_path)
        .with_context(|| format!("Failed to create data directory: {}", data_path.display()))?;
    let store = KeyValueStore::open(&data_path);
    let services = build_services(&config, &store)?;

    match command {
        AppCommand::Chat {
            user_id,
            name,
            username,
        } => {
            let mut user = ChatUser::new(user_id);
            if let Some(name) = name {
                user = user.with_first_name(name);
            }
            if let Some(username) = username {
                user = user.with_username(username);
            }
            info!(user = %user.id, "Starting console chat");
            cli::chat::run(services.dispatcher, user).await
        }
        AppCommand::Serve => {
            let state = server::ServerState::new(services.usage);
            server::serve(&config.server.bind, state).await
        }
        AppCommand::Report { month } => {
            let month = match month {
                Some(month) => month,
                None => chrono::Local::now().format("%Y-%m").to_string(),
            };
            cli::report::run(services.usage.as_ref(), &month).await
        }
    }
}
