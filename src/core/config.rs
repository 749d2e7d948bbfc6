use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

use crate::core::currency::CurrencyCode;

fn code(raw: &str) -> CurrencyCode {
    CurrencyCode(raw.to_string())
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Zero disables the rate cache
    pub cache_ttl_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://open.er-api.com/v6/latest".to_string(),
            timeout_secs: 10,
            cache_ttl_secs: 300,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BotConfig {
    pub default_base_currency: CurrencyCode,
    pub popular_currencies: Vec<CurrencyCode>,
    pub referral_link: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            default_base_currency: code("USD"),
            popular_currencies: [
                "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "INR", "BTC",
            ]
            .into_iter()
            .map(code)
            .collect(),
            referral_link: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub bot: BotConfig,
    pub server: ServerConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "currenz", "currenz")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "currenz", "currenz")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        // An empty document deserializes to unit, not to an empty mapping
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.provider.timeout_secs == 0 {
            bail!("provider.timeout_secs must be greater than 0");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/rates"
  timeout_secs: 3
bot:
  default_base_currency: "eur"
  popular_currencies: ["USD", "usdt"]
  referral_link: "https://example.com/invite"
server:
  bind: "127.0.0.1:8080"
data_path: "/tmp/currenz"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/rates");
        assert_eq!(config.provider.timeout(), Duration::from_secs(3));
        // Unset fields keep their defaults
        assert_eq!(config.provider.cache_ttl(), Some(Duration::from_secs(300)));
        assert_eq!(config.bot.default_base_currency.as_str(), "EUR");
        assert_eq!(
            config
                .bot
                .popular_currencies
                .iter()
                .map(CurrencyCode::as_str)
                .collect::<Vec<_>>(),
            vec!["USD", "USDT"]
        );
        assert_eq!(
            config.bot.referral_link.as_deref(),
            Some("https://example.com/invite")
        );
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.data_path.as_deref(), Some("/tmp/currenz"));
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let yaml = "provider:\n  cache_ttl_secs: 0\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.provider.cache_ttl().is_none());
    }

    #[test]
    fn test_invalid_currency_is_rejected() {
        let result = serde_yaml::from_str::<AppConfig>("bot:\n  default_base_currency: \"US\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.provider.base_url,
            "https://open.er-api.com/v6/latest"
        );
        assert_eq!(config.bot.popular_currencies.len(), 10);
        assert_eq!(config.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "provider:\n  timeout_secs: 0\n").unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();

        assert!(err.to_string().contains("timeout_secs"));
    }
}
