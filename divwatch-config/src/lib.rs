//! Configuration loading and typed settings for divwatch.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;

mod tickers;

pub use tickers::{load_tickers, parse_tickers};

pub const DEFAULT_CONFIG_PATH: &str = "config/divwatch.toml";
pub const ENV_PREFIX: &str = "DIVWATCH";

/// Top-level settings for a monitoring run.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Minimum absolute relative change that triggers an alert.
    pub threshold: Decimal,
    pub state_path: PathBuf,
    pub tickers_path: PathBuf,
    /// Ticker written to a freshly created ticker list.
    pub default_ticker: String,
    /// Maximum number of tickers processed concurrently.
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub source: SourceConfig,
    pub alerts: AlertConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            threshold: Decimal::new(20, 2),
            state_path: PathBuf::from("data/dividends_data.json"),
            tickers_path: PathBuf::from("config/tickers.txt"),
            default_ticker: "AAPL".to_string(),
            concurrency: 4,
            fetch_timeout_secs: 30,
            source: SourceConfig::default(),
            alerts: AlertConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then the TOML file, then `DIVWATCH__*` environment overrides.
    ///
    /// An explicitly supplied path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        let settings = Config::builder()
            .add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", file.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold.is_sign_negative() {
            bail!("threshold must not be negative (got {})", self.threshold);
        }
        if self.default_ticker.trim().is_empty() {
            bail!("default_ticker must not be empty");
        }
        if self.alerts.channel == AlertChannel::Webhook && self.alerts.webhook_url.is_none() {
            bail!("alerts.channel = \"webhook\" requires alerts.webhook_url");
        }
        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Market data provider settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub requests_per_second: u32,
    pub user_agent: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            requests_per_second: 2,
            user_agent: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    #[default]
    Log,
    Webhook,
}

/// Where alerts are delivered.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub channel: AlertChannel,
    pub webhook_url: Option<String>,
    /// Prepended to every alert subject, e.g. `"[prod] "`.
    pub subject_prefix: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
    /// When set, logs are also written to a daily-rotated file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}
