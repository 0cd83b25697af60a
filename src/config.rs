//! Process configuration resolved once from the environment
//!
//! Environment variables:
//! - PRICEWATCH_HOST / PRICEWATCH_PORT: bind address (default 0.0.0.0:8080)
//! - PRICEWATCH_TICK_INTERVAL_SECS: seconds between checks (default 20)
//! - PRICEWATCH_FETCH_TIMEOUT_SECS: per-fetch limit (default 15)
//! - PRICEWATCH_MAX_CONCURRENCY: checks in flight per tick, 0 = unbounded (default 0)
//! - PRICEWATCH_DRAIN_ON_SHUTDOWN: finish the running tick on stop (default true)
//! - PRICEWATCH_DATABASE_PATH: SQLite file (default ./pricewatch_data/pricewatch.db)
//! - PRICEWATCH_RECIPIENTS: comma-separated alert recipients
//! - PRICEWATCH_NOTIFIER: log | webhook | email (default log)
//! - PRICEWATCH_WEBHOOK_URL, PRICEWATCH_WEBHOOK_HEADERS (`Name:value,Name:value`)
//! - PRICEWATCH_SMTP_HOST, PRICEWATCH_SMTP_PORT, PRICEWATCH_SMTP_USERNAME,
//!   PRICEWATCH_SMTP_PASSWORD, PRICEWATCH_SMTP_FROM
//! - PRICEWATCH_PRICE_PATTERN: regex whose first group is the price
//! - PRICEWATCH_ALLOWED_HOSTS: comma-separated hosts that may be tracked
//! - PRICEWATCH_USER_AGENT: user agent for page fetches

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::fetch::http::{HttpFetcherConfig, DEFAULT_PRICE_PATTERN, DEFAULT_USER_AGENT};
use crate::monitor::SchedulerConfig;
use crate::notify::{EmailConfig, NotifierConfig, WebhookConfig};

/// Complete process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
    /// `None` means unbounded
    pub max_concurrency: Option<usize>,
    pub drain_on_shutdown: bool,
    pub database_path: PathBuf,
    pub recipients: Vec<String>,
    pub notifier: NotifierConfig,
    pub price_pattern: String,
    pub allowed_hosts: Vec<String>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            tick_interval: Duration::from_secs(20),
            fetch_timeout: Duration::from_secs(15),
            max_concurrency: None,
            drain_on_shutdown: true,
            database_path: PathBuf::from("./pricewatch_data/pricewatch.db"),
            recipients: Vec::new(),
            notifier: NotifierConfig::Log,
            price_pattern: DEFAULT_PRICE_PATTERN.to_string(),
            allowed_hosts: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let defaults = Config::default();

        let tick_interval = env.parse_secs("PRICEWATCH_TICK_INTERVAL_SECS", defaults.tick_interval)?;
        let fetch_timeout = env.parse_secs("PRICEWATCH_FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?;
        let max_concurrency = match env.parse("PRICEWATCH_MAX_CONCURRENCY", 0usize)? {
            0 => None,
            n => Some(n),
        };

        let notifier = match env
            .get("PRICEWATCH_NOTIFIER")
            .unwrap_or_else(|| "log".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "log" => NotifierConfig::Log,
            "webhook" => NotifierConfig::Webhook(WebhookConfig {
                url: env.require("PRICEWATCH_WEBHOOK_URL")?,
                headers: parse_headers(&env.get("PRICEWATCH_WEBHOOK_HEADERS").unwrap_or_default())?,
                timeout: fetch_timeout,
            }),
            "email" => NotifierConfig::Email(EmailConfig {
                smtp_host: env.require("PRICEWATCH_SMTP_HOST")?,
                smtp_port: env.parse("PRICEWATCH_SMTP_PORT", 587u16)?,
                username: env.require("PRICEWATCH_SMTP_USERNAME")?,
                password: env.require("PRICEWATCH_SMTP_PASSWORD")?,
                from: env.get("PRICEWATCH_SMTP_FROM").unwrap_or_default(),
                timeout: fetch_timeout,
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "PRICEWATCH_NOTIFIER",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            host: env.get("PRICEWATCH_HOST").unwrap_or(defaults.host),
            port: env.parse("PRICEWATCH_PORT", defaults.port)?,
            tick_interval,
            fetch_timeout,
            max_concurrency,
            drain_on_shutdown: env.parse_bool("PRICEWATCH_DRAIN_ON_SHUTDOWN", true)?,
            database_path: env
                .get("PRICEWATCH_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            recipients: split_list(&env.get("PRICEWATCH_RECIPIENTS").unwrap_or_default()),
            notifier,
            price_pattern: env
                .get("PRICEWATCH_PRICE_PATTERN")
                .unwrap_or(defaults.price_pattern),
            allowed_hosts: split_list(&env.get("PRICEWATCH_ALLOWED_HOSTS").unwrap_or_default()),
            user_agent: env.get("PRICEWATCH_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.tick_interval,
            max_concurrency: self.max_concurrency,
            drain_on_shutdown: self.drain_on_shutdown,
        }
    }

    pub fn fetcher(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            price_pattern: self.price_pattern.clone(),
            allowed_hosts: self.allowed_hosts.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.fetch_timeout,
        }
    }

    pub fn notifier_name(&self) -> &'static str {
        match self.notifier {
            NotifierConfig::Log => "log",
            NotifierConfig::Webhook(_) => "webhook",
            NotifierConfig::Email(_) => "email",
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value for a key
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value: raw }),
            None => Ok(default),
        }
    }

    /// Whole seconds, must be non-zero
    fn parse_secs(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.parse(key, default.as_secs())? {
            0 => Err(ConfigError::Invalid {
                key,
                value: "0".to_string(),
            }),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    fn parse_bool(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid { key, value: raw }),
            },
            None => Ok(default),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `Name:value,Name:value`
fn parse_headers(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::Invalid {
                key: "PRICEWATCH_WEBHOOK_HEADERS",
                value: pair,
            }),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}
