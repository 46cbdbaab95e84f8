//! Configuration loading for the notifier service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `NOTIFIER_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "NOTIFIER_";
const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `NOTIFIER_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// HS256 secret used to verify bearer tokens on the RPC surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_profile_service_url")]
    pub profile_service_url: String,
    #[serde(default = "default_email_service_url")]
    pub email_service_url: String,
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Message bus connection and subject names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BusConfig {
    /// Environment variable: `NOTIFIER_NATS_URL`
    #[serde(default = "default_nats_url")]
    pub url: String,
    /// Inbound subject the dispatcher consumes.
    ///
    /// Environment variable: `NOTIFIER_NATS_SUBJECT`
    #[serde(default = "default_nats_subject")]
    pub subject: String,
    /// Competing-consumer group shared by every dispatcher instance.
    ///
    /// Environment variable: `NOTIFIER_NATS_QUEUE_GROUP`
    #[serde(default = "default_nats_queue_group")]
    pub queue_group: String,
    /// Environment variable: `NOTIFIER_NATS_REALTIME_SUBJECT`
    #[serde(default = "default_nats_realtime_subject")]
    pub realtime_subject: String,
}

/// Event dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DispatcherConfig {
    /// Maximum number of messages handled concurrently (default: 64)
    ///
    /// When every slot is busy the dispatcher stops pulling from the
    /// subscription until one frees up.
    ///
    /// Environment variable: `NOTIFIER_DISPATCHER_MAX_IN_FLIGHT`
    #[serde(default = "default_dispatcher_max_in_flight")]
    pub max_in_flight: usize,

    /// Timeout wrapping persist-and-republish of one notification (default: 5000)
    ///
    /// Environment variable: `NOTIFIER_DISPATCHER_PERSIST_TIMEOUT_MS`
    #[serde(default = "default_dispatcher_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
}

/// Telegram bot adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TelegramConfig {
    /// Environment variable: `NOTIFIER_TELEGRAM_BOT_TOKEN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Environment variable: `NOTIFIER_TELEGRAM_API_BASE`
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Base URL the activation token is appended to.
    ///
    /// Environment variable: `NOTIFIER_TELEGRAM_ACTIVATION_URL`
    #[serde(default = "default_telegram_activation_url")]
    pub activation_url: String,
    /// Lifetime of registration codes and tokens (default: 300)
    ///
    /// Environment variable: `NOTIFIER_TELEGRAM_CODE_TTL_SECONDS`
    #[serde(default = "default_telegram_code_ttl_seconds")]
    pub code_ttl_seconds: u32,
    /// Environment variable: `NOTIFIER_TELEGRAM_POLL_TIMEOUT_SECONDS`
    #[serde(default = "default_telegram_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
    /// Environment variable: `NOTIFIER_BRAND_NAME`
    #[serde(default = "default_brand_name")]
    pub brand_name: String,
    /// Environment variable: `NOTIFIER_ALERT_LINK_BASE`
    #[serde(default = "default_alert_link_base")]
    pub alert_link_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            jwt_secret: None,
            profile_service_url: default_profile_service_url(),
            email_service_url: default_email_service_url(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            bus: BusConfig::default(),
            dispatcher: DispatcherConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            subject: default_nats_subject(),
            queue_group: default_nats_queue_group(),
            realtime_subject: default_nats_realtime_subject(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_dispatcher_max_in_flight(),
            persist_timeout_ms: default_dispatcher_persist_timeout_ms(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
            activation_url: default_telegram_activation_url(),
            code_ttl_seconds: default_telegram_code_ttl_seconds(),
            poll_timeout_seconds: default_telegram_poll_timeout_seconds(),
            brand_name: default_brand_name(),
            alert_link_base: default_alert_link_base(),
        }
    }
}

impl DispatcherConfig {
    /// Validate dispatcher bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 || self.max_in_flight > 1024 {
            return Err(ConfigError::InvalidDispatcherConcurrency {
                value: self.max_in_flight,
            });
        }

        if self.persist_timeout_ms == 0 {
            return Err(ConfigError::InvalidPersistTimeout);
        }

        Ok(())
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

impl TelegramConfig {
    /// Validate telegram settings; the bot token is only mandatory outside local/test.
    pub fn validate(&self, profile: &str) -> Result<(), ConfigError> {
        if !is_dev_profile(profile) && self.bot_token.is_none() {
            return Err(ConfigError::MissingTelegramBotToken);
        }

        if self.code_ttl_seconds == 0 {
            return Err(ConfigError::InvalidCodeTtl);
        }

        if self.poll_timeout_seconds == 0 || self.poll_timeout_seconds > 50 {
            return Err(ConfigError::InvalidPollTimeout {
                value: self.poll_timeout_seconds,
            });
        }

        for (name, value) in [
            ("TELEGRAM_API_BASE", &self.api_base),
            ("TELEGRAM_ACTIVATION_URL", &self.activation_url),
            ("ALERT_LINK_BASE", &self.alert_link_base),
        ] {
            validate_url(name, value)?;
        }

        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.jwt_secret.is_some() {
            config.jwt_secret = Some(REDACTED.to_string());
        }
        if config.telegram.bot_token.is_some() {
            config.telegram.bot_token = Some(REDACTED.to_string());
        }
        // Connection strings may embed credentials.
        if config.database_url.contains('@') {
            config.database_url = REDACTED.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_dev_profile(&self.profile) {
            if self.jwt_secret.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingJwtSecret);
            }
            if self.database_url.starts_with("sqlite::memory:") {
                return Err(ConfigError::EphemeralDatabase {
                    profile: self.profile.clone(),
                });
            }
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        validate_url("PROFILE_SERVICE_URL", &self.profile_service_url)?;
        validate_url("EMAIL_SERVICE_URL", &self.email_service_url)?;

        if self.upstream_timeout_ms == 0 {
            return Err(ConfigError::InvalidUpstreamTimeout);
        }

        self.dispatcher.validate()?;
        self.telegram.validate(&self.profile)?;

        Ok(())
    }
}

fn is_dev_profile(profile: &str) -> bool {
    matches!(profile, "local" | "test")
}

fn validate_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|source| ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
            source,
        })
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_profile_service_url() -> String {
    "http://localhost:9001".to_string()
}

fn default_email_service_url() -> String {
    "http://localhost:9002".to_string()
}

fn default_upstream_timeout_ms() -> u64 {
    5000
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_nats_subject() -> String {
    "notification".to_string()
}

fn default_nats_queue_group() -> String {
    "notification-workers".to_string()
}

fn default_nats_realtime_subject() -> String {
    "realtime".to_string()
}

fn default_dispatcher_max_in_flight() -> usize {
    64
}

fn default_dispatcher_persist_timeout_ms() -> u64 {
    5000
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_activation_url() -> String {
    "http://localhost:3000/telegram/activation".to_string()
}

fn default_telegram_code_ttl_seconds() -> u32 {
    300
}

fn default_telegram_poll_timeout_seconds() -> u64 {
    30
}

fn default_brand_name() -> String {
    "INDIKAY".to_string()
}

fn default_alert_link_base() -> String {
    "https://indikay.com/crypto".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("jwt secret is missing; set NOTIFIER_JWT_SECRET")]
    MissingJwtSecret,
    #[error("telegram bot token is missing; set NOTIFIER_TELEGRAM_BOT_TOKEN")]
    MissingTelegramBotToken,
    #[error("profile '{profile}' cannot run on an in-memory database; set NOTIFIER_DATABASE_URL")]
    EphemeralDatabase { profile: String },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("invalid {name} '{value}': {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("upstream timeout must be positive")]
    InvalidUpstreamTimeout,
    #[error("dispatcher max in-flight must be between 1 and 1024, got {value}")]
    InvalidDispatcherConcurrency { value: usize },
    #[error("dispatcher persist timeout must be positive")]
    InvalidPersistTimeout,
    #[error("telegram code ttl must be positive")]
    InvalidCodeTtl,
    #[error("telegram poll timeout must be between 1 and 50 seconds, got {value}")]
    InvalidPollTimeout { value: u64 },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Loads configuration using layered `.env` files and `NOTIFIER_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads, validates and returns the configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| layered.remove(key).filter(|v| !v.trim().is_empty());

        let profile = take("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = take("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take("LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url = take("DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = parse_number("DB_MAX_CONNECTIONS", take("DB_MAX_CONNECTIONS"))?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms =
            parse_number("DB_ACQUIRE_TIMEOUT_MS", take("DB_ACQUIRE_TIMEOUT_MS"))?
                .unwrap_or_else(default_db_acquire_timeout_ms);
        let jwt_secret = take("JWT_SECRET");
        let profile_service_url =
            take("PROFILE_SERVICE_URL").unwrap_or_else(default_profile_service_url);
        let email_service_url = take("EMAIL_SERVICE_URL").unwrap_or_else(default_email_service_url);
        let upstream_timeout_ms = parse_number("UPSTREAM_TIMEOUT_MS", take("UPSTREAM_TIMEOUT_MS"))?
            .unwrap_or_else(default_upstream_timeout_ms);

        let bus = BusConfig {
            url: take("NATS_URL").unwrap_or_else(default_nats_url),
            subject: take("NATS_SUBJECT").unwrap_or_else(default_nats_subject),
            queue_group: take("NATS_QUEUE_GROUP").unwrap_or_else(default_nats_queue_group),
            realtime_subject: take("NATS_REALTIME_SUBJECT")
                .unwrap_or_else(default_nats_realtime_subject),
        };

        let dispatcher = DispatcherConfig {
            max_in_flight: parse_number(
                "DISPATCHER_MAX_IN_FLIGHT",
                take("DISPATCHER_MAX_IN_FLIGHT"),
            )?
            .unwrap_or_else(default_dispatcher_max_in_flight),
            persist_timeout_ms: parse_number(
                "DISPATCHER_PERSIST_TIMEOUT_MS",
                take("DISPATCHER_PERSIST_TIMEOUT_MS"),
            )?
            .unwrap_or_else(default_dispatcher_persist_timeout_ms),
        };

        let telegram = TelegramConfig {
            bot_token: take("TELEGRAM_BOT_TOKEN"),
            api_base: take("TELEGRAM_API_BASE").unwrap_or_else(default_telegram_api_base),
            activation_url: take("TELEGRAM_ACTIVATION_URL")
                .unwrap_or_else(default_telegram_activation_url),
            code_ttl_seconds: parse_number(
                "TELEGRAM_CODE_TTL_SECONDS",
                take("TELEGRAM_CODE_TTL_SECONDS"),
            )?
            .unwrap_or_else(default_telegram_code_ttl_seconds),
            poll_timeout_seconds: parse_number(
                "TELEGRAM_POLL_TIMEOUT_SECONDS",
                take("TELEGRAM_POLL_TIMEOUT_SECONDS"),
            )?
            .unwrap_or_else(default_telegram_poll_timeout_seconds),
            brand_name: take("BRAND_NAME").unwrap_or_else(default_brand_name),
            alert_link_base: take("ALERT_LINK_BASE").unwrap_or_else(default_alert_link_base),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            jwt_secret,
            profile_service_url,
            email_service_url,
            upstream_timeout_ms,
            bus,
            dispatcher,
            telegram,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_in_local_profile() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatcher.persist_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn production_profile_requires_secrets() {
        let mut config = AppConfig {
            profile: "production".to_string(),
            database_url: "postgres://notifier@db/notifier".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingJwtSecret)
        ));

        config.jwt_secret = Some("secret".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingTelegramBotToken)
        ));

        config.telegram.bot_token = Some("123:abc".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dispatcher_bounds_are_enforced() {
        let mut dispatcher = DispatcherConfig::default();
        dispatcher.max_in_flight = 0;
        assert!(dispatcher.validate().is_err());

        dispatcher.max_in_flight = 8;
        dispatcher.persist_timeout_ms = 0;
        assert!(matches!(
            dispatcher.validate(),
            Err(ConfigError::InvalidPersistTimeout)
        ));
    }

    #[test]
    fn zero_code_ttl_is_rejected() {
        let mut telegram = TelegramConfig::default();
        telegram.code_ttl_seconds = 0;
        assert!(matches!(
            telegram.validate("local"),
            Err(ConfigError::InvalidCodeTtl)
        ));
    }

    #[test]
    fn redacted_json_masks_secrets() {
        let mut config = AppConfig::default();
        config.jwt_secret = Some("super-secret".to_string());
        config.telegram.bot_token = Some("123:abc".to_string());
        config.database_url = "postgres://user:pw@db/notifier".to_string();

        let json = config.redacted_json().expect("serializes");
        assert!(!json.contains("super-secret"));
        assert!(!json.contains("123:abc"));
        assert!(!json.contains("user:pw"));
    }
}
