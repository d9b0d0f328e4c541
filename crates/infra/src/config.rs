//! Service configuration, read from environment variables.
//!
//! `Settings::from_env` reads the process environment; `Settings::from_lookup`
//! takes any key lookup so tests never touch global state.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use mailq_core::DEFAULT_MAX_ATTEMPTS;
pub use mailq_observability::LogFormat;

use crate::queue::RetryPolicy;
use crate::transport::SmtpSettings;
use crate::worker::WorkerConfig;

/// Development-only signing secret used when `JWT_SECRET` is unset.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{key} is required when {because}")]
    Missing {
        key: &'static str,
        because: &'static str,
    },
}

/// Which transport delivers mail.
#[derive(Debug, Clone)]
pub enum TransportSettings {
    /// Log instead of sending, with an optional simulated delay.
    Log { delay: Duration },
    Smtp(SmtpSettings),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `true` when `JWT_SECRET` was absent and the dev secret is in use.
    pub jwt_secret_is_default: bool,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub worker: WorkerConfig,
    pub default_max_attempts: u32,
    pub autostart_worker: bool,
    pub transport: TransportSettings,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let (jwt_secret, jwt_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEV_JWT_SECRET.to_string(), true),
        };

        let poll_ms: u64 = parse_or(&get, "EMAIL_WORKER_POLL_INTERVAL_MS", 5_000)?;
        let max_concurrent: usize = parse_or(&get, "EMAIL_WORKER_MAX_CONCURRENT", 5)?;
        let default_max_attempts: u32 = parse_or(&get, "EMAIL_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let retry_base_secs: u64 = parse_or(&get, "EMAIL_RETRY_BASE_SECS", 60)?;

        at_least_one("EMAIL_WORKER_POLL_INTERVAL_MS", poll_ms)?;
        at_least_one("EMAIL_WORKER_MAX_CONCURRENT", max_concurrent as u64)?;
        at_least_one("EMAIL_MAX_ATTEMPTS", u64::from(default_max_attempts))?;

        let worker = WorkerConfig::default()
            .with_poll_interval(Duration::from_millis(poll_ms))
            .with_max_concurrent(max_concurrent)
            .with_retry(RetryPolicy::exponential(Duration::from_secs(retry_base_secs)));

        let autostart_worker = parse_bool(&get, "EMAIL_WORKER_AUTOSTART", false)?;

        let transport = match get("EMAIL_TRANSPORT").as_deref().unwrap_or("log") {
            "log" => TransportSettings::Log {
                delay: Duration::from_millis(parse_or(&get, "LOG_TRANSPORT_DELAY_MS", 0)?),
            },
            "smtp" => TransportSettings::Smtp(SmtpSettings {
                host: get("SMTP_HOST").ok_or(ConfigError::Missing {
                    key: "SMTP_HOST",
                    because: "EMAIL_TRANSPORT=smtp",
                })?,
                port: parse_or(&get, "SMTP_PORT", 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from: get("EMAIL_FROM").unwrap_or_else(|| "noreply@accucoder.com".to_string()),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "EMAIL_TRANSPORT",
                    value: other.to_string(),
                    reason: "expected 'log' or 'smtp'".into(),
                });
            }
        };

        let log_format = parse_or(&get, "LOG_FORMAT", LogFormat::Json)?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_is_default,
            database_url: get("DATABASE_URL"),
            worker,
            default_max_attempts,
            autostart_worker,
            transport,
            log_format,
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

fn at_least_one(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}
