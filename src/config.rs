use std::env;
use std::time::Duration;

use crate::engine::CallTimeouts;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// When unset, fares come from the built-in static table.
    pub pricing_service_url: Option<String>,
    pub users_service_url: String,
    pub payment_service_url: String,
    pub pricing_timeout_ms: u64,
    pub driver_timeout_ms: u64,
    pub payment_timeout_ms: u64,
    pub store_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8080)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            pricing_service_url: env::var("PRICING_SERVICE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            users_service_url: env::var("USERS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            payment_service_url: env::var("PAYMENT_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8004".to_string()),
            pricing_timeout_ms: parse_or_default("PRICING_TIMEOUT_MS", 5_000)?,
            driver_timeout_ms: parse_or_default("DRIVER_TIMEOUT_MS", 5_000)?,
            payment_timeout_ms: parse_or_default("PAYMENT_TIMEOUT_MS", 10_000)?,
            store_timeout_ms: parse_or_default("STORE_TIMEOUT_MS", 5_000)?,
        })
    }

    pub fn call_timeouts(&self) -> CallTimeouts {
        CallTimeouts {
            pricing: Duration::from_millis(self.pricing_timeout_ms),
            drivers: Duration::from_millis(self.driver_timeout_ms),
            payment: Duration::from_millis(self.payment_timeout_ms),
            store: Duration::from_millis(self.store_timeout_ms),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
