use std::env;

use crate::engine::DispatchPolicy;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub search_radius_km: f64,
    pub retry_after_secs: i64,
    pub max_retries: Option<u32>,
    pub retry_sweep_interval_ms: u64,
    pub notification_channel: String,
    pub push_gateway_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            search_radius_km: parse_or_default("SEARCH_RADIUS_KM", 5.0)?,
            retry_after_secs: parse_or_default("RETRY_AFTER_SECS", 30)?,
            max_retries: parse_optional("MAX_RETRIES")?,
            retry_sweep_interval_ms: parse_or_default("RETRY_SWEEP_INTERVAL_MS", 5_000)?,
            notification_channel: env::var("NOTIFICATION_CHANNEL")
                .unwrap_or_else(|_| "delivery_requests".to_string()),
            push_gateway_url: env::var("PUSH_GATEWAY_URL").ok().filter(|url| !url.is_empty()),
        })
    }

    pub fn dispatch_policy(&self) -> Result<DispatchPolicy, AppError> {
        if self.search_radius_km <= 0.0 {
            return Err(AppError::Internal(
                "SEARCH_RADIUS_KM must be positive".to_string(),
            ));
        }
        if self.retry_after_secs <= 0 {
            return Err(AppError::Internal(
                "RETRY_AFTER_SECS must be positive".to_string(),
            ));
        }

        Ok(DispatchPolicy {
            radius_km: self.search_radius_km,
            retry_after: chrono::Duration::seconds(self.retry_after_secs),
            max_retries: self.max_retries,
            notification_channel: self.notification_channel.clone(),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(None),
    }
}
