//! read configuration from a file, the environment, or explicit values

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::dedup::EvictionPolicy;
use crate::errors::Error;
use crate::retry::{JitterStrategy, RetryPlan};

const DEFAULT_DEDUP_TTL_MS: u64 = 1_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;
const DEFAULT_MAX_IN_FLIGHT: usize = 1_024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_MAX_ATTEMPTS: u8 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub base_url: String,
    pub dedup_ttl_ms: Option<u64>,
    pub sweep_interval_ms: Option<u64>,
    pub eviction: Option<String>,
    pub max_in_flight: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub retry_max_attempts: Option<u8>,
    pub retry_delay_ms: Option<u64>,
    pub retry_jitter: Option<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Config(format!("Malformed config file '{}': {}", path.display(), e))
        })
    }

    pub fn from_env() -> Result<Self, Error> {
        Ok(Config {
            base_url: std::env::var("ACCOUNTABLE_API_URL")
                .map_err(|_| Error::Config("Missing ACCOUNTABLE_API_URL env var".to_string()))?,
            dedup_ttl_ms: env_parsed("ACCOUNTABLE_DEDUP_TTL_MS")?,
            sweep_interval_ms: env_parsed("ACCOUNTABLE_SWEEP_INTERVAL_MS")?,
            eviction: std::env::var("ACCOUNTABLE_EVICTION").ok(),
            max_in_flight: env_parsed("ACCOUNTABLE_MAX_IN_FLIGHT")?,
            request_timeout_secs: env_parsed("ACCOUNTABLE_REQUEST_TIMEOUT_SECS")?,
            retry_max_attempts: env_parsed("ACCOUNTABLE_RETRY_MAX_ATTEMPTS")?,
            retry_delay_ms: env_parsed("ACCOUNTABLE_RETRY_DELAY_MS")?,
            retry_jitter: std::env::var("ACCOUNTABLE_RETRY_JITTER").ok(),
        })
    }

    /// Config with the given base URL and every tunable at its default.
    pub fn from_values(
        base_url: impl Into<String>,
        dedup_ttl_ms: Option<u64>,
        sweep_interval_ms: Option<u64>,
        eviction: Option<String>,
        max_in_flight: Option<usize>,
    ) -> Self {
        Config {
            base_url: base_url.into(),
            dedup_ttl_ms,
            sweep_interval_ms,
            eviction,
            max_in_flight,
            request_timeout_secs: None,
            retry_max_attempts: None,
            retry_delay_ms: None,
            retry_jitter: None,
        }
    }

    /// Normalized base URL: scheme added when missing, no trailing slash.
    pub fn validated_base_url(&self) -> Result<String, Error> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        let base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };
        reqwest::Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", base, e)))?;
        Ok(base)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_millis(self.dedup_ttl_ms.unwrap_or(DEFAULT_DEDUP_TTL_MS))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.unwrap_or(DEFAULT_SWEEP_INTERVAL_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn eviction_policy(&self) -> Result<EvictionPolicy, Error> {
        let max_entries = self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT);
        if max_entries == 0 {
            return Err(Error::Config("max_in_flight must be > 0".into()));
        }
        match self.eviction.as_deref() {
            None => Ok(EvictionPolicy::SettledOnly { max_entries }),
            Some(raw) => match EvictionPolicy::from_str(raw)? {
                EvictionPolicy::SettledOnly { .. } => Ok(EvictionPolicy::SettledOnly { max_entries }),
                EvictionPolicy::AgeSweep { .. } => Ok(EvictionPolicy::AgeSweep {
                    ttl: self.dedup_ttl(),
                }),
            },
        }
    }

    pub fn retry_plan(&self) -> Result<RetryPlan, Error> {
        let max_attempts = self.retry_max_attempts.unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(Error::Config("retry_max_attempts must be >= 1".into()));
        }
        let jitter = match self.retry_jitter.as_deref() {
            Some(name) => name.parse()?,
            None => JitterStrategy::None,
        };
        Ok(RetryPlan::new(
            max_attempts,
            Duration::from_millis(self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS)),
            jitter,
        ))
    }
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value '{}' for {} env var", raw, name))),
        Err(_) => Ok(None),
    }
}
