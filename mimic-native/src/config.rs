//! Application configuration.
//!
//! Loaded from the environment, with a `.env` file read first when present.

use std::env;
use std::time::Duration;

use thiserror::Error;

use mimic_core::models::config::{BattleConfig, CaptureConfig};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the analysis backend.
    pub api_url: String,
    /// Input device name; `None` uses the system default.
    pub input_device: Option<String>,
    /// Output device name; `None` uses the system default.
    pub output_device: Option<String>,
    pub capture_window: Duration,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            input_device: None,
            output_device: None,
            capture_window: BattleConfig::default().capture_window,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let capture_window = match get("MIMIC_CAPTURE_MS") {
            Some(raw) => parse_millis("MIMIC_CAPTURE_MS", &raw)?,
            None => defaults.capture_window,
        };
        let http_timeout = match get("MIMIC_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError::InvalidValue("MIMIC_HTTP_TIMEOUT_SECS".into(), raw))?,
            None => defaults.http_timeout,
        };

        Ok(Self {
            api_url: get("MIMIC_API_URL").unwrap_or(defaults.api_url),
            input_device: get("MIMIC_INPUT_DEVICE"),
            output_device: get("MIMIC_OUTPUT_DEVICE"),
            capture_window,
            http_timeout,
        })
    }

    pub fn battle_config(&self) -> BattleConfig {
        BattleConfig {
            capture_window: self.capture_window,
            ..BattleConfig::default()
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig::default()
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), raw.to_string()))
}
