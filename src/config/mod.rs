#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODE: &str = "serial";
pub const DEFAULT_MAX_THREADS: usize = 16;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentMode {
    Serial,
    Parallel,
}

impl FromStr for EnrichmentMode {
    type Err = EnrichError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(EnrichmentMode::Serial),
            "parallel" => Ok(EnrichmentMode::Parallel),
            _ => Err(EnrichError::InvalidConfigValueError {
                field: "appender.mode".to_string(),
                value: value.to_string(),
                reason: "Mode must be 'serial' or 'parallel'".to_string(),
            }),
        }
    }
}

impl fmt::Display for EnrichmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentMode::Serial => write!(f, "serial"),
            EnrichmentMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Settings of the node histogram appender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppenderConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Worker pool size; only used in parallel mode.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_max_threads() -> usize {
    DEFAULT_MAX_THREADS
}

fn default_shutdown_grace_secs() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_SECS
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            max_threads: default_max_threads(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl AppenderConfig {
    /// 從環境變數讀取設定，未設定的欄位使用預設值
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(mode) = env::var("APPENDER_MODE") {
            config.mode = mode;
        }
        if let Ok(raw) = env::var("APPENDER_MAX_THREADS") {
            config.max_threads = parse_env_number("APPENDER_MAX_THREADS", &raw)?;
        }
        if let Ok(raw) = env::var("APPENDER_SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace_secs = parse_env_number("APPENDER_SHUTDOWN_GRACE_SECS", &raw)?;
        }
        Ok(config)
    }

    pub fn mode(&self) -> Result<EnrichmentMode> {
        self.mode.parse()
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse_env_number<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| EnrichError::InvalidConfigValueError {
            field: name.to_string(),
            value: raw.to_string(),
            reason: "Expected a non-negative integer".to_string(),
        })
}

impl Validate for AppenderConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("appender.mode", &self.mode)?;
        let mode = self.mode()?;
        if mode == EnrichmentMode::Parallel {
            validate_positive_number("appender.max_threads", self.max_threads, 1)?;
        }
        validate_range("appender.shutdown_grace_secs", self.shutdown_grace_secs, 0, 3600)?;
        Ok(())
    }
}
