use crate::adapters::histogram::{SlotHistogramBuilder, SlotThresholds};
use crate::config::AppenderConfig;
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File layout:
///
/// ```toml
/// [appender]
/// mode = "parallel"
/// max_threads = 16
/// shutdown_grace_secs = 10
///
/// [histogram]
/// fast_ms = 1000
/// normal_ms = 3000
/// slow_ms = 5000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub appender: AppenderConfig,
    #[serde(default)]
    pub histogram: SlotThresholds,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnrichError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EnrichError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${APPENDER_MODE})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EnrichError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn histogram_builder(&self) -> SlotHistogramBuilder {
        SlotHistogramBuilder::new(self.histogram)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.appender.validate()?;
        self.histogram.validate()
    }
}
