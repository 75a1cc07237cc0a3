use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Sample source failed for {identity}: {message}")]
    SampleSourceError { identity: String, message: String },

    #[error("Histogram build failed for {identity}: {message}")]
    HistogramBuildError { identity: String, message: String },

    #[error("Unit of work for {identity} did not complete: {message}")]
    UnitAborted { identity: String, message: String },

    #[error("Worker pool is shut down and no longer accepts work")]
    PoolShutdown,

    #[error("Shutdown wait was interrupted: {message}")]
    ShutdownInterrupted { message: String },

    #[error("Invalid time range: from {from} is after to {to}")]
    InvalidRange { from: i64, to: i64 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Adapter,
    Configuration,
    Lifecycle,
    Input,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EnrichError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnrichError::SampleSourceError { .. }
            | EnrichError::HistogramBuildError { .. }
            | EnrichError::UnitAborted { .. } => ErrorCategory::Adapter,
            EnrichError::PoolShutdown | EnrichError::ShutdownInterrupted { .. } => {
                ErrorCategory::Lifecycle
            }
            EnrichError::ConfigError { .. } | EnrichError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            EnrichError::InvalidRange { .. } | EnrichError::SerializationError(_) => {
                ErrorCategory::Input
            }
            EnrichError::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 關閉過程中的中斷只記錄，不影響結果
            ErrorCategory::Lifecycle if matches!(self, EnrichError::ShutdownInterrupted { .. }) => {
                ErrorSeverity::Low
            }
            ErrorCategory::Adapter => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Io => ErrorSeverity::High,
            ErrorCategory::Lifecycle | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// Adapter failures are transient from the caller's point of view.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Adapter
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Adapter => "The sample source may recover; run the request again",
            ErrorCategory::Configuration => "Check the config file, APPENDER_* variables and CLI flags",
            ErrorCategory::Input => "Check the sample file and the --from/--to range",
            ErrorCategory::Io => "Make sure the sample file exists and is readable",
            ErrorCategory::Lifecycle => "Start a new enricher; this one has been shut down",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EnrichError::SampleSourceError { identity, .. } => {
                format!("Could not load response times for {}", identity)
            }
            EnrichError::HistogramBuildError { identity, .. } => {
                format!("Could not build the response histogram for {}", identity)
            }
            EnrichError::UnitAborted { identity, .. } => {
                format!("Histogram work for {} was aborted", identity)
            }
            EnrichError::PoolShutdown => "The enrichment service is shutting down".to_string(),
            EnrichError::InvalidRange { .. } => {
                "The requested time range ends before it starts".to_string()
            }
            EnrichError::ConfigError { .. } | EnrichError::InvalidConfigValueError { .. } => {
                format!("Invalid configuration: {}", self)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;
