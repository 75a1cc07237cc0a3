use crate::config::AppenderConfig;
use crate::domain::model::TimeRange;
use crate::utils::error::{EnrichError, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use std::path::PathBuf;

const DEFAULT_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Parser)]
#[command(name = "node-histogram")]
#[command(about = "Builds response-time histograms for a set of services")]
pub struct CliConfig {
    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "JSON file with the collected samples per service")]
    pub samples: PathBuf,

    #[arg(long, help = "Override appender mode (serial | parallel)")]
    pub mode: Option<String>,

    #[arg(long, help = "Override worker pool size for parallel mode")]
    pub max_threads: Option<usize>,

    #[arg(long, help = "Range start, RFC 3339 or epoch millis (default: to - 5m)")]
    pub from: Option<String>,

    #[arg(long, help = "Range end, RFC 3339 or epoch millis (default: now)")]
    pub to: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_log: bool,
}

impl CliConfig {
    /// Command line flags win over file and environment settings.
    pub fn apply_overrides(&self, mut base: AppenderConfig) -> AppenderConfig {
        if let Some(mode) = &self.mode {
            base.mode = mode.clone();
        }
        if let Some(max_threads) = self.max_threads {
            base.max_threads = max_threads;
        }
        base
    }

    pub fn time_range(&self) -> Result<TimeRange> {
        self.time_range_at(Utc::now())
    }

    fn time_range_at(&self, now: DateTime<Utc>) -> Result<TimeRange> {
        let to = match &self.to {
            Some(raw) => parse_timestamp("to", raw)?,
            None => now.timestamp_millis(),
        };
        let from = match &self.from {
            Some(raw) => parse_timestamp("from", raw)?,
            None => to
                .checked_sub(Duration::minutes(DEFAULT_WINDOW_MINUTES).num_milliseconds())
                .ok_or_else(|| EnrichError::InvalidConfigValueError {
                    field: "from".to_string(),
                    value: to.to_string(),
                    reason: format!(
                        "No room for the default {} minute window before --to",
                        DEFAULT_WINDOW_MINUTES
                    ),
                })?,
        };
        TimeRange::new(from, to)
    }
}

/// 支援 RFC 3339 或 epoch 毫秒
pub fn parse_timestamp(field_name: &str, raw: &str) -> Result<i64> {
    if let Ok(millis) = raw.trim().parse::<i64>() {
        return Ok(millis);
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| EnrichError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: raw.to_string(),
            reason: format!("Expected RFC 3339 or epoch millis: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["node-histogram", "--samples", "samples.json"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("from", "1500").unwrap(), 1500);
        assert_eq!(
            parse_timestamp("from", "1970-01-01T00:00:01Z").unwrap(),
            1000
        );
        assert!(parse_timestamp("from", "yesterday").is_err());
    }

    #[test]
    fn test_overrides_win() {
        let cli = parse(&["--mode", "parallel", "--max-threads", "3"]);
        let config = cli.apply_overrides(AppenderConfig::default());
        assert_eq!(config.mode, "parallel");
        assert_eq!(config.max_threads, 3);
        assert_eq!(config.shutdown_grace_secs, 10);
    }

    #[test]
    fn test_default_window_ends_now() {
        let cli = parse(&[]);
        let now = Utc.timestamp_millis_opt(1_000_000).unwrap();
        let range = cli.time_range_at(now).unwrap();
        assert_eq!(range.to(), 1_000_000);
        assert_eq!(range.from(), 1_000_000 - 300_000);
    }

    #[test]
    fn test_default_window_before_earliest_instant_is_rejected() {
        let cli = parse(&["--to=-9223372036854775808"]);
        let now = Utc.timestamp_millis_opt(1_000_000).unwrap();
        match cli.time_range_at(now) {
            Err(EnrichError::InvalidConfigValueError { field, .. }) => assert_eq!(field, "from"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_explicit_range() {
        let cli = parse(&["--from", "100", "--to", "200"]);
        let range = cli.time_range().unwrap();
        assert_eq!((range.from(), range.to()), (100, 200));

        let inverted = parse(&["--from", "200", "--to", "100"]);
        assert!(matches!(
            inverted.time_range(),
            Err(EnrichError::InvalidRange { .. })
        ));
    }
}
