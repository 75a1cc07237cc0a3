use crate::utils::error::{EnrichError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A service (node) of the topology map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub application_name: String,
    pub service_type: String,
}

impl ServiceIdentity {
    pub fn new(application_name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            service_type: service_type.into(),
        }
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.application_name, self.service_type)
    }
}

/// Half-open window `[from, to)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange {
    from: i64,
    to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Result<Self> {
        if from > to {
            return Err(EnrichError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        Self::new(from.timestamp_millis(), to.timestamp_millis())
    }

    pub fn from(&self) -> i64 {
        self.from
    }

    pub fn to(&self) -> i64 {
        self.to
    }

    /// Length of the range; `to >= from` always holds, so this never wraps.
    pub fn duration_ms(&self) -> u64 {
        self.to.abs_diff(self.from)
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.from && timestamp_ms < self.to
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// One recorded response time. Only histogram builders look inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySample {
    pub timestamp_ms: i64,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub error: bool,
}

impl LatencySample {
    pub fn new(timestamp_ms: i64, elapsed_ms: u64) -> Self {
        Self {
            timestamp_ms,
            elapsed_ms,
            error: false,
        }
    }

    pub fn failed(timestamp_ms: i64, elapsed_ms: u64) -> Self {
        Self {
            timestamp_ms,
            elapsed_ms,
            error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramSlot {
    Fast,
    Normal,
    Slow,
    VerySlow,
    Error,
}

/// Slot counters of a response-time distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyDistribution {
    pub fast: u64,
    pub normal: u64,
    pub slow: u64,
    pub very_slow: u64,
    pub error: u64,
}

impl LatencyDistribution {
    pub fn add(&mut self, slot: HistogramSlot, count: u64) {
        match slot {
            HistogramSlot::Fast => self.fast += count,
            HistogramSlot::Normal => self.normal += count,
            HistogramSlot::Slow => self.slow += count,
            HistogramSlot::VerySlow => self.very_slow += count,
            HistogramSlot::Error => self.error += count,
        }
    }

    pub fn count(&self, slot: HistogramSlot) -> u64 {
        match slot {
            HistogramSlot::Fast => self.fast,
            HistogramSlot::Normal => self.normal,
            HistogramSlot::Slow => self.slow,
            HistogramSlot::VerySlow => self.very_slow,
            HistogramSlot::Error => self.error,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.fast + self.normal + self.slow + self.very_slow + self.error
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }
}

/// Response-time histogram of one node over one range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Histogram {
    identity: ServiceIdentity,
    range: TimeRange,
    distribution: LatencyDistribution,
}

impl Histogram {
    pub fn new(identity: ServiceIdentity, range: TimeRange, distribution: LatencyDistribution) -> Self {
        Self {
            identity,
            range,
            distribution,
        }
    }

    /// Histogram of a node that had no samples in the range.
    pub fn empty(identity: ServiceIdentity, range: TimeRange) -> Self {
        Self::new(identity, range, LatencyDistribution::default())
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn distribution(&self) -> &LatencyDistribution {
        &self.distribution
    }

    pub fn total_count(&self) -> u64 {
        self.distribution.total_count()
    }
}

/// Histograms keyed by the identities that were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentResult {
    histograms: HashMap<ServiceIdentity, Histogram>,
}

impl EnrichmentResult {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            histograms: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, identity: ServiceIdentity, histogram: Histogram) {
        self.histograms.insert(identity, histogram);
    }

    pub fn get(&self, identity: &ServiceIdentity) -> Option<&Histogram> {
        self.histograms.get(identity)
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &ServiceIdentity> {
        self.histograms.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceIdentity, &Histogram)> {
        self.histograms.iter()
    }

    pub fn into_inner(self) -> HashMap<ServiceIdentity, Histogram> {
        self.histograms
    }
}

impl Serialize for EnrichmentResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // 依 identity 排序，讓輸出穩定
        let mut entries: Vec<&Histogram> = self.histograms.values().collect();
        entries.sort_by(|a, b| a.identity().cmp(b.identity()));
        serializer.collect_seq(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_rejects_inverted_bounds() {
        assert!(TimeRange::new(100, 200).is_ok());
        assert!(TimeRange::new(100, 100).is_ok());
        assert!(matches!(
            TimeRange::new(200, 100),
            Err(EnrichError::InvalidRange { from: 200, to: 100 })
        ));
    }

    #[test]
    fn test_time_range_is_half_open() {
        let range = TimeRange::new(100, 200).unwrap();
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
        assert_eq!(range.duration_ms(), 100);
        assert_eq!(range.to_string(), "[100, 200)");
    }

    #[test]
    fn test_widest_time_range_duration() {
        let range = TimeRange::new(i64::MIN, i64::MAX).unwrap();
        assert_eq!(range.duration_ms(), u64::MAX);
        assert_eq!(TimeRange::new(-5, -5).unwrap().duration_ms(), 0);
    }

    #[test]
    fn test_time_range_from_datetimes() {
        let from = Utc.timestamp_millis_opt(1_000).unwrap();
        let to = Utc.timestamp_millis_opt(61_000).unwrap();
        let range = TimeRange::between(from, to).unwrap();
        assert_eq!(range.from(), 1_000);
        assert_eq!(range.to(), 61_000);
    }

    #[test]
    fn test_empty_histogram_has_zero_count() {
        let identity = ServiceIdentity::new("frontend", "TOMCAT");
        let histogram = Histogram::empty(identity.clone(), TimeRange::new(0, 10).unwrap());
        assert_eq!(histogram.identity(), &identity);
        assert_eq!(histogram.total_count(), 0);
        assert!(histogram.distribution().is_empty());
    }

    #[test]
    fn test_enrichment_result_serializes_sorted() {
        let range = TimeRange::new(0, 10).unwrap();
        let mut result = EnrichmentResult::with_capacity(2);
        for name in ["b", "a"] {
            let identity = ServiceIdentity::new(name, "T");
            result.insert(identity.clone(), Histogram::empty(identity, range));
        }

        let json = serde_json::to_value(&result).unwrap();
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["identity"]["application_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
