use crate::domain::model::{
    Histogram, HistogramSlot, LatencyDistribution, LatencySample, ServiceIdentity, TimeRange,
};
use crate::domain::ports::HistogramBuilder;
use crate::utils::error::Result;
use crate::utils::validation::{validate_ascending, Validate};
use serde::{Deserialize, Serialize};

/// Upper bounds (inclusive, in ms) of the fast, normal and slow slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotThresholds {
    #[serde(default = "default_fast_ms")]
    pub fast_ms: u64,
    #[serde(default = "default_normal_ms")]
    pub normal_ms: u64,
    #[serde(default = "default_slow_ms")]
    pub slow_ms: u64,
}

fn default_fast_ms() -> u64 {
    1000
}

fn default_normal_ms() -> u64 {
    3000
}

fn default_slow_ms() -> u64 {
    5000
}

impl Default for SlotThresholds {
    fn default() -> Self {
        Self {
            fast_ms: default_fast_ms(),
            normal_ms: default_normal_ms(),
            slow_ms: default_slow_ms(),
        }
    }
}

impl SlotThresholds {
    pub fn slot_of(&self, sample: &LatencySample) -> HistogramSlot {
        if sample.error {
            HistogramSlot::Error
        } else if sample.elapsed_ms <= self.fast_ms {
            HistogramSlot::Fast
        } else if sample.elapsed_ms <= self.normal_ms {
            HistogramSlot::Normal
        } else if sample.elapsed_ms <= self.slow_ms {
            HistogramSlot::Slow
        } else {
            HistogramSlot::VerySlow
        }
    }
}

impl Validate for SlotThresholds {
    fn validate(&self) -> Result<()> {
        validate_ascending(
            "histogram.slot_thresholds",
            &[self.fast_ms, self.normal_ms, self.slow_ms],
        )
    }
}

/// Counts every sample into one response-time slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotHistogramBuilder {
    thresholds: SlotThresholds,
}

impl SlotHistogramBuilder {
    pub fn new(thresholds: SlotThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SlotThresholds {
        &self.thresholds
    }
}

impl HistogramBuilder for SlotHistogramBuilder {
    fn build(
        &self,
        identity: &ServiceIdentity,
        range: &TimeRange,
        samples: &[LatencySample],
    ) -> Result<Histogram> {
        let mut distribution = LatencyDistribution::default();
        for sample in samples {
            distribution.add(self.thresholds.slot_of(sample), 1);
        }
        Ok(Histogram::new(identity.clone(), *range, distribution))
    }
}
