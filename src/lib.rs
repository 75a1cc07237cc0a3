pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{EmptySampleSource, InMemorySampleSource, QuerySampleSource, SlotHistogramBuilder};
pub use config::{toml_config::TomlConfig, AppenderConfig, EnrichmentMode};
pub use crate::core::{
    factory::EnricherFactory, parallel::ParallelEnricher, pool::ShutdownOutcome,
    pool::WorkerPool, serial::SerialEnricher,
};
pub use domain::model::{
    EnrichmentResult, Histogram, HistogramSlot, LatencyDistribution, LatencySample,
    ServiceIdentity, TimeRange,
};
pub use domain::ports::{HistogramBuilder, HistogramEnricher, ResponseTimeStore, SampleSource};
pub use utils::error::{EnrichError, Result};
