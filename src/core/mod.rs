pub mod factory;
pub mod parallel;
pub mod pool;
pub mod serial;

pub use crate::domain::model::{EnrichmentResult, Histogram, ServiceIdentity, TimeRange};
pub use crate::domain::ports::{HistogramBuilder, HistogramEnricher, SampleSource};
pub use crate::utils::error::Result;
