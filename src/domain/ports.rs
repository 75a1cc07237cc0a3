use crate::domain::model::{EnrichmentResult, Histogram, LatencySample, ServiceIdentity, TimeRange};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Storage query for the response times recorded by one node.
#[async_trait]
pub trait ResponseTimeStore: Send + Sync {
    async fn select_response_time(
        &self,
        identity: &ServiceIdentity,
        range: &TimeRange,
    ) -> Result<Vec<LatencySample>>;
}

/// Where an enricher gets its samples from. "No data" is an empty vec, not an error.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch(&self, identity: &ServiceIdentity, range: &TimeRange) -> Result<Vec<LatencySample>>;
}

pub trait HistogramBuilder: Send + Sync {
    fn build(
        &self,
        identity: &ServiceIdentity,
        range: &TimeRange,
        samples: &[LatencySample],
    ) -> Result<Histogram>;
}

/// Produces one histogram per requested node.
#[async_trait]
pub trait HistogramEnricher: Send + Sync {
    async fn enrich(
        &self,
        identities: &HashSet<ServiceIdentity>,
        range: &TimeRange,
    ) -> Result<EnrichmentResult>;
}
