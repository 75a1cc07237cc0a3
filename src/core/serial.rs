use crate::domain::model::{EnrichmentResult, Histogram, LatencySample, ServiceIdentity, TimeRange};
use crate::domain::ports::{HistogramBuilder, HistogramEnricher, SampleSource};
use crate::utils::error::{EnrichError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Fetches the samples of one node and turns them into its histogram.
///
/// Errors are attributed to `identity` so callers can tell which node failed.
pub(crate) async fn node_histogram(
    source: &dyn SampleSource,
    builder: &dyn HistogramBuilder,
    identity: &ServiceIdentity,
    range: &TimeRange,
) -> Result<Histogram> {
    let samples = source
        .fetch(identity, range)
        .await
        .map_err(|e| match e {
            e @ EnrichError::SampleSourceError { .. } => e,
            other => EnrichError::SampleSourceError {
                identity: identity.to_string(),
                message: other.to_string(),
            },
        })?;

    build_histogram(builder, identity, range, &samples)
}

/// Runs `builder` for one node and checks it answered for that node.
pub(crate) fn build_histogram(
    builder: &dyn HistogramBuilder,
    identity: &ServiceIdentity,
    range: &TimeRange,
    samples: &[LatencySample],
) -> Result<Histogram> {
    let histogram = builder
        .build(identity, range, samples)
        .map_err(|e| match e {
            e @ EnrichError::HistogramBuildError { .. } => e,
            other => EnrichError::HistogramBuildError {
                identity: identity.to_string(),
                message: other.to_string(),
            },
        })?;

    if histogram.identity() != identity {
        return Err(EnrichError::HistogramBuildError {
            identity: identity.to_string(),
            message: format!("builder returned a histogram for {}", histogram.identity()),
        });
    }
    Ok(histogram)
}

/// Enriches nodes one after another on the calling task. Stops at the first failure.
pub struct SerialEnricher {
    source: Arc<dyn SampleSource>,
    builder: Arc<dyn HistogramBuilder>,
}

impl SerialEnricher {
    pub fn new(source: Arc<dyn SampleSource>, builder: Arc<dyn HistogramBuilder>) -> Self {
        Self { source, builder }
    }
}

#[async_trait]
impl HistogramEnricher for SerialEnricher {
    async fn enrich(
        &self,
        identities: &HashSet<ServiceIdentity>,
        range: &TimeRange,
    ) -> Result<EnrichmentResult> {
        tracing::debug!("Serial enrichment of {} nodes over {}", identities.len(), range);

        let mut result = EnrichmentResult::with_capacity(identities.len());
        for identity in identities {
            let histogram =
                node_histogram(self.source.as_ref(), self.builder.as_ref(), identity, range).await?;
            result.insert(identity.clone(), histogram);
        }
        Ok(result)
    }
}
