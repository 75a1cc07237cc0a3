use crate::core::pool::WorkerPool;
use crate::core::serial::node_histogram;
use crate::domain::model::{EnrichmentResult, Histogram, ServiceIdentity, TimeRange};
use crate::domain::ports::{HistogramBuilder, HistogramEnricher, SampleSource};
use crate::utils::error::{EnrichError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Enriches every node as its own unit of work on a shared [`WorkerPool`].
///
/// A call returns only after all of its units have settled. If any unit failed, the
/// whole call fails with the error of the first failed unit in submission order; a
/// unit that never reported back (panic, pool teardown) fails as
/// [`EnrichError::UnitAborted`].
pub struct ParallelEnricher {
    source: Arc<dyn SampleSource>,
    builder: Arc<dyn HistogramBuilder>,
    pool: Arc<WorkerPool>,
}

impl ParallelEnricher {
    pub fn new(
        source: Arc<dyn SampleSource>,
        builder: Arc<dyn HistogramBuilder>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            source,
            builder,
            pool,
        }
    }

    fn submit_unit(
        &self,
        identity: ServiceIdentity,
        range: TimeRange,
    ) -> Result<oneshot::Receiver<Result<Histogram>>> {
        let source = Arc::clone(&self.source);
        let builder = Arc::clone(&self.builder);
        self.pool.submit(async move {
            tracing::debug!("Building histogram for {}", identity);
            node_histogram(source.as_ref(), builder.as_ref(), &identity, &range).await
        })
    }
}

#[async_trait]
impl HistogramEnricher for ParallelEnricher {
    async fn enrich(
        &self,
        identities: &HashSet<ServiceIdentity>,
        range: &TimeRange,
    ) -> Result<EnrichmentResult> {
        tracing::debug!(
            "Parallel enrichment of {} nodes over {} on pool '{}'",
            identities.len(),
            range,
            self.pool.name()
        );

        // One slot per submitted unit, indexed by submission position.
        let mut pending = Vec::with_capacity(identities.len());
        let mut submit_error = None;
        for identity in identities {
            match self.submit_unit(identity.clone(), *range) {
                Ok(rx) => pending.push((identity, rx)),
                Err(e) => {
                    submit_error = Some(e);
                    break;
                }
            }
        }

        let mut result = EnrichmentResult::with_capacity(pending.len());
        let mut first_error = None;
        for (identity, rx) in pending {
            match rx.await {
                Ok(Ok(histogram)) => result.insert(identity.clone(), histogram),
                Ok(Err(e)) => {
                    tracing::warn!("Histogram unit for {} failed: {}", identity, e);
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    tracing::warn!("Histogram unit for {} was dropped before finishing", identity);
                    first_error.get_or_insert(EnrichError::UnitAborted {
                        identity: identity.to_string(),
                        message: "unit of work was dropped by the worker pool".to_string(),
                    });
                }
            }
        }

        match first_error.or(submit_error) {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }
}
