use crate::adapters::{EmptySampleSource, InMemorySampleSource, QuerySampleSource, SlotHistogramBuilder};
use crate::config::{AppenderConfig, EnrichmentMode};
use crate::core::parallel::ParallelEnricher;
use crate::core::pool::{ShutdownOutcome, WorkerPool};
use crate::core::serial::{build_histogram, SerialEnricher};
use crate::domain::model::{EnrichmentResult, ServiceIdentity, TimeRange};
use crate::domain::ports::{HistogramBuilder, HistogramEnricher, ResponseTimeStore, SampleSource};
use crate::utils::error::{EnrichError, Result};
use crate::utils::validation::Validate;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const POOL_NAME: &str = "node-histogram-appender";

/// Execution resources chosen at startup.
#[derive(Debug)]
pub enum EnrichmentRuntime {
    Serial,
    Parallel(Arc<WorkerPool>),
}

/// Hands out enrichers for the configured mode and owns the shared worker pool.
///
/// Build one per process. Call [`EnricherFactory::shutdown`] before exit so queued
/// units get a chance to finish.
pub struct EnricherFactory {
    runtime: EnrichmentRuntime,
    builder: Arc<dyn HistogramBuilder>,
    shutdown_grace: Duration,
}

impl EnricherFactory {
    pub fn new(config: &AppenderConfig) -> Result<Self> {
        Self::with_builder(config, Arc::new(SlotHistogramBuilder::default()))
    }

    /// Parallel mode spawns the pool, so it must run inside a Tokio runtime.
    pub fn with_builder(config: &AppenderConfig, builder: Arc<dyn HistogramBuilder>) -> Result<Self> {
        config.validate()?;
        let mode = config.mode()?;
        tracing::info!("Node histogram appender mode: {}", mode);

        let runtime = match mode {
            EnrichmentMode::Serial => EnrichmentRuntime::Serial,
            EnrichmentMode::Parallel => {
                EnrichmentRuntime::Parallel(Arc::new(WorkerPool::new(POOL_NAME, config.max_threads)?))
            }
        };

        Ok(Self {
            runtime,
            builder,
            shutdown_grace: config.shutdown_grace(),
        })
    }

    pub fn mode(&self) -> EnrichmentMode {
        match self.runtime {
            EnrichmentRuntime::Serial => EnrichmentMode::Serial,
            EnrichmentRuntime::Parallel(_) => EnrichmentMode::Parallel,
        }
    }

    /// Pool size in parallel mode, `None` in serial mode.
    pub fn max_threads(&self) -> Option<usize> {
        match &self.runtime {
            EnrichmentRuntime::Serial => None,
            EnrichmentRuntime::Parallel(pool) => Some(pool.size()),
        }
    }

    pub fn runtime(&self) -> &EnrichmentRuntime {
        &self.runtime
    }

    pub fn create(&self, source: Arc<dyn SampleSource>) -> Arc<dyn HistogramEnricher> {
        let builder = Arc::clone(&self.builder);
        match &self.runtime {
            EnrichmentRuntime::Serial => Arc::new(SerialEnricher::new(source, builder)),
            EnrichmentRuntime::Parallel(pool) => {
                Arc::new(ParallelEnricher::new(source, builder, Arc::clone(pool)))
            }
        }
    }

    pub fn create_for_store<S>(&self, store: S) -> Arc<dyn HistogramEnricher>
    where
        S: ResponseTimeStore + 'static,
    {
        self.create(Arc::new(QuerySampleSource::new(store)))
    }

    pub fn create_for_samples(&self, samples: InMemorySampleSource) -> Arc<dyn HistogramEnricher> {
        self.create(Arc::new(samples))
    }

    pub fn create_empty(&self) -> Arc<dyn HistogramEnricher> {
        self.create(Arc::new(EmptySampleSource))
    }

    /// Empty histograms for every identity, without touching any sample source.
    pub fn empty_enrich(
        &self,
        identities: &HashSet<ServiceIdentity>,
        range: &TimeRange,
    ) -> Result<EnrichmentResult> {
        let mut result = EnrichmentResult::with_capacity(identities.len());
        for identity in identities {
            let histogram = build_histogram(self.builder.as_ref(), identity, range, &[])?;
            result.insert(identity.clone(), histogram);
        }
        Ok(result)
    }

    /// Tears the worker pool down; a no-op in serial mode and on repeated calls.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let outcome = match &self.runtime {
            EnrichmentRuntime::Serial => ShutdownOutcome::NoPool,
            EnrichmentRuntime::Parallel(pool) => pool.shutdown(self.shutdown_grace).await,
        };
        if let ShutdownOutcome::Interrupted { reason, .. } = &outcome {
            let interrupted = EnrichError::ShutdownInterrupted {
                message: reason.clone(),
            };
            tracing::warn!("{} (severity {:?})", interrupted, interrupted.severity());
        }
        outcome
    }
}
