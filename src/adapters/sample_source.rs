use crate::domain::model::{LatencySample, ServiceIdentity, TimeRange};
use crate::domain::ports::{ResponseTimeStore, SampleSource};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Samples come from a storage query.
pub struct QuerySampleSource<S: ResponseTimeStore> {
    store: S,
}

impl<S: ResponseTimeStore> QuerySampleSource<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ResponseTimeStore> SampleSource for QuerySampleSource<S> {
    async fn fetch(&self, identity: &ServiceIdentity, range: &TimeRange) -> Result<Vec<LatencySample>> {
        let samples = self.store.select_response_time(identity, range).await?;
        tracing::debug!("Store returned {} samples for {} in {}", samples.len(), identity, range);
        Ok(samples)
    }
}

/// Samples already collected per node, e.g. while scanning traces for the same window.
/// The range is not re-applied.
#[derive(Debug, Clone, Default)]
pub struct InMemorySampleSource {
    samples: HashMap<ServiceIdentity, Vec<LatencySample>>,
}

impl InMemorySampleSource {
    pub fn builder() -> InMemorySampleSourceBuilder {
        InMemorySampleSourceBuilder::default()
    }

    /// 從 JSON 字串載入樣本
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: SampleFile = serde_json::from_str(content)?;
        let mut builder = Self::builder();
        for service in file.services {
            builder = builder.add_samples(service.identity, service.samples);
        }
        Ok(builder.build())
    }

    /// 從 JSON 檔案載入樣本
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn identities(&self) -> impl Iterator<Item = &ServiceIdentity> {
        self.samples.keys()
    }

    pub fn samples_for(&self, identity: &ServiceIdentity) -> &[LatencySample] {
        self.samples.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait]
impl SampleSource for InMemorySampleSource {
    async fn fetch(&self, identity: &ServiceIdentity, _range: &TimeRange) -> Result<Vec<LatencySample>> {
        Ok(self.samples_for(identity).to_vec())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySampleSourceBuilder {
    samples: HashMap<ServiceIdentity, Vec<LatencySample>>,
}

impl InMemorySampleSourceBuilder {
    pub fn add_sample(mut self, identity: ServiceIdentity, sample: LatencySample) -> Self {
        self.samples.entry(identity).or_default().push(sample);
        self
    }

    /// Registers the identity even when `samples` is empty.
    pub fn add_samples<I>(mut self, identity: ServiceIdentity, samples: I) -> Self
    where
        I: IntoIterator<Item = LatencySample>,
    {
        self.samples.entry(identity).or_default().extend(samples);
        self
    }

    pub fn build(self) -> InMemorySampleSource {
        InMemorySampleSource {
            samples: self.samples,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SampleFile {
    services: Vec<ServiceSamples>,
}

#[derive(Debug, Deserialize)]
struct ServiceSamples {
    identity: ServiceIdentity,
    #[serde(default)]
    samples: Vec<LatencySample>,
}

/// For call sites with no data source at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySampleSource;

#[async_trait]
impl SampleSource for EmptySampleSource {
    async fn fetch(&self, _identity: &ServiceIdentity, _range: &TimeRange) -> Result<Vec<LatencySample>> {
        Ok(Vec::new())
    }
}
