use async_trait::async_trait;
use node_histogram::{
    AppenderConfig, EnrichError, EnricherFactory, HistogramEnricher, InMemorySampleSource,
    LatencySample, Result, SampleSource, ServiceIdentity, TimeRange,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config(mode: &str, max_threads: usize) -> AppenderConfig {
    AppenderConfig {
        mode: mode.to_string(),
        max_threads,
        shutdown_grace_secs: 2,
    }
}

fn node(name: &str) -> ServiceIdentity {
    ServiceIdentity::new(name, "SPRING_BOOT")
}

fn abc_source() -> InMemorySampleSource {
    InMemorySampleSource::builder()
        .add_samples(node("A"), (0..5).map(|i| LatencySample::new(100 + i, 10 * i as u64)))
        .add_samples(node("B"), Vec::<LatencySample>::new())
        .add_samples(
            node("C"),
            vec![LatencySample::new(150, 2500), LatencySample::failed(160, 30)],
        )
        .build()
}

/// Counts calls and tracks how many fetches run at once.
struct CountingSource {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl CountingSource {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        }
    }
}

#[async_trait]
impl SampleSource for CountingSource {
    async fn fetch(&self, _identity: &ServiceIdentity, range: &TimeRange) -> Result<Vec<LatencySample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![LatencySample::new(range.from(), 1)])
    }
}

struct FailingSource {
    failing: ServiceIdentity,
}

#[async_trait]
impl SampleSource for FailingSource {
    async fn fetch(&self, identity: &ServiceIdentity, _range: &TimeRange) -> Result<Vec<LatencySample>> {
        if identity == &self.failing {
            return Err(EnrichError::SampleSourceError {
                identity: identity.to_string(),
                message: "region unavailable".to_string(),
            });
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(vec![LatencySample::new(0, 1)])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abc_example_in_both_modes() {
    let requested: HashSet<_> = [node("A"), node("B"), node("C")].into_iter().collect();
    let range = TimeRange::new(100, 200).unwrap();

    for mode in ["serial", "parallel"] {
        let factory = EnricherFactory::new(&config(mode, 4)).unwrap();
        let result = factory
            .create_for_samples(abc_source())
            .enrich(&requested, &range)
            .await
            .unwrap();

        assert_eq!(result.len(), 3, "mode {mode}");
        assert_eq!(result.get(&node("A")).unwrap().total_count(), 5);
        assert_eq!(result.get(&node("B")).unwrap().total_count(), 0);
        assert_eq!(result.get(&node("C")).unwrap().total_count(), 2);
        assert_eq!(result.get(&node("C")).unwrap().distribution().error, 1);
        assert_eq!(result.get(&node("A")).unwrap().range(), range);

        factory.shutdown().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serial_and_parallel_results_are_equal() {
    let mut builder = InMemorySampleSource::builder();
    let mut requested = HashSet::new();
    for i in 0..50u64 {
        let identity = node(&format!("svc-{i}"));
        builder = builder.add_samples(
            identity.clone(),
            (0..i % 7).map(|j| LatencySample::new(j as i64, j * 900)),
        );
        requested.insert(identity);
    }
    let samples = builder.build();
    let range = TimeRange::new(0, 60_000).unwrap();

    let serial = EnricherFactory::new(&config("serial", 1)).unwrap();
    let parallel = EnricherFactory::new(&config("PARALLEL", 8)).unwrap();

    let serial_result = serial
        .create_for_samples(samples.clone())
        .enrich(&requested, &range)
        .await
        .unwrap();
    let parallel_result = parallel
        .create_for_samples(samples)
        .enrich(&requested, &range)
        .await
        .unwrap();

    assert_eq!(serial_result, parallel_result);
    assert_eq!(
        parallel_result.identities().cloned().collect::<HashSet<_>>(),
        requested
    );
    parallel.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_respects_max_threads() {
    let factory = EnricherFactory::new(&config("parallel", 3)).unwrap();
    let counted = Arc::new(CountingSource::new(Duration::from_millis(20)));
    let enricher = factory.create(counted.clone());
    let requested: HashSet<_> = (0..12).map(|i| node(&format!("svc-{i}"))).collect();

    let result = enricher
        .enrich(&requested, &TimeRange::new(0, 10).unwrap())
        .await
        .unwrap();

    assert_eq!(result.len(), 12);
    assert_eq!(counted.calls.load(Ordering::SeqCst), 12);
    let peak = counted.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeded pool size");
    assert!(peak > 1, "units never overlapped");
    factory.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_calls_share_the_pool() {
    let factory = EnricherFactory::new(&config("parallel", 2)).unwrap();
    let counted = Arc::new(CountingSource::new(Duration::from_millis(10)));
    let enricher: Arc<dyn HistogramEnricher> = factory.create(counted.clone());
    let range = TimeRange::new(0, 10).unwrap();

    let first: HashSet<_> = (0..6).map(|i| node(&format!("left-{i}"))).collect();
    let second: HashSet<_> = (0..6).map(|i| node(&format!("right-{i}"))).collect();

    let (left, right) = tokio::join!(enricher.enrich(&first, &range), enricher.enrich(&second, &range));
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_eq!(left.identities().cloned().collect::<HashSet<_>>(), first);
    assert_eq!(right.identities().cloned().collect::<HashSet<_>>(), second);
    assert!(counted.peak.load(Ordering::SeqCst) <= 2);
    factory.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_failing_unit_fails_the_whole_call() {
    for mode in ["serial", "parallel"] {
        let factory = EnricherFactory::new(&config(mode, 4)).unwrap();
        let enricher = factory.create(Arc::new(FailingSource {
            failing: node("flaky"),
        }));
        let requested: HashSet<_> = ["ok-1", "flaky", "ok-2", "ok-3"]
            .into_iter()
            .map(node)
            .collect();

        let err = enricher
            .enrich(&requested, &TimeRange::new(0, 10).unwrap())
            .await
            .unwrap_err();

        match err {
            EnrichError::SampleSourceError { identity, message } => {
                assert_eq!(identity, "flaky:SPRING_BOOT", "mode {mode}");
                assert_eq!(message, "region unavailable");
            }
            other => panic!("mode {mode}: unexpected error {other:?}"),
        }
        factory.shutdown().await;
    }
}

#[tokio::test]
async fn test_empty_enrich_never_calls_a_source() {
    let factory = EnricherFactory::new(&config("parallel", 2)).unwrap();
    let counted = Arc::new(CountingSource::new(Duration::ZERO));
    let _unused = factory.create(counted.clone());
    let requested: HashSet<_> = ["A", "B", "C"].into_iter().map(node).collect();

    let result = factory
        .empty_enrich(&requested, &TimeRange::new(100, 200).unwrap())
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.iter().all(|(_, histogram)| histogram.total_count() == 0));
    assert_eq!(counted.calls.load(Ordering::SeqCst), 0);
    factory.shutdown().await;
}

#[tokio::test]
async fn test_empty_identity_set() {
    for mode in ["serial", "parallel"] {
        let factory = EnricherFactory::new(&config(mode, 2)).unwrap();
        let result = factory
            .create_for_samples(abc_source())
            .enrich(&HashSet::new(), &TimeRange::new(0, 0).unwrap())
            .await
            .unwrap();
        assert!(result.is_empty());
        factory.shutdown().await;
    }
}
