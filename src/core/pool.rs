use crate::utils::error::{EnrichError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::Instrument;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>;

/// How a pool teardown ended. Teardown itself never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Serial mode, there was never a pool.
    NoPool,
    AlreadyShutDown,
    /// Every worker finished its queue within the grace period.
    Drained,
    /// The grace period ran out and the remaining workers were aborted.
    ForceTerminated { remaining: usize },
    /// A caller stopped waiting before teardown finished. Teardown still ran to the
    /// end; `forced` counts the workers it had to abort.
    Interrupted { reason: String, forced: usize },
}

impl ShutdownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            ShutdownOutcome::NoPool | ShutdownOutcome::AlreadyShutDown | ShutdownOutcome::Drained
        )
    }

    fn forced(&self) -> usize {
        match self {
            ShutdownOutcome::ForceTerminated { remaining } => *remaining,
            ShutdownOutcome::Interrupted { forced, .. } => *forced,
            _ => 0,
        }
    }
}

/// Fixed number of worker tasks pulling jobs from one shared queue.
///
/// A job runs inside a per-worker [`JoinSet`], so a panicking job is contained and an
/// aborted worker takes its running job down with it.
pub struct WorkerPool {
    name: String,
    size: usize,
    runtime: tokio::runtime::Handle,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    state: Mutex<Lifecycle>,
}

impl WorkerPool {
    /// Spawns `size` workers on the current Tokio runtime.
    pub fn new(name: impl Into<String>, size: usize) -> Result<Self> {
        let name = name.into();
        if size == 0 {
            return Err(EnrichError::InvalidConfigValueError {
                field: "appender.max_threads".to_string(),
                value: size.to_string(),
                reason: "Worker pool needs at least one worker".to_string(),
            });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| EnrichError::ConfigError {
            message: format!("Worker pool '{}' needs a Tokio runtime: {}", name, e),
        })?;

        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut workers = JoinSet::new();
        for id in 0..size {
            let span = tracing::debug_span!("worker", name = %format!("{}-{}", name, id));
            workers.spawn_on(run_worker(Arc::clone(&receiver)).instrument(span), &runtime);
        }
        tracing::info!("Started worker pool '{}' with {} workers", name, size);

        Ok(Self {
            name,
            size,
            runtime,
            sender: Mutex::new(Some(sender)),
            state: Mutex::new(Lifecycle::Running(workers)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_shutdown(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Queues `work` and returns a receiver for its output.
    ///
    /// The receiver errors if the job is dropped before completing: it panicked, or the
    /// pool was torn down first.
    pub fn submit<F, T>(&self, work: F) -> Result<oneshot::Receiver<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // 呼叫端可能已放棄等待，忽略送出失敗
            let _ = tx.send(work.await);
        });

        let guard = lock(&self.sender);
        let sender = guard.as_ref().ok_or(EnrichError::PoolShutdown)?;
        sender.send(job).map_err(|_| EnrichError::PoolShutdown)?;
        Ok(rx)
    }

    /// Stops accepting jobs, lets the workers drain the queue for up to `grace`, then
    /// aborts whatever is still running.
    ///
    /// The drain runs in its own task, so dropping this future does not cut the grace
    /// period short. Concurrent and later callers wait on the same teardown; once one
    /// caller has seen the outcome the rest get [`ShutdownOutcome::AlreadyShutDown`].
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        let teardown = self.begin_teardown(grace);

        let mut outcome = teardown.outcome.clone();
        let mut waiting = WaitGuard {
            pool: &self.name,
            cancelled: &teardown.cancelled,
            armed: true,
        };
        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|seen| (*seen).clone());
        waiting.armed = false;

        if teardown.reported.swap(true, Ordering::SeqCst) {
            return ShutdownOutcome::AlreadyShutDown;
        }
        let Some(finished) = finished else {
            return ShutdownOutcome::Interrupted {
                reason: format!("teardown of pool '{}' ended without an outcome", self.name),
                forced: 0,
            };
        };
        if teardown.cancelled.load(Ordering::SeqCst) {
            return ShutdownOutcome::Interrupted {
                reason: format!("an earlier wait on pool '{}' was cancelled", self.name),
                forced: finished.forced(),
            };
        }
        finished
    }

    fn begin_teardown(&self, grace: Duration) -> Arc<Teardown> {
        let mut state = lock(&self.state);
        if let Lifecycle::TearingDown(teardown) = &*state {
            return Arc::clone(teardown);
        }

        let (publish, outcome) = watch::channel(None);
        let teardown = Arc::new(Teardown {
            outcome,
            cancelled: AtomicBool::new(false),
            reported: AtomicBool::new(false),
        });
        let previous = std::mem::replace(&mut *state, Lifecycle::TearingDown(Arc::clone(&teardown)));

        // Dropping the only sender closes the queue once it is empty.
        drop(lock(&self.sender).take());
        if let Lifecycle::Running(workers) = previous {
            tracing::info!(
                "Shutting down worker pool '{}' (grace period {:?})",
                self.name,
                grace
            );
            self.runtime.spawn(drain(self.name.clone(), workers, grace, publish));
        }
        teardown
    }
}

enum Lifecycle {
    Running(JoinSet<()>),
    TearingDown(Arc<Teardown>),
}

/// Shared by every `shutdown` caller of one pool.
struct Teardown {
    outcome: watch::Receiver<Option<ShutdownOutcome>>,
    cancelled: AtomicBool,
    reported: AtomicBool,
}

/// Marks the teardown as interrupted if the waiting caller is dropped early.
struct WaitGuard<'a> {
    pool: &'a str,
    cancelled: &'a AtomicBool,
    armed: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
            tracing::warn!(
                "Shutdown wait on worker pool '{}' was cancelled, teardown continues in the background",
                self.pool
            );
        }
    }
}

async fn drain(
    name: String,
    mut workers: JoinSet<()>,
    grace: Duration,
    publish: watch::Sender<Option<ShutdownOutcome>>,
) {
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Worker of pool '{}' ended abnormally: {}", name, e);
            }
        }
    })
    .await
    .is_ok();

    let outcome = if drained {
        tracing::info!("Worker pool '{}' drained", name);
        ShutdownOutcome::Drained
    } else {
        let remaining = workers.len();
        tracing::warn!(
            "Worker pool '{}' did not drain within {:?}, aborting {} workers",
            name,
            grace,
            remaining
        );
        workers.shutdown().await;
        ShutdownOutcome::ForceTerminated { remaining }
    };
    publish.send_replace(Some(outcome));
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

async fn run_worker(receiver: SharedReceiver) {
    loop {
        let job = {
            let mut queue = receiver.lock().await;
            queue.recv().await
        };
        let Some(job) = job else {
            break;
        };

        let mut running = JoinSet::new();
        running.spawn(job);
        if let Some(Err(e)) = running.join_next().await {
            tracing::warn!("Job failed inside worker: {}", e);
        }
    }
    tracing::debug!("Worker exiting, queue closed");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
