use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::classifier::{Classifier, Verdict};
use crate::config::VerdictConfig;
use crate::queue::JobQueue;
use crate::state_machine::{JobId, Transition};
use crate::store::JobStore;

/// One processing loop: dequeue → claim → classify → record outcome.
#[derive(Clone)]
struct Worker {
    index: usize,
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    classifier: Arc<dyn Classifier>,
    timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker = self.index, "Worker started");
        while let Some(id) = self.queue.dequeue(&self.shutdown).await {
            self.process(id).await;
        }
        tracing::debug!(worker = self.index, "Worker stopped");
    }

    async fn process(&self, id: JobId) {
        let job = match self.store.update(id, Transition::Claim { worker: self.index }) {
            Ok(job) => job,
            Err(e) => {
                // Cancelled or evicted while queued.
                tracing::debug!(job_id = %id, worker = self.index, error = %e, "Skipping job");
                return;
            }
        };

        let transition = match self.classify(job.payload.text).await {
            Ok(verdict) => {
                tracing::debug!(
                    job_id = %id,
                    worker = self.index,
                    label = %verdict.label,
                    confidence = verdict.confidence,
                    "Job classified"
                );
                Transition::Succeed(verdict)
            }
            Err(reason) => {
                tracing::warn!(job_id = %id, worker = self.index, reason = %reason, "Job failed");
                Transition::Fail(reason)
            }
        };

        // The watchdog may have failed the job first; its verdict stands.
        if let Err(e) = self.store.update(id, transition) {
            tracing::warn!(job_id = %id, worker = self.index, error = %e, "Discarding late result");
        }
    }

    /// Run the classifier on the blocking pool, bounded by the job timeout.
    ///
    /// Adapter errors and timeouts come back as the failure reason. A panic
    /// in the adapter is re-raised so that it takes down this worker.
    async fn classify(&self, text: String) -> Result<Verdict, String> {
        let classifier = Arc::clone(&self.classifier);
        let task = tokio::task::spawn_blocking(move || classifier.classify(&text));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(format!(
                        "classification timed out after {}ms",
                        limit.as_millis()
                    ));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(verdict)) => {
                Verdict::new(verdict.label, verdict.confidence).map_err(|e| e.to_string())
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Restart `worker` whenever it dies from a panic, until shutdown.
async fn supervise(worker: Worker, restarts: Arc<AtomicUsize>) {
    loop {
        match tokio::spawn(worker.clone().run()).await {
            Ok(()) => break,
            Err(e) if e.is_panic() && !worker.shutdown.is_cancelled() => {
                restarts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker = worker.index, error = %e, "Worker crashed, restarting");
            }
            Err(e) => {
                tracing::warn!(worker = worker.index, error = %e, "Worker exited abnormally");
                break;
            }
        }
    }
}

/// Periodic maintenance: fail jobs stuck in `running` and apply the
/// finished-job retention limit.
async fn run_watchdog(
    store: Arc<JobStore>,
    stall_timeout: Option<Duration>,
    retain_finished: Option<usize>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Some(limit) = stall_timeout {
            for id in store.stalled(limit) {
                let reason = format!("stalled: no result after {}ms", limit.as_millis());
                match store.update(id, Transition::Fail(reason)) {
                    Ok(_) => tracing::warn!(job_id = %id, "Failed stalled job"),
                    Err(e) => tracing::debug!(job_id = %id, error = %e, "Stalled job already settled"),
                }
            }
        }

        if let Some(keep) = retain_finished {
            store.evict_finished(keep);
        }
    }
}

/// A fixed set of supervised workers sharing one queue, store and classifier.
pub struct WorkerPool {
    size: usize,
    queue: Arc<JobQueue>,
    shutdown: CancellationToken,
    supervisors: Vec<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    restarts: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers, plus the watchdog when a stall timeout
    /// or retention limit is configured. Must be called inside a tokio runtime.
    pub fn start(
        config: &VerdictConfig,
        store: Arc<JobStore>,
        queue: Arc<JobQueue>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let restarts = Arc::new(AtomicUsize::new(0));

        let supervisors = (0..config.workers)
            .map(|index| {
                let worker = Worker {
                    index,
                    store: Arc::clone(&store),
                    queue: Arc::clone(&queue),
                    classifier: Arc::clone(&classifier),
                    timeout: config.job_timeout(),
                    shutdown: shutdown.clone(),
                };
                tokio::spawn(supervise(worker, Arc::clone(&restarts)))
            })
            .collect();

        let watchdog = (config.stall_timeout_ms.is_some() || config.retain_finished.is_some())
            .then(|| {
                tokio::spawn(run_watchdog(
                    Arc::clone(&store),
                    config.stall_timeout(),
                    config.retain_finished,
                    config.watchdog_interval(),
                    shutdown.clone(),
                ))
            });

        tracing::info!(
            workers = config.workers,
            queue_capacity = ?config.queue_capacity,
            watchdog = watchdog.is_some(),
            "Worker pool started"
        );

        Self {
            size: config.workers,
            queue,
            shutdown,
            supervisors,
            watchdog,
            restarts,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// How many times a crashed worker has been restarted.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Stop taking new jobs, wait for in-flight jobs to finish, then close
    /// the queue. Jobs still queued remain `pending`.
    pub async fn shutdown(mut self) {
        tracing::info!(workers = self.size, "Worker pool shutting down");
        self.shutdown.cancel();

        for handle in std::mem::take(&mut self.supervisors) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker supervisor exited abnormally");
            }
        }
        if let Some(handle) = self.watchdog.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Watchdog exited abnormally");
            }
        }

        self.queue.close().await;
        tracing::info!(pending = self.queue.len(), "Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, KeywordClassifier, UnavailableClassifier};
    use crate::state_machine::{JobState, Payload};

    struct Fixed(f64);

    impl Classifier for Fixed {
        fn classify(&self, _text: &str) -> Result<Verdict, ClassifierError> {
            // Bypasses the constructor check on purpose.
            Ok(Verdict {
                label: "real".into(),
                confidence: self.0,
            })
        }
    }

    struct Slow(Duration);

    impl Classifier for Slow {
        fn classify(&self, text: &str) -> Result<Verdict, ClassifierError> {
            std::thread::sleep(self.0);
            KeywordClassifier.classify(text)
        }
    }

    fn worker(classifier: Arc<dyn Classifier>, timeout: Option<Duration>) -> Worker {
        Worker {
            index: 0,
            store: Arc::new(JobStore::new()),
            queue: Arc::new(JobQueue::unbounded()),
            classifier,
            timeout,
            shutdown: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn process_marks_job_done() {
        let w = worker(Arc::new(KeywordClassifier), None);
        let id = w.store.create(Payload::new("Breaking news: celebrity scandal"));
        w.process(id).await;

        let job = w.store.get(id).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.worker, Some(0));
        assert_eq!(job.result.unwrap().label, "fake");
    }

    #[tokio::test]
    async fn classifier_error_marks_job_failed() {
        let w = worker(Arc::new(UnavailableClassifier::new("model not loaded")), None);
        let id = w.store.create(Payload::new("text"));
        w.process(id).await;

        let job = w.store.get(id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.unwrap().contains("model not loaded"));
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn out_of_range_confidence_fails_job() {
        let w = worker(Arc::new(Fixed(1.7)), None);
        let id = w.store.create(Payload::new("text"));
        w.process(id).await;

        let job = w.store.get(id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.unwrap().contains("outside [0, 1]"));
    }

    #[tokio::test]
    async fn timeout_marks_job_failed() {
        let w = worker(
            Arc::new(Slow(Duration::from_millis(300))),
            Some(Duration::from_millis(20)),
        );
        let id = w.store.create(Payload::new("text"));
        w.process(id).await;

        let job = w.store.get(id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("classification timed out after 20ms")
        );
    }

    #[tokio::test]
    async fn cancelled_job_is_skipped() {
        let w = worker(Arc::new(KeywordClassifier), None);
        let id = w.store.create(Payload::new("text"));
        w.store.update(id, Transition::Cancel).unwrap();
        w.process(id).await;

        let job = w.store.get(id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.worker.is_none());
        assert!(job.started_at.is_none());
    }

    #[tokio::test]
    async fn watchdog_fails_stalled_jobs() {
        let store = Arc::new(JobStore::new());
        let id = store.create(Payload::new("stuck"));
        store.update(id, Transition::Claim { worker: 0 }).unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_watchdog(
            Arc::clone(&store),
            Some(Duration::from_millis(10)),
            None,
            Duration::from_millis(5),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let job = store.get(id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("stalled: no result after 10ms")
        );
    }

    #[tokio::test]
    async fn pool_processes_and_shuts_down() {
        let config = VerdictConfig {
            workers: 2,
            ..Default::default()
        };
        let store = Arc::new(JobStore::new());
        let queue = Arc::new(JobQueue::unbounded());
        let pool = WorkerPool::start(
            &config,
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::new(KeywordClassifier),
        );
        assert_eq!(pool.size(), 2);

        let id = store.create(Payload::new("According to officials"));
        queue.enqueue(id).await.unwrap();

        for _ in 0..200 {
            if store.get(id).unwrap().is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.get(id).unwrap().state, JobState::Done);

        pool.shutdown().await;
        assert!(matches!(
            queue.enqueue(store.create(Payload::new("late"))).await,
            Err(crate::error::VerdictError::QueueClosed)
        ));
    }
}
