use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::config::VerdictConfig;
use crate::error::{Result, VerdictError};
use crate::queue::{JobQueue, Slot};
use crate::state_machine::{Job, JobId, JobState, JobStats, Payload, Transition};
use crate::store::JobStore;
use crate::worker::WorkerPool;

/// A classification request as received from a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

impl SubmitRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The job was still pending and is now failed with reason "cancelled".
    Cancelled,
    /// A worker already claimed the job; it will run to completion.
    AlreadyRunning,
    AlreadyFinished,
}

/// Entry point for submitting jobs and querying their state.
///
/// Cheap to clone; clones share the same store and queue. No operation waits
/// for a job to complete.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    max_payload_bytes: usize,
    workers: usize,
}

impl Dispatcher {
    pub fn new(config: &VerdictConfig, store: Arc<JobStore>, queue: Arc<JobQueue>) -> Self {
        Self {
            store,
            queue,
            max_payload_bytes: config.max_payload_bytes,
            workers: config.workers,
        }
    }

    /// Build the store and queue described by `config`, start a worker pool
    /// over them and return the dispatcher that feeds it.
    pub fn start(
        config: &VerdictConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<(Self, WorkerPool)> {
        config.validate()?;
        let store = Arc::new(JobStore::new());
        let queue = Arc::new(JobQueue::new(config.queue_capacity));
        let pool = WorkerPool::start(config, Arc::clone(&store), Arc::clone(&queue), classifier);
        Ok((Self::new(config, store, queue), pool))
    }

    fn validate(&self, request: SubmitRequest) -> Result<Payload> {
        if request.text.trim().is_empty() {
            return Err(VerdictError::InvalidPayload(
                "text must not be empty".into(),
            ));
        }
        if request.text.len() > self.max_payload_bytes {
            return Err(VerdictError::InvalidPayload(format!(
                "text is {} bytes, limit is {}",
                request.text.len(),
                self.max_payload_bytes
            )));
        }
        Ok(Payload { text: request.text })
    }

    fn admit(&self, slot: Slot<'_>, payload: Payload) -> Result<JobId> {
        let id = self.store.create(payload);
        if let Err(e) = slot.push(id) {
            // The queue closed between reserving and pushing; nobody will
            // ever dequeue this job.
            match self.store.update(id, Transition::Abort(e.to_string())) {
                Ok(_) => tracing::warn!(job_id = %id, error = %e, "Job abandoned"),
                Err(update) => {
                    tracing::warn!(job_id = %id, error = %update, "Could not settle abandoned job")
                }
            }
            return Err(e);
        }
        tracing::debug!(job_id = %id, queued = self.queue.len(), "Job submitted");
        Ok(id)
    }

    /// Validate, create and enqueue a job. Waits for room only when the
    /// queue is bounded and full. Invalid payloads create no job.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId> {
        let payload = self.validate(request)?;
        let slot = self.queue.reserve().await?;
        self.admit(slot, payload)
    }

    /// Like [`Dispatcher::submit`] but fails with `QueueFull` instead of
    /// waiting. A rejected submission creates no job.
    pub fn try_submit(&self, request: SubmitRequest) -> Result<JobId> {
        let payload = self.validate(request)?;
        let slot = self.queue.try_reserve()?;
        self.admit(slot, payload)
    }

    /// Snapshot of one job. Unknown or malformed ids are `NotFound`.
    pub fn get_job(&self, id: &str) -> Result<Job> {
        self.store.get(id.parse()?)
    }

    /// Snapshots of every job in submission order.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Withdraw a job that no worker has claimed yet. Its queue place is
    /// freed at once. Running jobs are left to finish.
    pub fn cancel(&self, id: &str) -> Result<CancelOutcome> {
        let id: JobId = id.parse()?;
        match self.store.update(id, Transition::Cancel) {
            Ok(_) => {
                // False when a worker has dequeued the id but not claimed it
                // yet; that worker skips it.
                let withdrawn = self.queue.remove(id);
                tracing::info!(job_id = %id, withdrawn, "Job cancelled");
                Ok(CancelOutcome::Cancelled)
            }
            Err(VerdictError::InvalidTransition {
                from: JobState::Running,
                ..
            }) => Ok(CancelOutcome::AlreadyRunning),
            Err(VerdictError::InvalidTransition { .. }) => Ok(CancelOutcome::AlreadyFinished),
            Err(e) => Err(e),
        }
    }

    pub fn stats(&self) -> JobStats {
        JobStats {
            queued: self.queue.len(),
            workers: self.workers,
            ..self.store.stats()
        }
    }
}
