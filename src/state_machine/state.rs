use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::job::Job;
use crate::classifier::Verdict;
use crate::error::{Result, VerdictError};

/// Error recorded on a pending job that was cancelled before a worker
/// claimed it.
pub const CANCELLED: &str = "cancelled";

/// Lifecycle state of a job.
///
/// Jobs flow: PENDING → RUNNING → {DONE | FAILED}. A pending job may also be
/// cancelled straight to FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    /// `Done` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Done => write!(f, "done"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// A requested change to a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A worker took the job off the queue.
    Claim { worker: usize },
    /// Classification produced a verdict.
    Succeed(Verdict),
    /// Classification failed, timed out, or the job stalled.
    Fail(String),
    /// The job was withdrawn before any worker claimed it.
    Cancel,
    /// The job can never reach a worker, e.g. the queue closed under it.
    Abort(String),
}

impl Transition {
    /// The state this transition moves a job into.
    pub fn target(&self) -> JobState {
        match self {
            Transition::Claim { .. } => JobState::Running,
            Transition::Succeed(_) => JobState::Done,
            Transition::Fail(_) | Transition::Cancel | Transition::Abort(_) => JobState::Failed,
        }
    }

    fn source(&self) -> JobState {
        match self {
            Transition::Claim { .. } | Transition::Cancel | Transition::Abort(_) => {
                JobState::Pending
            }
            Transition::Succeed(_) | Transition::Fail(_) => JobState::Running,
        }
    }
}

/// Applies transitions to job records, enforcing monotonic ordering.
pub struct StateMachine;

impl StateMachine {
    /// Apply `transition` to `job` in place.
    ///
    /// Each transition is legal from exactly one source state. On rejection
    /// the job is left untouched. Timestamps are only ever written once.
    pub fn apply(job: &mut Job, transition: Transition) -> Result<()> {
        if job.state != transition.source() {
            return Err(VerdictError::InvalidTransition {
                id: job.id,
                from: job.state,
                to: transition.target(),
            });
        }

        let now = Utc::now();
        job.state = transition.target();
        match transition {
            Transition::Claim { worker } => {
                job.worker = Some(worker);
                job.started_at = job.started_at.or(Some(now));
            }
            Transition::Succeed(verdict) => {
                job.result = Some(verdict);
                job.finished_at = job.finished_at.or(Some(now));
            }
            Transition::Fail(reason) | Transition::Abort(reason) => {
                job.error = Some(if reason.trim().is_empty() {
                    "unknown failure".to_string()
                } else {
                    reason
                });
                job.finished_at = job.finished_at.or(Some(now));
            }
            Transition::Cancel => {
                job.error = Some(CANCELLED.to_string());
                job.finished_at = job.finished_at.or(Some(now));
            }
        }

        Ok(())
    }
}
