//! Asynchronous text classification scheduler.
//!
//! Submissions go through the [`Dispatcher`], which records each job in the
//! [`JobStore`] and hands its id to the [`JobQueue`]. A [`WorkerPool`] drains
//! the queue, runs the configured [`Classifier`] and writes the outcome back
//! to the store, where callers poll for it.

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod state_machine;
pub mod store;
pub mod worker;

pub use classifier::{Classifier, ClassifierError, Verdict};
pub use config::VerdictConfig;
pub use dispatcher::{CancelOutcome, Dispatcher, SubmitRequest};
pub use error::{Result, VerdictError};
pub use queue::JobQueue;
pub use state_machine::{Job, JobId, JobState, JobStats, Payload};
pub use store::JobStore;
pub use worker::WorkerPool;
