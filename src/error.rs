use thiserror::Error;

use crate::state_machine::{JobId, JobState};

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Queue is full, retry later")]
    QueueFull,

    #[error("Queue is closed, scheduler is shutting down")]
    QueueClosed,

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, VerdictError>;
