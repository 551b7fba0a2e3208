mod job;
mod state;

pub use job::{Job, JobId, JobStats, Payload};
pub use state::{CANCELLED, JobState, StateMachine, Transition};
