//! Error types for classifier adapters.

use thiserror::Error;

/// Failures a classifier adapter can report for a single call or at load time.
///
/// A failed `classify` call is recorded on the job that triggered it and never
/// reaches the submitter.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No usable model is loaded.
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// The model was loaded but could not produce a prediction for the input.
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// The adapter produced a confidence outside `[0, 1]` (or NaN).
    #[error("confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    /// A model file could not be read or parsed.
    #[error("invalid model: {0}")]
    Model(String),
}
