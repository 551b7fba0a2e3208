pub mod error;
pub mod keyword;
pub mod linear;
pub mod types;

use std::path::Path;
use std::sync::Arc;

pub use error::ClassifierError;
pub use keyword::KeywordClassifier;
pub use linear::LinearModel;
pub use types::{LABEL_FAKE, LABEL_REAL, Verdict};

/// A binary text classifier shared by every worker in the pool.
///
/// Calls are synchronous and may run concurrently from several blocking
/// threads, so implementations must be `Send + Sync`. An adapter that is not
/// safe for concurrent use should serialise access internally.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifierError>;
}

/// Stands in for a model that failed to load. Every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableClassifier {
    reason: String,
}

impl UnavailableClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Classifier for UnavailableClassifier {
    fn classify(&self, _text: &str) -> Result<Verdict, ClassifierError> {
        Err(ClassifierError::Unavailable(self.reason.clone()))
    }
}

/// Resolve the classifier for a run.
///
/// With no model path the keyword classifier is used. A model that fails to
/// load does not stop the scheduler: jobs are accepted and fail individually
/// with the load error.
pub fn load(model_path: Option<&Path>) -> Arc<dyn Classifier> {
    match model_path {
        None => Arc::new(KeywordClassifier),
        Some(path) => match LinearModel::load(path) {
            Ok(model) => {
                tracing::info!(path = %path.display(), "Model loaded");
                Arc::new(model)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not load model");
                Arc::new(UnavailableClassifier::new(format!("model not loaded ({e})")))
            }
        },
    }
}
