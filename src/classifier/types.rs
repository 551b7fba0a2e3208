use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

pub const LABEL_REAL: &str = "real";
pub const LABEL_FAKE: &str = "fake";

/// Outcome of a successful classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: String,
    /// Probability of `label`, always within `[0, 1]`.
    pub confidence: f64,
}

impl Verdict {
    /// Build a verdict, rejecting confidences outside `[0, 1]` and NaN.
    pub fn new(label: impl Into<String>, confidence: f64) -> Result<Self, ClassifierError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ClassifierError::InvalidConfidence(confidence));
        }
        Ok(Self {
            label: label.into(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        assert!(Verdict::new(LABEL_REAL, 0.0).is_ok());
        assert!(Verdict::new(LABEL_FAKE, 1.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(matches!(
            Verdict::new(LABEL_REAL, 1.01),
            Err(ClassifierError::InvalidConfidence(_))
        ));
        assert!(Verdict::new(LABEL_REAL, -0.1).is_err());
        assert!(Verdict::new(LABEL_REAL, f64::NAN).is_err());
    }
}
