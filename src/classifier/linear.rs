//! Pre-trained logistic regression over TF-IDF features, loaded from JSON.
//!
//! The model file carries the two class labels, the intercept, one weight per
//! vocabulary term and an optional IDF table:
//!
//! ```json
//! {
//!   "labels": ["real", "fake"],
//!   "intercept": -0.3,
//!   "weights": { "scandal": 2.1, "officials": -1.7 },
//!   "idf": { "scandal": 3.2, "officials": 2.4 }
//! }
//! ```
//!
//! A positive score favours `labels[1]`. Terms missing from `idf` get an IDF
//! of 1.0.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::error::ClassifierError;
use super::types::Verdict;
use super::Classifier;

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    labels: [String; 2],
    #[serde(default)]
    intercept: f64,
    weights: HashMap<String, f64>,
    #[serde(default)]
    idf: HashMap<String, f64>,
}

impl LinearModel {
    /// Read and parse a model file.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::Model(format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ClassifierError> {
        let model: LinearModel =
            serde_json::from_str(contents).map_err(|e| ClassifierError::Model(e.to_string()))?;
        if model.weights.is_empty() {
            return Err(ClassifierError::Model("model has no weights".into()));
        }
        if model.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ClassifierError::Model("labels must not be empty".into()));
        }
        Ok(model)
    }

    pub fn labels(&self) -> &[String; 2] {
        &self.labels
    }

    /// L2-normalised TF-IDF vector of the input, keyed by term.
    fn features(&self, text: &str) -> HashMap<String, f64> {
        let mut counts: HashMap<String, f64> = HashMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0.0) += 1.0;
        }
        for (term, value) in counts.iter_mut() {
            *value *= self.idf.get(term).copied().unwrap_or(1.0);
        }
        let norm = counts.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in counts.values_mut() {
                *value /= norm;
            }
        }
        counts
    }

    /// Probability of `labels[1]`.
    pub fn probability(&self, text: &str) -> f64 {
        let z = self.intercept
            + self
                .features(text)
                .iter()
                .filter_map(|(term, x)| self.weights.get(term).map(|w| w * x))
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
}

impl Classifier for LinearModel {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifierError> {
        let p = self.probability(text);
        if !p.is_finite() {
            return Err(ClassifierError::Prediction(format!(
                "non-finite score for input of {} bytes",
                text.len()
            )));
        }
        if p >= 0.5 {
            Verdict::new(self.labels[1].clone(), p)
        } else {
            Verdict::new(self.labels[0].clone(), 1.0 - p)
        }
    }
}
