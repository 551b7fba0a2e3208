use super::error::ClassifierError;
use super::types::{LABEL_FAKE, LABEL_REAL, Verdict};
use super::Classifier;

/// Sensational phrasing typical of fabricated stories.
const FAKE_CUES: &[(&str, u32)] = &[
    ("breaking", 8),
    ("shocking", 10),
    ("scandal", 8),
    ("you won't believe", 12),
    ("miracle", 10),
    ("secret", 6),
    ("exposed", 7),
    ("celebrity", 5),
    ("hoax", 6),
    ("conspiracy", 9),
    ("leaked", 5),
    ("viral", 4),
];

/// Sourcing and measured language typical of genuine reporting.
const REAL_CUES: &[(&str, u32)] = &[
    ("according to", 10),
    ("study", 6),
    ("report", 5),
    ("officials", 7),
    ("percent", 5),
    ("announced", 6),
    ("data", 4),
    ("researchers", 8),
    ("spokesperson", 7),
    ("confirmed", 5),
];

// Dampens confidence for texts with only a few weak cues.
const SMOOTHING: f64 = 10.0;

/// Weighted cue scoring between the "real" and "fake" labels.
///
/// Always available; used when no trained model is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    /// Returns `(fake_score, real_score)` for `text`.
    pub fn score(text: &str) -> (u32, u32) {
        let lower = text.to_lowercase();

        let mut fake: u32 = FAKE_CUES
            .iter()
            .filter(|(cue, _)| lower.contains(cue))
            .map(|&(_, weight)| weight)
            .sum();
        let real: u32 = REAL_CUES
            .iter()
            .filter(|(cue, _)| lower.contains(cue))
            .map(|&(_, weight)| weight)
            .sum();

        // Shouting heuristics
        let exclamations = text.matches('!').count().min(5) as u32;
        fake += exclamations * 3;
        let shouted = text
            .split_whitespace()
            .filter(|w| w.len() > 3 && w.chars().all(|c| !c.is_lowercase()) && w.chars().any(char::is_alphabetic))
            .count()
            .min(5) as u32;
        fake += shouted * 2;

        (fake, real)
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifierError> {
        let (fake, real) = Self::score(text);
        let label = if fake > real { LABEL_FAKE } else { LABEL_REAL };
        let margin = f64::from(fake.abs_diff(real));
        let total = f64::from(fake + real) + SMOOTHING;
        Verdict::new(label, 0.5 + 0.5 * margin / total)
    }
}
