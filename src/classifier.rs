// src/classifier.rs
//! External classifier collaborator boundary.
//!
//! A remote model (or any other classifier) can override the lexical
//! emotion vector per record. Failures here must never abort the pipeline:
//! they are caught per record and the lexical result is used as fallback.
//! Retry/backoff discipline belongs to the implementation behind the
//! trait, not to this crate.

use anyhow::Result;
use metrics::counter;
use tracing::warn;

use crate::scoring::ScoreVector;

/// Optional per-record classifier consumed by the chunk worker.
pub trait ExternalClassifier: Send + Sync {
    /// Classify a text into a proportional category distribution.
    fn classify(&self, text: &str) -> Result<ScoreVector>;
    /// Name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Deterministic mock used in tests: returns a fixed vector, or an error
/// when constructed as failing.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    fixed: ScoreVector,
    failing: bool,
}

impl MockClassifier {
    pub fn fixed(vector: ScoreVector) -> Self {
        Self {
            fixed: vector,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fixed: ScoreVector::empty(),
            failing: true,
        }
    }
}

impl ExternalClassifier for MockClassifier {
    fn classify(&self, _text: &str) -> Result<ScoreVector> {
        if self.failing {
            anyhow::bail!("mock classifier down");
        }
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Apply the classifier if present; on any failure (or an empty override)
/// fall back to the lexical vector. Fallbacks are logged and counted.
pub fn classify_or_fallback(
    classifier: Option<&dyn ExternalClassifier>,
    text: &str,
    lexical: ScoreVector,
) -> ScoreVector {
    let Some(c) = classifier else {
        return lexical;
    };
    match c.classify(text) {
        Ok(v) if !v.is_empty() => v,
        Ok(_) => lexical,
        Err(e) => {
            warn!(classifier = c.name(), error = %e, "classifier failed, using lexical result");
            counter!("classifier_fallback_total").increment(1);
            lexical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_when_classifier_succeeds() {
        let over = ScoreVector::from_weights(vec![("alegria".into(), 1.0)]);
        let mock = MockClassifier::fixed(over.clone());
        let lexical = ScoreVector::neutral();
        let got = classify_or_fallback(Some(&mock), "da igual", lexical);
        assert_eq!(got, over);
    }

    #[test]
    fn failure_falls_back_to_lexical() {
        let mock = MockClassifier::failing();
        let lexical = ScoreVector::neutral();
        let got = classify_or_fallback(Some(&mock), "da igual", lexical.clone());
        assert_eq!(got, lexical);
    }

    #[test]
    fn empty_override_falls_back_too() {
        let mock = MockClassifier::fixed(ScoreVector::empty());
        let lexical = ScoreVector::from_weights(vec![("enojo".into(), 1.0)]);
        let got = classify_or_fallback(Some(&mock), "da igual", lexical.clone());
        assert_eq!(got, lexical);
    }

    #[test]
    fn absent_classifier_is_a_no_op() {
        let lexical = ScoreVector::neutral();
        assert_eq!(classify_or_fallback(None, "x", lexical.clone()), lexical);
    }
}
