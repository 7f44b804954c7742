use serde::{Deserialize, Serialize};

/// Outcome of proofreading a document.
///
/// A verdict with no suggestions is an approval; any suggestion makes it a
/// rejection. `is_approved` is the only signal used for branching.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewVerdict {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ReviewVerdict {
    pub fn approved() -> Self {
        Self::default()
    }

    pub fn rejected(explanation: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            explanation: explanation.into(),
            suggestions,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.suggestions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_verdict() {
        let verdict = ReviewVerdict::approved();
        assert!(verdict.is_approved());
        assert!(verdict.explanation.is_empty());
    }

    #[test]
    fn test_rejection_requires_suggestions() {
        let verdict = ReviewVerdict::rejected("Tone is off", vec!["Be formal".to_string()]);
        assert!(!verdict.is_approved());

        // An explanation alone does not reject.
        let verdict = ReviewVerdict::rejected("Minor nits", vec![]);
        assert!(verdict.is_approved());
    }

    #[test]
    fn test_missing_fields_deserialize_to_approved() {
        let verdict: ReviewVerdict = serde_json::from_str("{}").unwrap();
        assert!(verdict.is_approved());
    }
}
