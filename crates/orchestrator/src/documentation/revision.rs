//! Bounded retry for the generate and proofread loop.

use serde::{Deserialize, Serialize};

/// Rejections tolerated before a draft goes to a human instead of back to
/// proofreading.
pub const MAX_REVISIONS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionDecision {
    /// Send the revised draft back to proofreading
    Resubmit,
    /// Revisions are exhausted; ask for final approval
    Escalate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionPolicy {
    max_revisions: u32,
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        Self::new(MAX_REVISIONS)
    }
}

impl RevisionPolicy {
    pub fn new(max_revisions: u32) -> Self {
        Self { max_revisions }
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    /// Decide where a draft goes after its `revision_count`-th revision.
    pub fn decide(&self, revision_count: u32) -> RevisionDecision {
        if revision_count >= self.max_revisions {
            RevisionDecision::Escalate
        } else {
            RevisionDecision::Resubmit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_boundary() {
        let policy = RevisionPolicy::default();
        assert_eq!(policy.max_revisions(), 3);
        assert_eq!(policy.decide(1), RevisionDecision::Resubmit);
        assert_eq!(policy.decide(2), RevisionDecision::Resubmit);
        assert_eq!(policy.decide(3), RevisionDecision::Escalate);
        assert_eq!(policy.decide(4), RevisionDecision::Escalate);
    }

    #[test]
    fn test_single_revision_policy() {
        let policy = RevisionPolicy::new(1);
        assert_eq!(policy.decide(1), RevisionDecision::Escalate);
    }
}
