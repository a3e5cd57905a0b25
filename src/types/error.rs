// Errors - Amendment protocol failure taxonomy
//
// Validation and state errors are routine and leave everything untouched.
// A constitutional violation means the caller tried to bypass a stage.

use super::amendment::Stage;
use super::primitives::{ProposalId, VoterId};

/// Errors that can occur during amendment operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmendmentError {
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// Malformed or disallowed input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("{voter} already voted in the {stage} stage")]
    AlreadyVoted { voter: VoterId, stage: Stage },

    #[error("{voter} is not on the {stage} panel")]
    NotPanelMember { voter: VoterId, stage: Stage },

    #[error("Only the proposer can {action}")]
    NotProposer { action: String },

    #[error("Voting for the {0} stage has closed")]
    VotingClosed(Stage),

    #[error("A {0} panel has already been selected")]
    PanelAlreadySelected(Stage),

    #[error("No {0} panel has been selected")]
    PanelNotSelected(Stage),

    #[error("Panel selection failed: {0}")]
    Diversity(#[from] DiversityError),

    /// An attempt to apply a change that skipped a required stage
    #[error("Constitutional violation on proposal {proposal_id}: {reason}")]
    ConstitutionalViolation {
        proposal_id: ProposalId,
        reason: String,
    },
}

impl AmendmentError {
    /// Wrong status, double voting, non-member voting and similar
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            AmendmentError::InvalidState { .. }
                | AmendmentError::AlreadyVoted { .. }
                | AmendmentError::NotPanelMember { .. }
                | AmendmentError::NotProposer { .. }
                | AmendmentError::VotingClosed(_)
                | AmendmentError::PanelAlreadySelected(_)
                | AmendmentError::PanelNotSelected(_)
        )
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, AmendmentError::Validation(_))
    }

    pub fn is_constitutional_violation(&self) -> bool {
        matches!(self, AmendmentError::ConstitutionalViolation { .. })
    }
}

/// No panel satisfying the diversity constraints can be formed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiversityError {
    #[error("Requested panel of {requested} seats but only {available} eligible candidates")]
    InsufficientCandidates { requested: usize, available: usize },

    #[error("Need {required} distinct regions, only {available} available")]
    InsufficientRegions { required: usize, available: usize },

    #[error("Need {required} distinct organizations, only {available} available")]
    InsufficientOrganizations { required: usize, available: usize },

    #[error("Panel of {size} seats cannot represent {required} distinct {dimension}")]
    PanelTooSmall {
        size: usize,
        required: usize,
        dimension: &'static str,
    },

    #[error("Concentration cap of {cap} per group leaves panel at {selected}/{requested} seats")]
    ConcentrationCapExhausted {
        cap: usize,
        selected: usize,
        requested: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let state = AmendmentError::AlreadyVoted {
            voter: VoterId::new("alice"),
            stage: Stage::Proposal,
        };
        assert!(state.is_state_error());
        assert!(!state.is_validation_error());

        let violation = AmendmentError::ConstitutionalViolation {
            proposal_id: 3,
            reason: "no cooling-off window".to_string(),
        };
        assert!(violation.is_constitutional_violation());
        assert!(!violation.is_state_error());

        let diversity: AmendmentError = DiversityError::InsufficientRegions {
            required: 3,
            available: 1,
        }
        .into();
        assert!(!diversity.is_state_error());
        assert_eq!(
            diversity.to_string(),
            "Panel selection failed: Need 3 distinct regions, only 1 available"
        );
    }
}
