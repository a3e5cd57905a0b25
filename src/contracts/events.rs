// Events - Amendment audit events
// Append-only records handed to the external audit log
//
// The engine only queues events. Writing them anywhere is the caller's job.

use crate::types::{AmendmentStatus, ChamberKind, ProposalId, Stage, Timestamp, VoterId};
use serde::{Deserialize, Serialize};

/// What happened to a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AmendmentEventKind {
    Proposed {
        proposer: VoterId,
        provision_key: String,
        entrenched: bool,
    },
    PanelSelected {
        stage: Stage,
        panel_size: usize,
    },
    VoteCast {
        stage: Stage,
        voter: VoterId,
    },
    ChallengeFiled {
        challenger: VoterId,
    },
    CoolingOffStarted {
        ends_at: Timestamp,
    },
    StatusChanged {
        from: AmendmentStatus,
        to: AmendmentStatus,
    },
    /// A phase transition discarded an unvoted chamber
    PhaseReset {
        chamber: ChamberKind,
        phase: String,
    },
}

/// Single audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentEvent {
    pub proposal_id: ProposalId,
    pub kind: AmendmentEventKind,
    /// Status after the event
    pub status: AmendmentStatus,
    pub at: Timestamp,
}

impl AmendmentEvent {
    pub fn new(
        proposal_id: ProposalId,
        kind: AmendmentEventKind,
        status: AmendmentStatus,
        at: Timestamp,
    ) -> Self {
        Self {
            proposal_id,
            kind,
            status,
            at,
        }
    }

    /// Confirmation and application must reach the external log
    pub fn is_audit_milestone(&self) -> bool {
        matches!(
            self.kind,
            AmendmentEventKind::StatusChanged {
                to: AmendmentStatus::Confirmed | AmendmentStatus::Applied,
                ..
            }
        )
    }
}
