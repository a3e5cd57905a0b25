// KratOs Amendments - Constitutional amendment engine
// Principle: No single bloc can capture or stall the rules, and foundations change slowest
//
// Synchronous state transformer. Every time-sensitive call takes an explicit
// timestamp; the roster, the live configuration and the audit log belong to
// the caller.

pub mod contracts;
pub mod genesis;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

pub use contracts::{
    AmendmentContract, AmendmentEvent, AmendmentEventKind, PhaseTransitionReport, RoundOutcome,
};
pub use genesis::{ConfigError, ConstitutionConfig, PhaseConfig};
pub use storage::{ProposalRecord, RecordError, RECORD_SCHEMA_VERSION};
pub use types::{
    AmendmentError, AmendmentStatus, ChamberKind, DiversityError, Proposal, ProposalId, Stage,
    Timestamp, Voter, VoterId,
};
