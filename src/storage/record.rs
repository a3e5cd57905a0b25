// Record - Versioned persisted proposal schema
// Principe: Validé une seule fois, au chargement
//
// A record is flat data. Everything the in-memory types make unrepresentable
// (confirmation ballots without a cooling-off window, overlapping panels,
// ballots from non-members) is rejected here, before a Proposal exists.

use crate::genesis::ConfigError;
use crate::types::{
    Affiliation, AmendmentStatus, ChamberDefinition, ChamberKind, ChamberRound, CoolingOffWindow,
    EntrenchmentTrack, Hash, Proposal, ProposalId, Stage, Timestamp, Vote, VoterId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Current persisted schema version
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// Persisted form of a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub schema_version: u32,
    pub id: ProposalId,
    pub proposer: VoterId,
    pub provision_key: String,
    pub current_value: Value,
    pub proposed_value: Value,
    pub justification: String,
    pub is_entrenched: bool,
    pub status: AmendmentStatus,
    pub created_at: Timestamp,
    pub decided_at: Option<Timestamp>,
    pub applied_at: Option<Timestamp>,
    pub chambers: Vec<ChamberRecord>,
    pub challenge_filed: bool,
    pub challenge_window_closes_at: Option<Timestamp>,
    pub cooling_off_started_at: Option<Timestamp>,
    pub cooling_off_ends_at: Option<Timestamp>,
    pub confirmation: Option<RoundRecord>,
}

/// A chamber round tagged with its chamber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberRecord {
    pub kind: ChamberKind,
    pub round: RoundRecord,
}

/// Panel, snapshotted definition and ballots of one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub panel_size: usize,
    pub pass_threshold: usize,
    pub panel: Vec<VoterId>,
    /// Region and organization of each member at selection
    pub affiliations: BTreeMap<VoterId, Affiliation>,
    pub votes: Vec<VoteRecord>,
    pub opened_at: Timestamp,
    pub deadline: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Hex-encoded vote identifier
    pub id: String,
    pub voter: VoterId,
    pub stage: Stage,
    pub approve: bool,
    pub attestation: String,
    pub cast_at: Timestamp,
    pub region: String,
    pub organization: String,
}

/// Integrity failures when loading persisted data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Unsupported record schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Malformed record for proposal {proposal_id}: {reason}")]
    Malformed {
        proposal_id: ProposalId,
        reason: String,
    },

    #[error("Duplicate proposal id {0}")]
    DuplicateProposal(ProposalId),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(String),
}

// =============================================================================
// PROPOSAL -> RECORD
// =============================================================================

impl VoteRecord {
    fn from_vote(vote: &Vote) -> Self {
        Self {
            id: hex::encode(vote.id.as_bytes()),
            voter: vote.voter.clone(),
            stage: vote.stage,
            approve: vote.approve,
            attestation: vote.attestation.clone(),
            cast_at: vote.cast_at,
            region: vote.region.clone(),
            organization: vote.organization.clone(),
        }
    }
}

impl RoundRecord {
    fn from_round(round: &ChamberRound) -> Self {
        Self {
            panel_size: round.definition.panel_size,
            pass_threshold: round.definition.pass_threshold,
            panel: round.panel.clone(),
            affiliations: round.affiliations.clone(),
            votes: round.votes.iter().map(VoteRecord::from_vote).collect(),
            opened_at: round.opened_at,
            deadline: round.deadline,
        }
    }
}

impl ProposalRecord {
    pub fn from_proposal(proposal: &Proposal) -> Self {
        let window = proposal.cooling_off();

        Self {
            schema_version: RECORD_SCHEMA_VERSION,
            id: proposal.id(),
            proposer: proposal.proposer().clone(),
            provision_key: proposal.provision_key().to_string(),
            current_value: proposal.current_value().clone(),
            proposed_value: proposal.proposed_value().clone(),
            justification: proposal.justification().to_string(),
            is_entrenched: proposal.is_entrenched(),
            status: proposal.status(),
            created_at: proposal.created_at(),
            decided_at: proposal.decided_at(),
            applied_at: proposal.applied_at(),
            chambers: proposal
                .chambers
                .iter()
                .map(|(kind, round)| ChamberRecord {
                    kind: *kind,
                    round: RoundRecord::from_round(round),
                })
                .collect(),
            challenge_filed: proposal.challenge_filed(),
            challenge_window_closes_at: proposal.challenge_window_closes_at(),
            cooling_off_started_at: window.map(|w| w.started_at),
            cooling_off_ends_at: window.map(|w| w.ends_at),
            confirmation: proposal
                .entrenchment()
                .and_then(|t| t.confirmation_round())
                .map(RoundRecord::from_round),
        }
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string_pretty(self).map_err(|e| RecordError::Json(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, RecordError> {
        serde_json::from_str(content).map_err(|e| RecordError::Json(e.to_string()))
    }

    // =========================================================================
    // RECORD -> PROPOSAL
    // =========================================================================

    /// Validate and rebuild the proposal
    pub fn into_proposal(self) -> Result<Proposal, RecordError> {
        if self.schema_version != RECORD_SCHEMA_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found: self.schema_version,
                expected: RECORD_SCHEMA_VERSION,
            });
        }

        let id = self.id;
        let malformed = |reason: String| RecordError::Malformed {
            proposal_id: id,
            reason,
        };

        if self.provision_key.trim().is_empty() {
            return Err(malformed("empty provision key".to_string()));
        }

        let mut chambers = BTreeMap::new();
        for chamber in self.chambers {
            let round = chamber.round.into_round(id, chamber.kind.into())?;
            if chambers.insert(chamber.kind, round).is_some() {
                return Err(malformed(format!("{} chamber recorded twice", chamber.kind)));
            }
        }

        let confirmation = self
            .confirmation
            .map(|round| round.into_round(id, Stage::Confirmation))
            .transpose()?;

        let window = match (self.cooling_off_started_at, self.cooling_off_ends_at) {
            (Some(started_at), Some(ends_at)) if started_at <= ends_at => {
                Some(CoolingOffWindow { started_at, ends_at })
            }
            (None, None) => None,
            _ => return Err(malformed("inconsistent cooling-off window".to_string())),
        };

        let entrenchment = entrenchment_track(self.is_entrenched, self.status, window, confirmation)
            .map_err(malformed)?;

        let mut seated = HashSet::new();
        for voter in chambers.values().flat_map(|round| round.panel.iter()) {
            if voter == &self.proposer {
                return Err(malformed(format!("proposer {} sits on a panel", voter)));
            }
            if !seated.insert(voter) {
                return Err(malformed(format!("{} sits on more than one panel", voter)));
            }
        }

        // Confirmation panels only have to avoid the ratifiers
        if let Some(round) = entrenchment.as_ref().and_then(|t| t.confirmation_round()) {
            let ratifiers = chambers
                .get(&ChamberKind::Ratification)
                .map(|r| r.panel.as_slice())
                .unwrap_or(&[]);
            for voter in &round.panel {
                if voter == &self.proposer {
                    return Err(malformed(format!("proposer {} sits on a panel", voter)));
                }
                if ratifiers.contains(voter) {
                    return Err(malformed(format!(
                        "{} sits on both ratification and confirmation panels",
                        voter
                    )));
                }
            }
        }

        if self.status == AmendmentStatus::Proposed && !chambers.is_empty() {
            return Err(malformed("proposed record carries chamber rounds".to_string()));
        }
        if self.status == AmendmentStatus::ProposalChamberVoting
            && !chambers.contains_key(&ChamberKind::Proposal)
        {
            return Err(malformed("proposal chamber voting without a panel".to_string()));
        }
        if self.status == AmendmentStatus::ChallengeWindow
            && self.challenge_window_closes_at.is_none()
        {
            return Err(malformed("challenge window without a closing time".to_string()));
        }
        if self.status == AmendmentStatus::Applied && self.applied_at.is_none() {
            return Err(malformed("applied without an application time".to_string()));
        }

        Ok(Proposal {
            id,
            proposer: self.proposer,
            provision_key: self.provision_key,
            current_value: self.current_value,
            proposed_value: self.proposed_value,
            justification: self.justification,
            status: self.status,
            created_at: self.created_at,
            decided_at: self.decided_at,
            applied_at: self.applied_at,
            chambers,
            challenge_filed: self.challenge_filed,
            challenge_window_closes_at: self.challenge_window_closes_at,
            entrenchment,
        })
    }
}

/// Rebuild the entrenchment track, checking it against the status
fn entrenchment_track(
    is_entrenched: bool,
    status: AmendmentStatus,
    window: Option<CoolingOffWindow>,
    confirmation: Option<ChamberRound>,
) -> Result<Option<EntrenchmentTrack>, String> {
    use AmendmentStatus::*;

    if !is_entrenched {
        if window.is_some() || confirmation.is_some() {
            return Err("standard proposal carries entrenchment data".to_string());
        }
        if matches!(status, CoolingOff | ConfirmationVote) {
            return Err(format!("standard proposal in status {}", status));
        }
        return Ok(None);
    }

    let track = match (window, confirmation) {
        (None, None) => {
            if matches!(status, ConfirmationVote | Confirmed | Applied) {
                return Err(format!("entrenched proposal in status {} without cooling-off", status));
            }
            EntrenchmentTrack::AwaitingCoolingOff
        }
        (Some(window), None) => {
            if status != CoolingOff {
                return Err(format!("cooling-off window recorded in status {}", status));
            }
            EntrenchmentTrack::CoolingOff { window }
        }
        (Some(window), Some(round)) => {
            if !matches!(status, ConfirmationVote | Confirmed | Applied | Rejected | Lapsed) {
                return Err(format!("confirmation round recorded in status {}", status));
            }
            EntrenchmentTrack::Confirmation { window, round }
        }
        (None, Some(_)) => {
            return Err("confirmation round without a cooling-off window".to_string());
        }
    };
    Ok(Some(track))
}

impl RoundRecord {
    fn into_round(self, proposal_id: ProposalId, stage: Stage) -> Result<ChamberRound, RecordError> {
        let malformed = |reason: String| RecordError::Malformed {
            proposal_id,
            reason: format!("{} round: {}", stage, reason),
        };

        if self.pass_threshold == 0 || self.pass_threshold > self.panel_size {
            return Err(malformed(format!(
                "pass threshold {} outside 1..={}",
                self.pass_threshold, self.panel_size
            )));
        }
        if self.panel.len() != self.panel_size {
            return Err(malformed(format!(
                "panel has {} members, definition says {}",
                self.panel.len(),
                self.panel_size
            )));
        }
        let members: HashSet<&VoterId> = self.panel.iter().collect();
        if members.len() != self.panel.len() {
            return Err(malformed("duplicate panel member".to_string()));
        }
        if self.affiliations.len() != self.panel.len()
            || !self.panel.iter().all(|m| self.affiliations.contains_key(m))
        {
            return Err(malformed("affiliations do not match the panel".to_string()));
        }
        if self.deadline < self.opened_at {
            return Err(malformed("deadline precedes opening".to_string()));
        }

        let mut voted = HashSet::new();
        let mut votes = Vec::with_capacity(self.votes.len());
        for record in self.votes {
            if record.stage != stage {
                return Err(malformed(format!("ballot tagged {}", record.stage)));
            }
            if !members.contains(&record.voter) {
                return Err(malformed(format!("{} voted without a seat", record.voter)));
            }
            if !voted.insert(record.voter.clone()) {
                return Err(malformed(format!("{} voted twice", record.voter)));
            }
            let seated = self
                .affiliations
                .get(&record.voter)
                .ok_or_else(|| malformed(format!("{} has no recorded affiliation", record.voter)))?;
            if seated.region != record.region || seated.organization != record.organization {
                return Err(malformed(format!(
                    "{} voted under an affiliation other than their seat",
                    record.voter
                )));
            }

            let expected = Vote::derive_id(proposal_id, stage, &record.voter);
            let id = decode_hash(&record.id)
                .ok_or_else(|| malformed(format!("vote id '{}' is not a 32-byte hex digest", record.id)))?;
            if id != expected {
                return Err(malformed(format!("vote id mismatch for {}", record.voter)));
            }

            votes.push(Vote {
                id,
                voter: record.voter,
                stage,
                approve: record.approve,
                attestation: record.attestation,
                cast_at: record.cast_at,
                region: record.region,
                organization: record.organization,
            });
        }

        Ok(ChamberRound {
            definition: ChamberDefinition::new(self.panel_size, self.pass_threshold),
            panel: self.panel,
            affiliations: self.affiliations,
            votes,
            opened_at: self.opened_at,
            deadline: self.deadline,
        })
    }
}

fn decode_hash(encoded: &str) -> Option<Hash> {
    let bytes: [u8; 32] = hex::decode(encoded).ok()?.try_into().ok()?;
    Some(Hash::from_bytes(bytes))
}
