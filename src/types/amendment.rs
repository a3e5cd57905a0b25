// Amendment - Constitutional amendment records
// Proposal state, chamber rounds, ballots and the entrenchment track
//
// Principle: Illegal stage combinations are unrepresentable, not checked.

use super::error::AmendmentError;
use super::primitives::{Hash, ProposalId, Timestamp, Voter, VoterId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// CHAMBERS & STAGES
// =============================================================================

/// The three chambers a proposal passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChamberKind {
    /// First reading: does the community want to consider this change?
    Proposal,
    /// Second reading by a disjoint panel
    Ratification,
    /// Convened only when a challenge is filed against a ratified change
    Challenge,
}

impl ChamberKind {
    pub const ALL: [ChamberKind; 3] = [
        ChamberKind::Proposal,
        ChamberKind::Ratification,
        ChamberKind::Challenge,
    ];

    /// Status a proposal holds while this chamber is voting
    pub fn voting_status(&self) -> AmendmentStatus {
        match self {
            ChamberKind::Proposal => AmendmentStatus::ProposalChamberVoting,
            ChamberKind::Ratification => AmendmentStatus::RatificationChamberVoting,
            ChamberKind::Challenge => AmendmentStatus::ChallengeChamberVoting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChamberKind::Proposal => "proposal",
            ChamberKind::Ratification => "ratification",
            ChamberKind::Challenge => "challenge",
        }
    }
}

impl fmt::Display for ChamberKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag carried by every ballot: a chamber, or the entrenched confirmation vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Proposal,
    Ratification,
    Challenge,
    Confirmation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Proposal => "proposal",
            Stage::Ratification => "ratification",
            Stage::Challenge => "challenge",
            Stage::Confirmation => "confirmation",
        }
    }
}

impl From<ChamberKind> for Stage {
    fn from(kind: ChamberKind) -> Self {
        match kind {
            ChamberKind::Proposal => Stage::Proposal,
            ChamberKind::Ratification => Stage::Ratification,
            ChamberKind::Challenge => Stage::Challenge,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and pass threshold of a chamber, as configured for a governance phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberDefinition {
    /// Number of seats on the panel
    pub panel_size: usize,

    /// Number of YES votes required to pass
    pub pass_threshold: usize,
}

impl ChamberDefinition {
    pub const fn new(panel_size: usize, pass_threshold: usize) -> Self {
        Self {
            panel_size,
            pass_threshold,
        }
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Current status of an amendment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentStatus {
    /// Submitted, no panel selected yet
    Proposed,
    /// Proposal chamber panel selected, accepting votes
    ProposalChamberVoting,
    /// Proposal chamber passed, ratification chamber convening or voting
    RatificationChamberVoting,
    /// Ratified, open to challenge until the window closes
    ChallengeWindow,
    /// Challenge filed, challenge chamber convening or voting
    ChallengeChamberVoting,
    /// Entrenched only: fixed waiting period before confirmation
    CoolingOff,
    /// Entrenched only: disjoint confirmation panel voting
    ConfirmationVote,
    /// All required stages passed, awaiting application
    Confirmed,
    /// Written to live configuration (final)
    Applied,
    /// Actively voted down
    Rejected,
    /// Deadline passed without enough participation
    Lapsed,
    /// Withdrawn by the proposer before any vote
    Withdrawn,
}

impl AmendmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmendmentStatus::Proposed => "proposed",
            AmendmentStatus::ProposalChamberVoting => "proposal_chamber_voting",
            AmendmentStatus::RatificationChamberVoting => "ratification_chamber_voting",
            AmendmentStatus::ChallengeWindow => "challenge_window",
            AmendmentStatus::ChallengeChamberVoting => "challenge_chamber_voting",
            AmendmentStatus::CoolingOff => "cooling_off",
            AmendmentStatus::ConfirmationVote => "confirmation_vote",
            AmendmentStatus::Confirmed => "confirmed",
            AmendmentStatus::Applied => "applied",
            AmendmentStatus::Rejected => "rejected",
            AmendmentStatus::Lapsed => "lapsed",
            AmendmentStatus::Withdrawn => "withdrawn",
        }
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AmendmentStatus::Applied
                | AmendmentStatus::Rejected
                | AmendmentStatus::Lapsed
                | AmendmentStatus::Withdrawn
        )
    }

    /// Chamber whose vote is running in this status, if any
    pub fn open_chamber(&self) -> Option<ChamberKind> {
        match self {
            AmendmentStatus::ProposalChamberVoting => Some(ChamberKind::Proposal),
            AmendmentStatus::RatificationChamberVoting => Some(ChamberKind::Ratification),
            AmendmentStatus::ChallengeChamberVoting => Some(ChamberKind::Challenge),
            _ => None,
        }
    }

    /// Forward edges of the two pathway graphs
    ///
    /// Standard: PROPOSED → PROPOSAL → RATIFICATION → CHALLENGE_WINDOW →
    /// [CHALLENGE] → CONFIRMED → APPLIED. Entrenched inserts COOLING_OFF →
    /// CONFIRMATION_VOTE before CONFIRMED. REJECTED, LAPSED and WITHDRAWN exit
    /// from the voting stages.
    pub fn can_transition_to(&self, next: AmendmentStatus, entrenched: bool) -> bool {
        use AmendmentStatus::*;

        match (self, next) {
            (Proposed, ProposalChamberVoting) => true,
            (Proposed, Withdrawn) => true,

            (ProposalChamberVoting, RatificationChamberVoting) => true,
            (ProposalChamberVoting, Rejected | Lapsed | Withdrawn) => true,

            (RatificationChamberVoting, ChallengeWindow) => true,
            (RatificationChamberVoting, Rejected | Lapsed) => true,

            (ChallengeWindow, ChallengeChamberVoting) => true,
            (ChallengeWindow, CoolingOff) => entrenched,
            (ChallengeWindow, Confirmed) => !entrenched,

            (ChallengeChamberVoting, CoolingOff) => entrenched,
            (ChallengeChamberVoting, Confirmed) => !entrenched,
            (ChallengeChamberVoting, Rejected | Lapsed) => true,

            (CoolingOff, ConfirmationVote) => entrenched,

            (ConfirmationVote, Confirmed | Rejected | Lapsed) => entrenched,

            (Confirmed, Applied) => true,

            _ => false,
        }
    }
}

impl fmt::Display for AmendmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// BALLOTS
// =============================================================================

/// A recorded ballot. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Deterministic identifier, see [`Vote::derive_id`]
    pub id: Hash,

    pub voter: VoterId,

    pub stage: Stage,

    /// true = YES
    pub approve: bool,

    /// Voter's statement that they reviewed the proposal
    pub attestation: String,

    pub cast_at: Timestamp,

    pub region: String,

    pub organization: String,
}

impl Vote {
    /// Derive a vote identifier from (proposal, stage, voter)
    ///
    /// A voter has at most one ballot per stage, so the triple is unique.
    pub fn derive_id(proposal_id: ProposalId, stage: Stage, voter: &VoterId) -> Hash {
        let mut data = Vec::with_capacity(8 + 16 + voter.as_str().len());
        data.extend_from_slice(&proposal_id.to_le_bytes());
        data.extend_from_slice(stage.as_str().as_bytes());
        data.push(0);
        data.extend_from_slice(voter.as_str().as_bytes());
        Hash::hash(&data)
    }
}

/// Head-count tally of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
    pub panel_size: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.yes + self.no
    }

    /// votes / panel_size >= percent / 100
    pub fn participation_reaches(&self, percent: u8) -> bool {
        self.total().saturating_mul(100) >= self.panel_size.saturating_mul(percent as usize)
    }

    /// yes / votes >= percent / 100 (false when nobody voted)
    pub fn yes_share_reaches(&self, percent: u8) -> bool {
        let total = self.total();
        total > 0 && self.yes.saturating_mul(100) >= total.saturating_mul(percent as usize)
    }

    /// Participation as a whole percentage, rounded down
    pub fn participation_percent(&self) -> usize {
        if self.panel_size == 0 {
            return 0;
        }
        self.total().saturating_mul(100) / self.panel_size
    }
}

/// Region and organization a member held when the panel was checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub region: String,
    pub organization: String,
}

/// A selected panel, the definition in force when it was selected, and its ballots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberRound {
    pub definition: ChamberDefinition,
    pub panel: Vec<VoterId>,

    /// One entry per panel member, frozen at selection
    pub affiliations: BTreeMap<VoterId, Affiliation>,

    pub votes: Vec<Vote>,
    pub opened_at: Timestamp,
    pub deadline: Timestamp,
}

impl ChamberRound {
    pub fn new(
        definition: ChamberDefinition,
        members: Vec<Voter>,
        opened_at: Timestamp,
        deadline: Timestamp,
    ) -> Self {
        let panel = members.iter().map(|m| m.id.clone()).collect();
        let affiliations = members
            .into_iter()
            .map(|m| {
                let affiliation = Affiliation {
                    region: m.region,
                    organization: m.organization,
                };
                (m.id, affiliation)
            })
            .collect();

        Self {
            definition,
            panel,
            affiliations,
            votes: Vec::new(),
            opened_at,
            deadline,
        }
    }

    pub fn is_member(&self, voter: &VoterId) -> bool {
        self.panel.contains(voter)
    }

    /// Affiliation a member was seated under
    pub fn affiliation(&self, voter: &VoterId) -> Option<&Affiliation> {
        self.affiliations.get(voter)
    }

    pub fn has_voted(&self, voter: &VoterId) -> bool {
        self.votes.iter().any(|v| &v.voter == voter)
    }

    pub fn tally(&self) -> Tally {
        let yes = self.votes.iter().filter(|v| v.approve).count();
        Tally {
            yes,
            no: self.votes.len() - yes,
            panel_size: self.panel.len(),
        }
    }

    pub fn deadline_passed(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }
}

// =============================================================================
// ENTRENCHMENT
// =============================================================================

/// Fixed cooling-off window. There is no operation that shortens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolingOffWindow {
    pub started_at: Timestamp,
    pub ends_at: Timestamp,
}

impl CoolingOffWindow {
    pub fn has_elapsed(&self, now: Timestamp) -> bool {
        now >= self.ends_at
    }
}

/// Post-ratification progress of an entrenched proposal
///
/// Confirmation ballots only exist inside `Confirmation`, which always carries
/// the cooling-off window that preceded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum EntrenchmentTrack {
    AwaitingCoolingOff,
    CoolingOff {
        window: CoolingOffWindow,
    },
    Confirmation {
        window: CoolingOffWindow,
        round: ChamberRound,
    },
}

impl EntrenchmentTrack {
    pub fn cooling_off(&self) -> Option<&CoolingOffWindow> {
        match self {
            EntrenchmentTrack::AwaitingCoolingOff => None,
            EntrenchmentTrack::CoolingOff { window } => Some(window),
            EntrenchmentTrack::Confirmation { window, .. } => Some(window),
        }
    }

    pub fn confirmation_round(&self) -> Option<&ChamberRound> {
        match self {
            EntrenchmentTrack::Confirmation { round, .. } => Some(round),
            _ => None,
        }
    }
}

// =============================================================================
// PROPOSAL
// =============================================================================

/// A proposed change to one constitutional provision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub(crate) id: ProposalId,
    pub(crate) proposer: VoterId,

    /// Dotted path into the live configuration
    pub(crate) provision_key: String,
    pub(crate) current_value: serde_json::Value,
    pub(crate) proposed_value: serde_json::Value,
    pub(crate) justification: String,

    pub(crate) status: AmendmentStatus,
    pub(crate) created_at: Timestamp,

    /// Set when the proposal is confirmed or leaves through a failure exit
    pub(crate) decided_at: Option<Timestamp>,
    pub(crate) applied_at: Option<Timestamp>,

    pub(crate) chambers: BTreeMap<ChamberKind, ChamberRound>,

    pub(crate) challenge_filed: bool,
    pub(crate) challenge_window_closes_at: Option<Timestamp>,

    /// `Some` exactly when the provision was entrenched at creation
    pub(crate) entrenchment: Option<EntrenchmentTrack>,
}

impl Proposal {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ProposalId,
        proposer: VoterId,
        provision_key: String,
        current_value: serde_json::Value,
        proposed_value: serde_json::Value,
        justification: String,
        is_entrenched: bool,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            proposer,
            provision_key,
            current_value,
            proposed_value,
            justification,
            status: AmendmentStatus::Proposed,
            created_at,
            decided_at: None,
            applied_at: None,
            chambers: BTreeMap::new(),
            challenge_filed: false,
            challenge_window_closes_at: None,
            entrenchment: is_entrenched.then_some(EntrenchmentTrack::AwaitingCoolingOff),
        }
    }

    pub fn id(&self) -> ProposalId {
        self.id
    }

    pub fn proposer(&self) -> &VoterId {
        &self.proposer
    }

    pub fn provision_key(&self) -> &str {
        &self.provision_key
    }

    pub fn current_value(&self) -> &serde_json::Value {
        &self.current_value
    }

    pub fn proposed_value(&self) -> &serde_json::Value {
        &self.proposed_value
    }

    pub fn justification(&self) -> &str {
        &self.justification
    }

    pub fn status(&self) -> AmendmentStatus {
        self.status
    }

    pub fn is_entrenched(&self) -> bool {
        self.entrenchment.is_some()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn decided_at(&self) -> Option<Timestamp> {
        self.decided_at
    }

    pub fn applied_at(&self) -> Option<Timestamp> {
        self.applied_at
    }

    pub fn challenge_filed(&self) -> bool {
        self.challenge_filed
    }

    pub fn challenge_window_closes_at(&self) -> Option<Timestamp> {
        self.challenge_window_closes_at
    }

    pub fn chamber(&self, kind: ChamberKind) -> Option<&ChamberRound> {
        self.chambers.get(&kind)
    }

    pub fn panel(&self, kind: ChamberKind) -> Option<&[VoterId]> {
        self.chambers.get(&kind).map(|round| round.panel.as_slice())
    }

    pub fn votes(&self, kind: ChamberKind) -> &[Vote] {
        self.chambers
            .get(&kind)
            .map(|round| round.votes.as_slice())
            .unwrap_or(&[])
    }

    pub fn entrenchment(&self) -> Option<&EntrenchmentTrack> {
        self.entrenchment.as_ref()
    }

    pub fn cooling_off(&self) -> Option<&CoolingOffWindow> {
        self.entrenchment.as_ref().and_then(|t| t.cooling_off())
    }

    pub fn confirmation_panel(&self) -> Option<&[VoterId]> {
        self.entrenchment
            .as_ref()
            .and_then(|t| t.confirmation_round())
            .map(|round| round.panel.as_slice())
    }

    pub fn confirmation_votes(&self) -> &[Vote] {
        self.entrenchment
            .as_ref()
            .and_then(|t| t.confirmation_round())
            .map(|round| round.votes.as_slice())
            .unwrap_or(&[])
    }

    /// The round currently accepting ballots, if any
    pub fn open_round(&self) -> Option<&ChamberRound> {
        match self.status {
            AmendmentStatus::ConfirmationVote => {
                self.entrenchment.as_ref().and_then(|t| t.confirmation_round())
            }
            status => status.open_chamber().and_then(|kind| self.chambers.get(&kind)),
        }
    }

    /// Deadline of the round currently accepting ballots
    pub fn voting_deadline(&self) -> Option<Timestamp> {
        self.open_round().map(|round| round.deadline)
    }

    /// Every voter seated on any panel of this proposal
    pub fn seated_voters(&self) -> impl Iterator<Item = &VoterId> {
        self.chambers
            .values()
            .flat_map(|round| round.panel.iter())
            .chain(self.confirmation_panel().into_iter().flatten())
    }

    /// Total ballots across every stage
    pub fn total_votes_cast(&self) -> usize {
        self.chambers.values().map(|r| r.votes.len()).sum::<usize>()
            + self.confirmation_votes().len()
    }

    /// Move along the pathway graph, stamping decision times
    pub(crate) fn transition(
        &mut self,
        next: AmendmentStatus,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        if !self.status.can_transition_to(next, self.is_entrenched()) {
            return Err(AmendmentError::InvalidState {
                expected: format!("valid transition from {}", self.status),
                actual: format!("attempted transition to {}", next),
            });
        }

        self.status = next;
        match next {
            AmendmentStatus::Confirmed
            | AmendmentStatus::Rejected
            | AmendmentStatus::Lapsed
            | AmendmentStatus::Withdrawn => self.decided_at = Some(now),
            AmendmentStatus::Applied => self.applied_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    /// Require a given status
    pub(crate) fn expect_status(&self, expected: AmendmentStatus) -> Result<(), AmendmentError> {
        if self.status != expected {
            return Err(AmendmentError::InvalidState {
                expected: expected.to_string(),
                actual: self.status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn vote(voter: &str, approve: bool) -> Vote {
        let voter = VoterId::new(voter);
        Vote {
            id: Vote::derive_id(1, Stage::Proposal, &voter),
            voter,
            stage: Stage::Proposal,
            approve,
            attestation: "reviewed".to_string(),
            cast_at: t0(),
            region: "north".to_string(),
            organization: "guild".to_string(),
        }
    }

    #[test]
    fn test_standard_path_edges() {
        use AmendmentStatus::*;

        let path = [
            Proposed,
            ProposalChamberVoting,
            RatificationChamberVoting,
            ChallengeWindow,
            ChallengeChamberVoting,
            Confirmed,
            Applied,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1], false), "{} -> {}", pair[0], pair[1]);
        }

        // Standard proposals never enter the entrenched stages
        assert!(!ChallengeWindow.can_transition_to(CoolingOff, false));
        assert!(!ChallengeChamberVoting.can_transition_to(CoolingOff, false));
    }

    #[test]
    fn test_entrenched_path_edges() {
        use AmendmentStatus::*;

        assert!(ChallengeWindow.can_transition_to(CoolingOff, true));
        assert!(CoolingOff.can_transition_to(ConfirmationVote, true));
        assert!(ConfirmationVote.can_transition_to(Confirmed, true));

        // Entrenched proposals cannot skip the cooling-off
        assert!(!ChallengeWindow.can_transition_to(Confirmed, true));
        assert!(!ChallengeChamberVoting.can_transition_to(Confirmed, true));
    }

    #[test]
    fn test_terminal_statuses_are_sinks() {
        use AmendmentStatus::*;

        let all = [
            Proposed,
            ProposalChamberVoting,
            RatificationChamberVoting,
            ChallengeWindow,
            ChallengeChamberVoting,
            CoolingOff,
            ConfirmationVote,
            Confirmed,
            Applied,
            Rejected,
            Lapsed,
            Withdrawn,
        ];
        for terminal in all.iter().filter(|s| s.is_terminal()) {
            for next in all {
                assert!(!terminal.can_transition_to(next, true));
                assert!(!terminal.can_transition_to(next, false));
            }
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&AmendmentStatus::ProposalChamberVoting).unwrap();
        assert_eq!(json, "\"proposal_chamber_voting\"");
        let json = serde_json::to_string(&ChamberKind::Ratification).unwrap();
        assert_eq!(json, "\"ratification\"");
    }

    #[test]
    fn test_tally_thresholds() {
        let tally = Tally { yes: 9, no: 2, panel_size: 11 };
        assert!(tally.participation_reaches(50));
        assert!(tally.yes_share_reaches(80)); // 81.8%

        let tally = Tally { yes: 4, no: 1, panel_size: 11 };
        assert!(!tally.participation_reaches(50)); // 45%
        assert!(tally.yes_share_reaches(80)); // exactly 80%

        let empty = Tally { yes: 0, no: 0, panel_size: 11 };
        assert!(!empty.yes_share_reaches(0));
        assert_eq!(empty.participation_percent(), 0);
    }

    #[test]
    fn test_round_tally_counts_votes() {
        let mut round = ChamberRound::new(
            ChamberDefinition::new(3, 2),
            ["a", "b", "c"].iter().map(|id| Voter::new(*id, "north", "guild")).collect(),
            t0(),
            t0() + chrono::Duration::days(14),
        );
        round.votes.push(vote("a", true));
        round.votes.push(vote("b", false));

        let tally = round.tally();
        assert_eq!(tally.yes, 1);
        assert_eq!(tally.no, 1);
        assert_eq!(tally.panel_size, 3);
        assert!(round.has_voted(&"a".into()));
        assert!(!round.has_voted(&"c".into()));
        assert!(!round.deadline_passed(t0()));
        assert!(round.deadline_passed(t0() + chrono::Duration::days(14)));
    }

    #[test]
    fn test_vote_id_unique_per_stage() {
        let voter = VoterId::new("alice");
        let a = Vote::derive_id(7, Stage::Proposal, &voter);
        let b = Vote::derive_id(7, Stage::Ratification, &voter);
        let c = Vote::derive_id(8, Stage::Proposal, &voter);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Vote::derive_id(7, Stage::Proposal, &voter));
    }

    #[test]
    fn test_entrenched_flag_follows_track() {
        let standard = Proposal::new(
            1,
            "alice".into(),
            "fees.base".to_string(),
            serde_json::json!(1),
            serde_json::json!(2),
            "cheaper".to_string(),
            false,
            t0(),
        );
        assert!(!standard.is_entrenched());
        assert!(standard.cooling_off().is_none());

        let entrenched = Proposal::new(
            2,
            "alice".into(),
            "rights.speech".to_string(),
            serde_json::json!(true),
            serde_json::json!(false),
            "test".to_string(),
            true,
            t0(),
        );
        assert!(entrenched.is_entrenched());
        assert_eq!(
            entrenched.entrenchment(),
            Some(&EntrenchmentTrack::AwaitingCoolingOff)
        );
    }

    #[test]
    fn test_transition_stamps_decision_time() {
        let mut proposal = Proposal::new(
            1,
            "alice".into(),
            "fees.base".to_string(),
            serde_json::json!(1),
            serde_json::json!(2),
            "cheaper".to_string(),
            false,
            t0(),
        );

        let err = proposal.transition(AmendmentStatus::Confirmed, t0()).unwrap_err();
        assert!(err.is_state_error());

        proposal.transition(AmendmentStatus::Withdrawn, t0()).unwrap();
        assert_eq!(proposal.decided_at(), Some(t0()));
    }
}
