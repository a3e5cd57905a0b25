// Chambers - Chamber voting controller
// Panel selection, ballot recording and tallying for the three chambers
//
// Anti-stall: once a deadline passes, a round that most of its panel ignored
// lapses. Abstention cannot block governance forever, and a narrow active
// minority cannot push a change through an absent panel either.

use super::panel_selection::{select_members, PanelConstraints};
use super::ratification::PostRatificationController;
use crate::genesis::{ConstitutionConfig, ThresholdConfig};
use crate::types::{
    AmendmentError, AmendmentStatus, ChamberKind, ChamberRound, Hash, Proposal, ProposalId,
    Stage, Timestamp, Vote, Voter, VoterId,
};
use chrono::Duration;
use std::collections::HashSet;
use tracing::{debug, info};

/// End of a window opened at `now`, or an error past the calendar's range
pub(crate) fn window_end(now: Timestamp, window: Duration) -> Result<Timestamp, AmendmentError> {
    now.checked_add_signed(window).ok_or_else(|| {
        AmendmentError::Validation(format!(
            "a {} day window from {} ends past the supported time range",
            window.num_days(),
            now
        ))
    })
}

/// Result of closing a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Passed,
    Rejected,
    Lapsed,
}

/// Tally a round under the given thresholds
///
/// Lapse is checked first: after the deadline, participation below the lapse
/// threshold lapses whatever the split. Otherwise YES must reach the chamber's
/// pass threshold; entrenched rounds also need the participation minimum and
/// the supermajority of cast votes.
pub fn decide_round(
    round: &ChamberRound,
    entrenched: bool,
    thresholds: &ThresholdConfig,
    now: Timestamp,
) -> RoundOutcome {
    let tally = round.tally();

    if round.deadline_passed(now)
        && !tally.participation_reaches(thresholds.lapse_participation_percent)
    {
        return RoundOutcome::Lapsed;
    }

    let mut passed = tally.yes >= round.definition.pass_threshold;
    if entrenched {
        passed = passed
            && tally.participation_reaches(thresholds.entrenched_participation_percent)
            && tally.yes_share_reaches(thresholds.supermajority_percent);
    }

    if passed {
        RoundOutcome::Passed
    } else {
        RoundOutcome::Rejected
    }
}

/// Append a ballot to a round
///
/// The ballot carries the region and organization the voter was seated under,
/// not the ones supplied with this call.
pub(crate) fn record_vote(
    round: &mut ChamberRound,
    proposal_id: ProposalId,
    stage: Stage,
    voter: &Voter,
    approve: bool,
    attestation: &str,
    now: Timestamp,
) -> Result<Hash, AmendmentError> {
    if round.deadline_passed(now) {
        return Err(AmendmentError::VotingClosed(stage));
    }
    let affiliation = match round.affiliation(&voter.id) {
        Some(affiliation) if round.is_member(&voter.id) => affiliation.clone(),
        _ => {
            return Err(AmendmentError::NotPanelMember {
                voter: voter.id.clone(),
                stage,
            })
        }
    };
    if round.has_voted(&voter.id) {
        return Err(AmendmentError::AlreadyVoted {
            voter: voter.id.clone(),
            stage,
        });
    }

    let id = Vote::derive_id(proposal_id, stage, &voter.id);
    round.votes.push(Vote {
        id,
        voter: voter.id.clone(),
        stage,
        approve,
        attestation: attestation.trim().to_string(),
        cast_at: now,
        region: affiliation.region,
        organization: affiliation.organization,
    });

    Ok(id)
}

pub(crate) fn require_attestation(attestation: &str) -> Result<(), AmendmentError> {
    if attestation.trim().is_empty() {
        return Err(AmendmentError::Validation(
            "attestation must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Status the proposal must hold before a chamber's panel can be selected
fn selection_status(kind: ChamberKind) -> AmendmentStatus {
    match kind {
        ChamberKind::Proposal => AmendmentStatus::Proposed,
        ChamberKind::Ratification => AmendmentStatus::RatificationChamberVoting,
        ChamberKind::Challenge => AmendmentStatus::ChallengeChamberVoting,
    }
}

/// Chamber voting controller
pub struct ChamberController<'a> {
    config: &'a ConstitutionConfig,
}

impl<'a> ChamberController<'a> {
    pub fn new(config: &'a ConstitutionConfig) -> Self {
        Self { config }
    }

    /// Select a chamber's panel and open its vote
    ///
    /// The proposer and everyone already seated on another panel of this
    /// proposal are excluded.
    pub fn select_chamber_panel(
        &self,
        proposal: &mut Proposal,
        kind: ChamberKind,
        candidates: &[Voter],
        now: Timestamp,
    ) -> Result<Vec<VoterId>, AmendmentError> {
        proposal.expect_status(selection_status(kind))?;
        if proposal.chambers.contains_key(&kind) {
            return Err(AmendmentError::PanelAlreadySelected(kind.into()));
        }

        let mut excluded: HashSet<VoterId> = proposal.seated_voters().cloned().collect();
        excluded.insert(proposal.proposer.clone());

        let definition = self.config.phase.chamber(kind);
        let constraints = PanelConstraints::new(definition.panel_size, &self.config.diversity);
        let members = select_members(candidates, &constraints, &excluded)?;
        let panel: Vec<VoterId> = members.iter().map(|m| m.id.clone()).collect();

        let deadline = window_end(now, self.config.timing.voting_window())?;
        if kind == ChamberKind::Proposal {
            proposal.transition(AmendmentStatus::ProposalChamberVoting, now)?;
        }

        proposal
            .chambers
            .insert(kind, ChamberRound::new(definition, members, now, deadline));

        info!(
            "Proposal #{}: {} chamber panel of {} selected, voting until {}",
            proposal.id,
            kind,
            panel.len(),
            deadline
        );

        Ok(panel)
    }

    /// Record a chamber ballot
    pub fn cast_chamber_vote(
        &self,
        proposal: &mut Proposal,
        kind: ChamberKind,
        voter: &Voter,
        approve: bool,
        attestation: &str,
        now: Timestamp,
    ) -> Result<Hash, AmendmentError> {
        proposal.expect_status(kind.voting_status())?;
        require_attestation(attestation)?;

        let proposal_id = proposal.id;
        let round = proposal
            .chambers
            .get_mut(&kind)
            .ok_or(AmendmentError::PanelNotSelected(kind.into()))?;

        let vote_id = record_vote(round, proposal_id, kind.into(), voter, approve, attestation, now)?;

        debug!(
            "Proposal #{}: {} voted {} in {} chamber ({}/{})",
            proposal_id,
            voter.id,
            if approve { "yes" } else { "no" },
            kind,
            round.votes.len(),
            round.panel.len()
        );

        Ok(vote_id)
    }

    /// Close a chamber and advance or terminate the proposal
    ///
    /// A chamber that is no longer open cannot be closed again; the decision
    /// it produced stands.
    pub fn close_chamber_voting(
        &self,
        proposal: &mut Proposal,
        kind: ChamberKind,
        now: Timestamp,
    ) -> Result<RoundOutcome, AmendmentError> {
        proposal.expect_status(kind.voting_status())?;

        let round = proposal
            .chambers
            .get(&kind)
            .ok_or(AmendmentError::PanelNotSelected(kind.into()))?;
        let tally = round.tally();
        let outcome = decide_round(round, proposal.is_entrenched(), &self.config.thresholds, now);

        match outcome {
            RoundOutcome::Lapsed => proposal.transition(AmendmentStatus::Lapsed, now)?,
            RoundOutcome::Rejected => proposal.transition(AmendmentStatus::Rejected, now)?,
            RoundOutcome::Passed => self.advance_after_pass(proposal, kind, now)?,
        }

        info!(
            "Proposal #{}: {} chamber closed {:?} ({} yes / {} no, {}% participation) -> {}",
            proposal.id,
            kind,
            outcome,
            tally.yes,
            tally.no,
            tally.participation_percent(),
            proposal.status
        );

        Ok(outcome)
    }

    fn advance_after_pass(
        &self,
        proposal: &mut Proposal,
        kind: ChamberKind,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        match kind {
            ChamberKind::Proposal => {
                proposal.transition(AmendmentStatus::RatificationChamberVoting, now)
            }
            ChamberKind::Ratification => {
                let closes_at = window_end(now, self.config.timing.challenge_window())?;
                proposal.transition(AmendmentStatus::ChallengeWindow, now)?;
                proposal.challenge_window_closes_at = Some(closes_at);
                Ok(())
            }
            ChamberKind::Challenge => {
                PostRatificationController::new(self.config).finish_challenge_stage(proposal, now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::config::DEFAULT_LAPSE_PARTICIPATION_PERCENT;
    use crate::types::ChamberDefinition;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            supermajority_percent: 80,
            entrenched_participation_percent: 50,
            lapse_participation_percent: DEFAULT_LAPSE_PARTICIPATION_PERCENT,
        }
    }

    fn round_with(yes: usize, no: usize) -> ChamberRound {
        let panel: Vec<Voter> = (0..11).map(|i| Voter::new(format!("v{}", i), "r", "o")).collect();
        let mut round = ChamberRound::new(
            ChamberDefinition::new(11, 8),
            panel,
            t0(),
            t0() + Duration::days(14),
        );
        for i in 0..(yes + no) {
            let voter = Voter::new(format!("v{}", i), "r", "o");
            record_vote(&mut round, 1, Stage::Proposal, &voter, i < yes, "read it", t0()).unwrap();
        }
        round
    }

    #[test]
    fn test_standard_pass_at_threshold() {
        let round = round_with(8, 0);
        assert_eq!(decide_round(&round, false, &thresholds(), t0()), RoundOutcome::Passed);

        let round = round_with(7, 4);
        assert_eq!(decide_round(&round, false, &thresholds(), t0()), RoundOutcome::Rejected);
    }

    #[test]
    fn test_lapse_ignores_split_after_deadline() {
        let round = round_with(1, 0);
        let after = t0() + Duration::days(15);
        assert_eq!(decide_round(&round, false, &thresholds(), after), RoundOutcome::Lapsed);

        // Before the deadline low participation is an ordinary rejection
        assert_eq!(decide_round(&round, false, &thresholds(), t0()), RoundOutcome::Rejected);
    }

    #[test]
    fn test_entrenched_requires_supermajority() {
        // 8 yes / 3 no = 72.7% < 80%
        let round = round_with(8, 3);
        assert_eq!(decide_round(&round, false, &thresholds(), t0()), RoundOutcome::Passed);
        assert_eq!(decide_round(&round, true, &thresholds(), t0()), RoundOutcome::Rejected);

        // 9 yes / 2 no = 81.8%
        let round = round_with(9, 2);
        assert_eq!(decide_round(&round, true, &thresholds(), t0()), RoundOutcome::Passed);
    }

    #[test]
    fn test_entrenched_requires_participation() {
        let mut round = round_with(5, 0);
        round.definition = ChamberDefinition::new(11, 5);
        // 5/11 = 45% participation, 100% yes
        assert_eq!(decide_round(&round, false, &thresholds(), t0()), RoundOutcome::Passed);
        assert_eq!(decide_round(&round, true, &thresholds(), t0()), RoundOutcome::Rejected);
    }

    #[test]
    fn test_record_vote_guards() {
        let mut round = round_with(0, 0);
        let member = Voter::new("v3", "r", "o");
        let outsider = Voter::new("x", "r", "o");

        let err = record_vote(&mut round, 1, Stage::Proposal, &outsider, true, "a", t0()).unwrap_err();
        assert!(matches!(err, AmendmentError::NotPanelMember { .. }));

        record_vote(&mut round, 1, Stage::Proposal, &member, true, "a", t0()).unwrap();
        let err = record_vote(&mut round, 1, Stage::Proposal, &member, false, "a", t0()).unwrap_err();
        assert!(matches!(err, AmendmentError::AlreadyVoted { .. }));

        let late = Voter::new("v4", "r", "o");
        let err = record_vote(&mut round, 1, Stage::Proposal, &late, true, "a", t0() + Duration::days(14))
            .unwrap_err();
        assert_eq!(err, AmendmentError::VotingClosed(Stage::Proposal));
        assert_eq!(round.votes.len(), 1);
    }

    #[test]
    fn test_ballot_keeps_seated_affiliation() {
        let mut round = round_with(0, 0);
        let relabeled = Voter::new("v2", "elsewhere", "other-org");

        record_vote(&mut round, 1, Stage::Proposal, &relabeled, true, "a", t0()).unwrap();
        assert_eq!(round.votes[0].region, "r");
        assert_eq!(round.votes[0].organization, "o");
    }

    #[test]
    fn test_window_end_out_of_range() {
        let err = window_end(chrono::DateTime::<Utc>::MAX_UTC, Duration::days(14)).unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(
            window_end(t0(), Duration::days(14)).unwrap(),
            t0() + Duration::days(14)
        );
    }

    #[test]
    fn test_empty_attestation_rejected() {
        assert!(require_attestation("   ").unwrap_err().is_validation_error());
        assert!(require_attestation("I read the justification").is_ok());
    }
}
