// Post-Ratification - Challenge window, cooling-off and confirmation vote
//
// Entrenched path: CHALLENGE_WINDOW → [CHALLENGE] → COOLING_OFF →
// CONFIRMATION_VOTE → CONFIRMED. The cooling-off window counts elapsed time
// only; nothing here can shorten or restart it.

use super::chambers::{decide_round, record_vote, require_attestation, window_end, RoundOutcome};
use super::panel_selection::{select_members, PanelConstraints};
use crate::genesis::ConstitutionConfig;
use crate::types::{
    AmendmentError, AmendmentStatus, ChamberKind, ChamberRound, CoolingOffWindow,
    EntrenchmentTrack, Hash, Proposal, Stage, Timestamp, Voter, VoterId,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Post-ratification controller
pub struct PostRatificationController<'a> {
    config: &'a ConstitutionConfig,
}

impl<'a> PostRatificationController<'a> {
    pub fn new(config: &'a ConstitutionConfig) -> Self {
        Self { config }
    }

    /// File a challenge against a ratified proposal
    pub fn file_challenge(
        &self,
        proposal: &mut Proposal,
        challenger: &VoterId,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        proposal.expect_status(AmendmentStatus::ChallengeWindow)?;

        if let Some(closes_at) = proposal.challenge_window_closes_at {
            if now >= closes_at {
                return Err(AmendmentError::InvalidState {
                    expected: "open challenge window".to_string(),
                    actual: format!("challenge window closed at {}", closes_at),
                });
            }
        }

        proposal.transition(AmendmentStatus::ChallengeChamberVoting, now)?;
        proposal.challenge_filed = true;
        // The challenge chamber starts with an empty ballot box
        proposal.chambers.remove(&ChamberKind::Challenge);

        info!("Proposal #{}: challenge filed by {}", proposal.id, challenger);
        Ok(())
    }

    /// Move past an unused challenge window
    pub fn advance_past_challenge_window(
        &self,
        proposal: &mut Proposal,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        proposal.expect_status(AmendmentStatus::ChallengeWindow)?;

        if let Some(closes_at) = proposal.challenge_window_closes_at {
            if now < closes_at {
                return Err(AmendmentError::InvalidState {
                    expected: "closed challenge window".to_string(),
                    actual: format!("challenge window open until {}", closes_at),
                });
            }
        }

        self.finish_challenge_stage(proposal, now)
    }

    /// Leave the challenge stage: cooling-off if entrenched, confirmed otherwise
    pub(crate) fn finish_challenge_stage(
        &self,
        proposal: &mut Proposal,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        if proposal.is_entrenched() {
            proposal.transition(AmendmentStatus::CoolingOff, now)?;
            self.start_cooling_off(proposal, now)?;
        } else {
            proposal.transition(AmendmentStatus::Confirmed, now)?;
        }
        Ok(())
    }

    /// Record the fixed cooling-off window of an entrenched proposal
    ///
    /// Only valid once, while the proposal sits in COOLING_OFF without a window.
    pub fn start_cooling_off(
        &self,
        proposal: &mut Proposal,
        now: Timestamp,
    ) -> Result<CoolingOffWindow, AmendmentError> {
        proposal.expect_status(AmendmentStatus::CoolingOff)?;

        let track = proposal
            .entrenchment
            .as_mut()
            .ok_or_else(|| AmendmentError::InvalidState {
                expected: "entrenched proposal".to_string(),
                actual: "standard proposal".to_string(),
            })?;

        if let Some(existing) = track.cooling_off() {
            return Err(AmendmentError::InvalidState {
                expected: "cooling-off not yet started".to_string(),
                actual: format!("cooling-off running until {}", existing.ends_at),
            });
        }

        let window = CoolingOffWindow {
            started_at: now,
            ends_at: window_end(now, self.config.timing.cooling_off())?,
        };
        *track = EntrenchmentTrack::CoolingOff { window };

        info!(
            "Proposal #{}: cooling-off started, ends {}",
            proposal.id, window.ends_at
        );
        Ok(window)
    }

    /// Select the confirmation panel once cooling-off has fully elapsed
    ///
    /// Nobody who sat on the ratification panel may confirm, and the proposer
    /// is recused as at every other stage.
    pub fn start_confirmation_vote(
        &self,
        proposal: &mut Proposal,
        candidates: &[Voter],
        now: Timestamp,
    ) -> Result<Vec<VoterId>, AmendmentError> {
        proposal.expect_status(AmendmentStatus::CoolingOff)?;

        let window = match proposal.entrenchment {
            Some(EntrenchmentTrack::CoolingOff { window }) => window,
            _ => {
                return Err(AmendmentError::InvalidState {
                    expected: "recorded cooling-off window".to_string(),
                    actual: "no cooling-off window".to_string(),
                })
            }
        };
        if !window.has_elapsed(now) {
            return Err(AmendmentError::InvalidState {
                expected: "elapsed cooling-off".to_string(),
                actual: format!("cooling-off ends at {}", window.ends_at),
            });
        }

        let mut excluded: HashSet<VoterId> = proposal
            .panel(ChamberKind::Ratification)
            .map(|panel| panel.iter().cloned().collect())
            .unwrap_or_default();
        excluded.insert(proposal.proposer.clone());

        let definition = self.config.confirmation;
        let constraints = PanelConstraints::new(definition.panel_size, &self.config.diversity);
        let members = select_members(candidates, &constraints, &excluded)?;
        let panel: Vec<VoterId> = members.iter().map(|m| m.id.clone()).collect();

        let deadline = window_end(now, self.config.timing.voting_window())?;
        proposal.transition(AmendmentStatus::ConfirmationVote, now)?;
        proposal.entrenchment = Some(EntrenchmentTrack::Confirmation {
            window,
            round: ChamberRound::new(definition, members, now, deadline),
        });

        info!(
            "Proposal #{}: confirmation panel of {} selected, voting until {}",
            proposal.id,
            panel.len(),
            deadline
        );
        Ok(panel)
    }

    pub fn cast_confirmation_vote(
        &self,
        proposal: &mut Proposal,
        voter: &Voter,
        approve: bool,
        attestation: &str,
        now: Timestamp,
    ) -> Result<Hash, AmendmentError> {
        proposal.expect_status(AmendmentStatus::ConfirmationVote)?;
        require_attestation(attestation)?;

        let proposal_id = proposal.id;
        let round = match proposal.entrenchment.as_mut() {
            Some(EntrenchmentTrack::Confirmation { round, .. }) => round,
            _ => return Err(AmendmentError::PanelNotSelected(Stage::Confirmation)),
        };

        let vote_id = record_vote(
            round,
            proposal_id,
            Stage::Confirmation,
            voter,
            approve,
            attestation,
            now,
        )?;

        debug!(
            "Proposal #{}: {} cast confirmation vote ({}/{})",
            proposal_id,
            voter.id,
            round.votes.len(),
            round.panel.len()
        );
        Ok(vote_id)
    }

    /// Close the confirmation vote under entrenched rules
    pub fn close_confirmation_vote(
        &self,
        proposal: &mut Proposal,
        now: Timestamp,
    ) -> Result<RoundOutcome, AmendmentError> {
        proposal.expect_status(AmendmentStatus::ConfirmationVote)?;

        let round = match proposal.entrenchment.as_ref() {
            Some(EntrenchmentTrack::Confirmation { round, .. }) => round,
            _ => return Err(AmendmentError::PanelNotSelected(Stage::Confirmation)),
        };
        let tally = round.tally();
        let outcome = decide_round(round, true, &self.config.thresholds, now);

        let next = match outcome {
            RoundOutcome::Passed => AmendmentStatus::Confirmed,
            RoundOutcome::Rejected => AmendmentStatus::Rejected,
            RoundOutcome::Lapsed => AmendmentStatus::Lapsed,
        };
        proposal.transition(next, now)?;

        info!(
            "Proposal #{}: confirmation vote closed {:?} ({} yes / {} no, {}% participation)",
            proposal.id,
            outcome,
            tally.yes,
            tally.no,
            tally.participation_percent()
        );
        Ok(outcome)
    }
}
