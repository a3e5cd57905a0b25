// Amendments - Constitutional amendment contract
// Principle: A failed call leaves every proposal exactly as it was
//
// Each operation runs against a clone of the proposal; the clone replaces the
// stored proposal only when the whole operation succeeded.

use super::chambers::{ChamberController, RoundOutcome};
use super::events::{AmendmentEvent, AmendmentEventKind};
use super::lifecycle::{LifecycleController, PhaseDisposition, PhaseTransitionReport};
use super::ratification::PostRatificationController;
use crate::genesis::{ConfigError, ConstitutionConfig, PhaseConfig};
use crate::storage::{ProposalRecord, RecordError};
use crate::types::{
    AmendmentError, AmendmentStatus, ChamberKind, CoolingOffWindow, Hash, Proposal, ProposalId,
    Stage, Timestamp, Voter, VoterId,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Amendment contract: every proposal, keyed by id
#[derive(Debug, Clone)]
pub struct AmendmentContract {
    /// Validated configuration, including the active phase
    config: ConstitutionConfig,

    /// All proposals by ID. Never removed.
    proposals: BTreeMap<ProposalId, Proposal>,

    /// Next proposal ID
    next_proposal_id: ProposalId,

    /// Events not yet drained by the caller
    events: Vec<AmendmentEvent>,
}

impl AmendmentContract {
    pub fn new(config: ConstitutionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Amendment contract initialized (phase '{}', {} entrenched provisions)",
            config.phase.name,
            config.entrenched_provisions.len()
        );
        Ok(Self {
            config,
            proposals: BTreeMap::new(),
            next_proposal_id: 1,
            events: Vec::new(),
        })
    }

    /// Rebuild a contract from persisted records
    pub fn restore(
        config: ConstitutionConfig,
        records: Vec<ProposalRecord>,
    ) -> Result<Self, RecordError> {
        let mut contract = Self::new(config)?;

        for record in records {
            let proposal = record.into_proposal()?;
            let id = proposal.id();
            if contract.proposals.contains_key(&id) {
                return Err(RecordError::DuplicateProposal(id));
            }
            let next = id.checked_add(1).ok_or_else(|| RecordError::Malformed {
                proposal_id: id,
                reason: "proposal id leaves no room for a successor".to_string(),
            })?;
            contract.next_proposal_id = contract.next_proposal_id.max(next);
            contract.proposals.insert(id, proposal);
        }

        info!("Restored {} proposals", contract.proposals.len());
        Ok(contract)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn config(&self) -> &ConstitutionConfig {
        &self.config
    }

    pub fn phase(&self) -> &PhaseConfig {
        &self.config.phase
    }

    pub fn get_proposal(&self, proposal_id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&proposal_id)
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn proposals_with_status(&self, status: AmendmentStatus) -> Vec<&Proposal> {
        self.proposals
            .values()
            .filter(|p| p.status() == status)
            .collect()
    }

    /// Proposals that can still change status
    pub fn active_proposals(&self) -> Vec<&Proposal> {
        self.proposals
            .values()
            .filter(|p| !p.status().is_terminal())
            .collect()
    }

    /// Events queued since the last drain
    pub fn pending_events(&self) -> &[AmendmentEvent] {
        &self.events
    }

    /// Hand queued events to the caller for the external audit log
    pub fn drain_events(&mut self) -> Vec<AmendmentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot every proposal for the durable store
    pub fn export_records(&self) -> Vec<ProposalRecord> {
        self.proposals.values().map(ProposalRecord::from_proposal).collect()
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Submit a new amendment
    pub fn propose_amendment(
        &mut self,
        proposer: VoterId,
        provision_key: &str,
        current_value: Value,
        proposed_value: Value,
        justification: &str,
        now: Timestamp,
    ) -> Result<ProposalId, AmendmentError> {
        let provision_key = provision_key.trim();
        if provision_key.is_empty() {
            return Err(AmendmentError::Validation(
                "provision key must not be empty".to_string(),
            ));
        }
        if provision_key.split('.').any(|segment| segment.trim().is_empty()) {
            return Err(AmendmentError::Validation(format!(
                "provision key '{}' has an empty segment",
                provision_key
            )));
        }
        if self.config.is_formula_only(provision_key) {
            return Err(AmendmentError::Validation(format!(
                "'{}' is formula-determined, not ballot-amendable",
                provision_key
            )));
        }
        if justification.trim().is_empty() {
            return Err(AmendmentError::Validation(
                "justification must not be empty".to_string(),
            ));
        }
        if current_value == proposed_value {
            return Err(AmendmentError::Validation(
                "proposed value is identical to the current value".to_string(),
            ));
        }

        let entrenched = self.config.is_entrenched(provision_key);
        let proposal_id = self.next_proposal_id;
        let next_proposal_id = proposal_id.checked_add(1).ok_or_else(|| {
            AmendmentError::Validation("proposal id space exhausted".to_string())
        })?;
        self.next_proposal_id = next_proposal_id;

        let proposal = Proposal::new(
            proposal_id,
            proposer.clone(),
            provision_key.to_string(),
            current_value,
            proposed_value,
            justification.trim().to_string(),
            entrenched,
            now,
        );
        self.proposals.insert(proposal_id, proposal);

        self.events.push(AmendmentEvent::new(
            proposal_id,
            AmendmentEventKind::Proposed {
                proposer: proposer.clone(),
                provision_key: provision_key.to_string(),
                entrenched,
            },
            AmendmentStatus::Proposed,
            now,
        ));

        info!(
            "Proposal #{} created by {} for {}{}",
            proposal_id,
            proposer,
            provision_key,
            if entrenched { " (entrenched)" } else { "" }
        );
        Ok(proposal_id)
    }

    // =========================================================================
    // CHAMBERS
    // =========================================================================

    pub fn select_chamber_panel(
        &mut self,
        proposal_id: ProposalId,
        kind: ChamberKind,
        candidates: &[Voter],
        now: Timestamp,
    ) -> Result<Vec<VoterId>, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let panel = ChamberController::new(config)
                .select_chamber_panel(proposal, kind, candidates, now)?;
            let event = AmendmentEventKind::PanelSelected {
                stage: kind.into(),
                panel_size: panel.len(),
            };
            Ok((panel, Some(event)))
        })
    }

    pub fn cast_chamber_vote(
        &mut self,
        proposal_id: ProposalId,
        kind: ChamberKind,
        voter: &Voter,
        approve: bool,
        attestation: &str,
        now: Timestamp,
    ) -> Result<Hash, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let vote_id = ChamberController::new(config)
                .cast_chamber_vote(proposal, kind, voter, approve, attestation, now)?;
            let event = AmendmentEventKind::VoteCast {
                stage: kind.into(),
                voter: voter.id.clone(),
            };
            Ok((vote_id, Some(event)))
        })
    }

    pub fn close_chamber_voting(
        &mut self,
        proposal_id: ProposalId,
        kind: ChamberKind,
        now: Timestamp,
    ) -> Result<RoundOutcome, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let outcome = ChamberController::new(config).close_chamber_voting(proposal, kind, now)?;
            Ok((outcome, None))
        })
    }

    // =========================================================================
    // POST-RATIFICATION
    // =========================================================================

    pub fn file_challenge(
        &mut self,
        proposal_id: ProposalId,
        challenger: &VoterId,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            PostRatificationController::new(config).file_challenge(proposal, challenger, now)?;
            let event = AmendmentEventKind::ChallengeFiled {
                challenger: challenger.clone(),
            };
            Ok(((), Some(event)))
        })
    }

    /// Returns the status the proposal moved to
    pub fn advance_past_challenge_window(
        &mut self,
        proposal_id: ProposalId,
        now: Timestamp,
    ) -> Result<AmendmentStatus, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            PostRatificationController::new(config).advance_past_challenge_window(proposal, now)?;
            Ok((proposal.status(), None))
        })
    }

    pub fn start_cooling_off(
        &mut self,
        proposal_id: ProposalId,
        now: Timestamp,
    ) -> Result<CoolingOffWindow, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let window = PostRatificationController::new(config).start_cooling_off(proposal, now)?;
            let event = AmendmentEventKind::CoolingOffStarted {
                ends_at: window.ends_at,
            };
            Ok((window, Some(event)))
        })
    }

    pub fn start_confirmation_vote(
        &mut self,
        proposal_id: ProposalId,
        candidates: &[Voter],
        now: Timestamp,
    ) -> Result<Vec<VoterId>, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let panel = PostRatificationController::new(config)
                .start_confirmation_vote(proposal, candidates, now)?;
            let event = AmendmentEventKind::PanelSelected {
                stage: Stage::Confirmation,
                panel_size: panel.len(),
            };
            Ok((panel, Some(event)))
        })
    }

    pub fn cast_confirmation_vote(
        &mut self,
        proposal_id: ProposalId,
        voter: &Voter,
        approve: bool,
        attestation: &str,
        now: Timestamp,
    ) -> Result<Hash, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let vote_id = PostRatificationController::new(config)
                .cast_confirmation_vote(proposal, voter, approve, attestation, now)?;
            let event = AmendmentEventKind::VoteCast {
                stage: Stage::Confirmation,
                voter: voter.id.clone(),
            };
            Ok((vote_id, Some(event)))
        })
    }

    pub fn close_confirmation_vote(
        &mut self,
        proposal_id: ProposalId,
        now: Timestamp,
    ) -> Result<RoundOutcome, AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            let outcome =
                PostRatificationController::new(config).close_confirmation_vote(proposal, now)?;
            Ok((outcome, None))
        })
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    pub fn withdraw_amendment(
        &mut self,
        proposal_id: ProposalId,
        caller: &VoterId,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            LifecycleController::new(config).withdraw_amendment(proposal, caller, now)?;
            Ok(((), None))
        })
    }

    /// Replace the active chamber definitions
    ///
    /// Unvoted chambers are discarded so the next selection uses the new
    /// definitions; chambers with ballots finish under their snapshot.
    pub fn handle_phase_transition(
        &mut self,
        new_phase: PhaseConfig,
        now: Timestamp,
    ) -> Result<PhaseTransitionReport, AmendmentError> {
        let lifecycle = LifecycleController::new(&self.config);
        lifecycle.validate_phase(&new_phase)?;

        let mut report =
            PhaseTransitionReport::new(self.config.phase.name.clone(), new_phase.name.clone());

        for proposal in self.proposals.values_mut() {
            let before = proposal.status();
            let disposition = lifecycle.reset_for_phase(proposal, now);
            report.record(proposal.id(), disposition);

            let chamber = match disposition {
                PhaseDisposition::Reset(kind) => kind,
                PhaseDisposition::Retained(_) | PhaseDisposition::Untouched => continue,
            };
            self.events.push(AmendmentEvent::new(
                proposal.id(),
                AmendmentEventKind::PhaseReset {
                    chamber,
                    phase: new_phase.name.clone(),
                },
                proposal.status(),
                now,
            ));
            if before != proposal.status() {
                self.events.push(AmendmentEvent::new(
                    proposal.id(),
                    AmendmentEventKind::StatusChanged {
                        from: before,
                        to: proposal.status(),
                    },
                    proposal.status(),
                    now,
                ));
            }
        }

        info!(
            "Phase transition '{}' -> '{}': {} reset, {} retained",
            report.previous_phase,
            report.new_phase,
            report.reset.len(),
            report.retained.len()
        );

        self.config.phase = new_phase;
        Ok(report)
    }

    pub fn validate_amendment_application(
        &self,
        proposal_id: ProposalId,
    ) -> Result<(), AmendmentError> {
        let proposal = self
            .proposals
            .get(&proposal_id)
            .ok_or(AmendmentError::ProposalNotFound(proposal_id))?;
        LifecycleController::new(&self.config).validate_amendment_application(proposal)
    }

    /// Write a confirmed change into `live_config`
    pub fn apply_amendment(
        &mut self,
        proposal_id: ProposalId,
        live_config: &mut Value,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        self.update(proposal_id, now, |config, proposal| {
            LifecycleController::new(config).apply_amendment(proposal, live_config, now)?;
            Ok(((), None))
        })
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    /// Run `op` on a copy of the proposal and commit it only on success
    fn update<T, F>(
        &mut self,
        proposal_id: ProposalId,
        now: Timestamp,
        op: F,
    ) -> Result<T, AmendmentError>
    where
        F: FnOnce(
            &ConstitutionConfig,
            &mut Proposal,
        ) -> Result<(T, Option<AmendmentEventKind>), AmendmentError>,
    {
        let mut working = self
            .proposals
            .get(&proposal_id)
            .cloned()
            .ok_or(AmendmentError::ProposalNotFound(proposal_id))?;
        let before = working.status();
        let had_cooling_off = working.cooling_off().is_some();

        let (value, event) = op(&self.config, &mut working)?;
        let after = working.status();

        if let Some(kind) = event {
            self.events
                .push(AmendmentEvent::new(proposal_id, kind, after, now));
        }
        // Cooling-off started implicitly by a challenge close or window advance
        if !had_cooling_off && after == AmendmentStatus::CoolingOff && before != after {
            if let Some(window) = working.cooling_off() {
                self.events.push(AmendmentEvent::new(
                    proposal_id,
                    AmendmentEventKind::CoolingOffStarted {
                        ends_at: window.ends_at,
                    },
                    after,
                    now,
                ));
            }
        }
        if before != after {
            debug!("Proposal #{}: {} -> {}", proposal_id, before, after);
            self.events.push(AmendmentEvent::new(
                proposal_id,
                AmendmentEventKind::StatusChanged {
                    from: before,
                    to: after,
                },
                after,
                now,
            ));
        }

        self.proposals.insert(proposal_id, working);
        Ok(value)
    }
}
