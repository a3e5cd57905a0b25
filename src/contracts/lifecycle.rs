// Lifecycle - Withdrawal, phase transitions and application
//
// Application is the only place a proposal touches live configuration, so it
// re-checks every stage the proposal should have passed through.

use crate::genesis::{ConstitutionConfig, PhaseConfig};
use crate::types::{
    AmendmentError, AmendmentStatus, ChamberKind, Proposal, ProposalId, Timestamp, VoterId,
};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

/// What a phase transition did to one proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseDisposition {
    /// Open chamber had no votes: back to PROPOSED with every panel cleared
    Reset(ChamberKind),
    /// Open chamber has votes and keeps its snapshotted definition
    Retained(ChamberKind),
    /// Not in a chamber vote
    Untouched,
}

/// Summary returned by a phase transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransitionReport {
    pub previous_phase: String,
    pub new_phase: String,
    pub reset: Vec<(ProposalId, ChamberKind)>,
    pub retained: Vec<(ProposalId, ChamberKind)>,
}

impl PhaseTransitionReport {
    pub fn new(previous_phase: String, new_phase: String) -> Self {
        Self {
            previous_phase,
            new_phase,
            reset: Vec::new(),
            retained: Vec::new(),
        }
    }

    pub fn record(&mut self, proposal_id: ProposalId, disposition: PhaseDisposition) {
        match disposition {
            PhaseDisposition::Reset(kind) => self.reset.push((proposal_id, kind)),
            PhaseDisposition::Retained(kind) => self.retained.push((proposal_id, kind)),
            PhaseDisposition::Untouched => {}
        }
    }
}

/// Lifecycle controller
pub struct LifecycleController<'a> {
    config: &'a ConstitutionConfig,
}

impl<'a> LifecycleController<'a> {
    pub fn new(config: &'a ConstitutionConfig) -> Self {
        Self { config }
    }

    /// Withdraw a proposal before anyone has voted on it
    pub fn withdraw_amendment(
        &self,
        proposal: &mut Proposal,
        caller: &VoterId,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        if caller != &proposal.proposer {
            return Err(AmendmentError::NotProposer {
                action: "withdraw".to_string(),
            });
        }

        match proposal.status {
            AmendmentStatus::Proposed => {}
            AmendmentStatus::ProposalChamberVoting if proposal.total_votes_cast() == 0 => {}
            AmendmentStatus::ProposalChamberVoting => {
                return Err(AmendmentError::InvalidState {
                    expected: "no votes cast".to_string(),
                    actual: format!("{} votes cast", proposal.total_votes_cast()),
                })
            }
            status => {
                return Err(AmendmentError::InvalidState {
                    expected: "proposed or proposal_chamber_voting".to_string(),
                    actual: status.to_string(),
                })
            }
        }

        proposal.transition(AmendmentStatus::Withdrawn, now)?;
        info!("Proposal #{} withdrawn by {}", proposal.id, caller);
        Ok(())
    }

    /// Check a phase before it replaces the active one
    pub fn validate_phase(&self, phase: &PhaseConfig) -> Result<(), AmendmentError> {
        phase
            .validate(&self.config.diversity)
            .map_err(|e| AmendmentError::Validation(e.to_string()))
    }

    /// Bring one proposal in line with a new phase
    ///
    /// A proposal whose open chamber nobody has voted in starts over from
    /// PROPOSED, since panels drawn under the old definitions no longer fit.
    /// Once a ballot exists the round runs to completion as selected.
    pub fn reset_for_phase(&self, proposal: &mut Proposal, now: Timestamp) -> PhaseDisposition {
        let kind = match proposal.status.open_chamber() {
            Some(kind) => kind,
            None => return PhaseDisposition::Untouched,
        };

        let has_votes = proposal
            .chambers
            .get(&kind)
            .map(|round| !round.votes.is_empty())
            .unwrap_or(false);
        if has_votes {
            return PhaseDisposition::Retained(kind);
        }

        // The one backwards move
        proposal.chambers.clear();
        proposal.challenge_filed = false;
        proposal.challenge_window_closes_at = None;
        proposal.status = AmendmentStatus::Proposed;
        info!(
            "Proposal #{} reset to proposed at {} ({} chamber had no votes)",
            proposal.id, now, kind
        );
        PhaseDisposition::Reset(kind)
    }

    /// Confirm a proposal went through every stage its pathway requires
    pub fn validate_amendment_application(&self, proposal: &Proposal) -> Result<(), AmendmentError> {
        let violation = |reason: String| {
            error!(
                "Constitutional violation on proposal #{}: {}",
                proposal.id, reason
            );
            AmendmentError::ConstitutionalViolation {
                proposal_id: proposal.id,
                reason,
            }
        };

        if proposal.status != AmendmentStatus::Confirmed {
            return Err(violation(format!(
                "status is {}, only confirmed proposals can be applied",
                proposal.status
            )));
        }

        for kind in [ChamberKind::Proposal, ChamberKind::Ratification] {
            if proposal.votes(kind).is_empty() {
                return Err(violation(format!("no recorded {} chamber votes", kind)));
            }
        }

        if proposal.is_entrenched() {
            if proposal.cooling_off().is_none() {
                return Err(violation("no recorded cooling-off window".to_string()));
            }
            if proposal.confirmation_votes().is_empty() {
                return Err(violation("no recorded confirmation votes".to_string()));
            }
        }

        Ok(())
    }

    /// Write a confirmed change into live configuration
    pub fn apply_amendment(
        &self,
        proposal: &mut Proposal,
        live_config: &mut Value,
        now: Timestamp,
    ) -> Result<(), AmendmentError> {
        self.validate_amendment_application(proposal)?;
        check_provision_path(live_config, &proposal.provision_key)?;

        if let Some(live) = read_provision(live_config, &proposal.provision_key) {
            if live != &proposal.current_value {
                warn!(
                    "Proposal #{}: live value of {} changed since submission",
                    proposal.id, proposal.provision_key
                );
            }
        }

        write_provision(
            live_config,
            &proposal.provision_key,
            proposal.proposed_value.clone(),
        )?;
        proposal.transition(AmendmentStatus::Applied, now)?;

        info!(
            "Proposal #{} applied: {} = {}",
            proposal.id, proposal.provision_key, proposal.proposed_value
        );
        Ok(())
    }
}

fn not_an_object(key: &str, segment: &str) -> AmendmentError {
    AmendmentError::Validation(format!(
        "cannot write {}: '{}' is not an object",
        key, segment
    ))
}

/// Fail before writing anything if an existing intermediate is not an object
fn check_provision_path(root: &Value, key: &str) -> Result<(), AmendmentError> {
    if !root.is_object() {
        return Err(not_an_object(key, "<root>"));
    }

    let segments: Vec<&str> = key.split('.').collect();
    let mut node = root;
    for segment in &segments[..segments.len() - 1] {
        match node.get(*segment) {
            Some(child) if child.is_object() => node = child,
            Some(_) => return Err(not_an_object(key, segment)),
            None => break,
        }
    }
    Ok(())
}

fn read_provision<'v>(root: &'v Value, key: &str) -> Option<&'v Value> {
    key.split('.').try_fold(root, |node, segment| node.get(segment))
}

fn write_provision(root: &mut Value, key: &str, value: Value) -> Result<(), AmendmentError> {
    let mut segments: Vec<&str> = key.split('.').collect();
    let last = segments
        .pop()
        .ok_or_else(|| AmendmentError::Validation("empty provision key".to_string()))?;

    let mut node = root;
    for segment in segments {
        node = node
            .as_object_mut()
            .ok_or_else(|| not_an_object(key, segment))?
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    node.as_object_mut()
        .ok_or_else(|| not_an_object(key, last))?
        .insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ChamberDefinition, ChamberRound, CoolingOffWindow, EntrenchmentTrack, Stage, Vote, Voter,
    };
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
    }

    fn proposal(key: &str, entrenched: bool) -> Proposal {
        Proposal::new(
            5,
            VoterId::new("alice"),
            key.to_string(),
            json!(10),
            json!(12),
            "raise it".to_string(),
            entrenched,
            t0(),
        )
    }

    fn round_with_vote(stage: Stage, voter: &str) -> ChamberRound {
        let id = VoterId::new(voter);
        let mut round = ChamberRound::new(
            ChamberDefinition::new(1, 1),
            vec![Voter::new(voter, "r", "o")],
            t0(),
            t0() + Duration::days(14),
        );
        round.votes.push(Vote {
            id: Vote::derive_id(5, stage, &id),
            voter: id,
            stage,
            approve: true,
            attestation: "ok".to_string(),
            cast_at: t0(),
            region: "r".to_string(),
            organization: "o".to_string(),
        });
        round
    }

    fn confirmed(key: &str) -> Proposal {
        let mut p = proposal(key, false);
        p.chambers
            .insert(ChamberKind::Proposal, round_with_vote(Stage::Proposal, "p1"));
        p.chambers
            .insert(ChamberKind::Ratification, round_with_vote(Stage::Ratification, "r1"));
        p.status = AmendmentStatus::Confirmed;
        p
    }

    #[test]
    fn test_withdraw_requires_proposer() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);
        let mut p = proposal("fees.base", false);

        let err = lifecycle
            .withdraw_amendment(&mut p, &VoterId::new("mallory"), t0())
            .unwrap_err();
        assert!(matches!(err, AmendmentError::NotProposer { .. }));
        assert_eq!(p.status(), AmendmentStatus::Proposed);

        lifecycle
            .withdraw_amendment(&mut p, &VoterId::new("alice"), t0())
            .unwrap();
        assert_eq!(p.status(), AmendmentStatus::Withdrawn);
    }

    #[test]
    fn test_withdraw_blocked_once_votes_exist() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);
        let mut p = proposal("fees.base", false);
        p.chambers
            .insert(ChamberKind::Proposal, round_with_vote(Stage::Proposal, "p1"));
        p.status = AmendmentStatus::ProposalChamberVoting;

        let err = lifecycle
            .withdraw_amendment(&mut p, &VoterId::new("alice"), t0())
            .unwrap_err();
        assert!(err.is_state_error());
        assert_eq!(p.status(), AmendmentStatus::ProposalChamberVoting);
    }

    #[test]
    fn test_phase_reset_dispositions() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);

        let mut unvoted = proposal("fees.base", false);
        unvoted.chambers.insert(
            ChamberKind::Proposal,
            ChamberRound::new(ChamberDefinition::new(1, 1), vec![Voter::new("x", "r", "o")], t0(), t0()),
        );
        unvoted.status = AmendmentStatus::ProposalChamberVoting;
        assert_eq!(
            lifecycle.reset_for_phase(&mut unvoted, t0()),
            PhaseDisposition::Reset(ChamberKind::Proposal)
        );
        assert_eq!(unvoted.status(), AmendmentStatus::Proposed);
        assert!(unvoted.chamber(ChamberKind::Proposal).is_none());

        let mut voted = proposal("fees.base", false);
        voted
            .chambers
            .insert(ChamberKind::Proposal, round_with_vote(Stage::Proposal, "p1"));
        voted.status = AmendmentStatus::ProposalChamberVoting;
        assert_eq!(
            lifecycle.reset_for_phase(&mut voted, t0()),
            PhaseDisposition::Retained(ChamberKind::Proposal)
        );
        assert_eq!(voted.votes(ChamberKind::Proposal).len(), 1);

        let mut idle = confirmed("fees.base");
        assert_eq!(lifecycle.reset_for_phase(&mut idle, t0()), PhaseDisposition::Untouched);
    }

    #[test]
    fn test_unvoted_later_chamber_resets_whole_proposal() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);

        let mut ratifying = proposal("fees.base", false);
        ratifying
            .chambers
            .insert(ChamberKind::Proposal, round_with_vote(Stage::Proposal, "p1"));
        ratifying.chambers.insert(
            ChamberKind::Ratification,
            ChamberRound::new(ChamberDefinition::new(1, 1), vec![Voter::new("r1", "r", "o")], t0(), t0()),
        );
        ratifying.status = AmendmentStatus::RatificationChamberVoting;
        assert_eq!(
            lifecycle.reset_for_phase(&mut ratifying, t0()),
            PhaseDisposition::Reset(ChamberKind::Ratification)
        );
        assert_eq!(ratifying.status(), AmendmentStatus::Proposed);
        assert!(ratifying.chamber(ChamberKind::Proposal).is_none());
        assert!(ratifying.chamber(ChamberKind::Ratification).is_none());

        let mut challenged = confirmed("fees.base");
        challenged.status = AmendmentStatus::ChallengeChamberVoting;
        challenged.challenge_filed = true;
        challenged.challenge_window_closes_at = Some(t0() + Duration::days(10));
        assert_eq!(
            lifecycle.reset_for_phase(&mut challenged, t0()),
            PhaseDisposition::Reset(ChamberKind::Challenge)
        );
        assert_eq!(challenged.status(), AmendmentStatus::Proposed);
        assert_eq!(challenged.total_votes_cast(), 0);
        assert!(!challenged.challenge_filed());
        assert!(challenged.challenge_window_closes_at().is_none());
    }

    #[test]
    fn test_apply_requires_confirmed() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);
        let mut p = proposal("fees.base", false);
        let mut live = json!({ "fees": { "base": 10 } });

        let err = lifecycle.apply_amendment(&mut p, &mut live, t0()).unwrap_err();
        assert!(err.is_constitutional_violation());
        assert_eq!(live, json!({ "fees": { "base": 10 } }));
    }

    #[test]
    fn test_apply_entrenched_needs_confirmation_votes() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);

        let mut p = confirmed("rights.anonymity");
        p.entrenchment = Some(EntrenchmentTrack::AwaitingCoolingOff);
        let err = lifecycle.validate_amendment_application(&p).unwrap_err();
        assert!(err.to_string().contains("cooling-off"));

        let window = CoolingOffWindow {
            started_at: t0(),
            ends_at: t0() + Duration::days(90),
        };
        p.entrenchment = Some(EntrenchmentTrack::CoolingOff { window });
        let err = lifecycle.validate_amendment_application(&p).unwrap_err();
        assert!(err.to_string().contains("confirmation votes"));

        p.entrenchment = Some(EntrenchmentTrack::Confirmation {
            window,
            round: round_with_vote(Stage::Confirmation, "c1"),
        });
        lifecycle.validate_amendment_application(&p).unwrap();
    }

    #[test]
    fn test_apply_writes_nested_path() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);
        let mut p = confirmed("fees.schedule.base");
        let mut live = json!({ "fees": {} });

        lifecycle.apply_amendment(&mut p, &mut live, t0()).unwrap();
        assert_eq!(live, json!({ "fees": { "schedule": { "base": 12 } } }));
        assert_eq!(p.status(), AmendmentStatus::Applied);
        assert_eq!(p.applied_at(), Some(t0()));
    }

    #[test]
    fn test_apply_rejects_scalar_intermediate() {
        let config = ConstitutionConfig::mainnet();
        let lifecycle = LifecycleController::new(&config);
        let mut p = confirmed("fees.base.value");
        let mut live = json!({ "fees": { "base": 10 } });

        let err = lifecycle.apply_amendment(&mut p, &mut live, t0()).unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(live, json!({ "fees": { "base": 10 } }));
        assert_eq!(p.status(), AmendmentStatus::Confirmed);
    }
}
