// Test support - Rosters, clocks and stage drivers shared by the suites

use crate::contracts::{AmendmentContract, RoundOutcome};
use crate::genesis::ConstitutionConfig;
use crate::types::{ChamberKind, ProposalId, Timestamp, Voter, VoterId};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub const REGIONS: [&str; 6] = ["andes", "baltic", "congo", "deccan", "yukon", "zagros"];
pub const ORGANIZATIONS: [&str; 8] = [
    "assembly", "coop", "guild", "league", "mutual", "syndicate", "union", "works",
];

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

/// `n` voters spread round-robin over every region and organization
pub fn roster(n: usize) -> Vec<Voter> {
    (0..n)
        .map(|i| {
            Voter::new(
                format!("voter-{:03}", i),
                REGIONS[i % REGIONS.len()],
                ORGANIZATIONS[i % ORGANIZATIONS.len()],
            )
        })
        .collect()
}

pub fn find<'a>(roster: &'a [Voter], id: &VoterId) -> &'a Voter {
    roster.iter().find(|v| &v.id == id).unwrap()
}

/// Route engine logs to the test harness, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn contract() -> AmendmentContract {
    init_tracing();
    AmendmentContract::new(ConstitutionConfig::mainnet()).unwrap()
}

pub fn propose_standard(contract: &mut AmendmentContract, now: Timestamp) -> ProposalId {
    contract
        .propose_amendment(
            VoterId::new("alice"),
            "fees.base_rate",
            json!(100),
            json!(80),
            "Lower the base rate to match validator costs",
            now,
        )
        .unwrap()
}

pub fn propose_entrenched(contract: &mut AmendmentContract, now: Timestamp) -> ProposalId {
    contract
        .propose_amendment(
            VoterId::new("alice"),
            "rights.voluntary_exit",
            json!({ "notice_days": 30 }),
            json!({ "notice_days": 14 }),
            "Shorten exit notice",
            now,
        )
        .unwrap()
}

/// First `yes` panel members vote YES, the next `no` vote NO
pub fn vote_chamber(
    contract: &mut AmendmentContract,
    roster: &[Voter],
    id: ProposalId,
    kind: ChamberKind,
    yes: usize,
    no: usize,
    now: Timestamp,
) {
    let panel = contract.get_proposal(id).unwrap().panel(kind).unwrap().to_vec();
    for (i, member) in panel.iter().take(yes + no).enumerate() {
        contract
            .cast_chamber_vote(id, kind, find(roster, member), i < yes, "I reviewed the proposal", now)
            .unwrap();
    }
}

pub fn vote_confirmation(
    contract: &mut AmendmentContract,
    roster: &[Voter],
    id: ProposalId,
    yes: usize,
    no: usize,
    now: Timestamp,
) {
    let panel = contract
        .get_proposal(id)
        .unwrap()
        .confirmation_panel()
        .unwrap()
        .to_vec();
    for (i, member) in panel.iter().take(yes + no).enumerate() {
        contract
            .cast_confirmation_vote(id, find(roster, member), i < yes, "I reviewed the proposal", now)
            .unwrap();
    }
}

/// Select, vote and close one chamber
pub fn run_chamber(
    contract: &mut AmendmentContract,
    roster: &[Voter],
    id: ProposalId,
    kind: ChamberKind,
    yes: usize,
    no: usize,
    now: Timestamp,
) -> RoundOutcome {
    contract.select_chamber_panel(id, kind, roster, now).unwrap();
    vote_chamber(contract, roster, id, kind, yes, no, now);
    contract.close_chamber_voting(id, kind, now).unwrap()
}

/// Drive a proposal through proposal and ratification chambers with `yes` of 11
pub fn ratify(
    contract: &mut AmendmentContract,
    roster: &[Voter],
    id: ProposalId,
    yes: usize,
    now: Timestamp,
) {
    assert_eq!(
        run_chamber(contract, roster, id, ChamberKind::Proposal, yes, 0, now),
        RoundOutcome::Passed
    );
    assert_eq!(
        run_chamber(contract, roster, id, ChamberKind::Ratification, yes, 0, now),
        RoundOutcome::Passed
    );
}
