// Panel Selection - Diversity-constrained panel selection
// Principle: No single region or organization can capture a chamber
//
// Selection walks the candidate list in order. It is deterministic for a given
// roster ordering; randomization, if any, belongs to whoever orders the roster.

use crate::genesis::DiversityPolicy;
use crate::types::{DiversityError, Voter, VoterId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Constraints for one panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConstraints {
    /// Exact number of seats
    pub size: usize,

    /// Minimum distinct regions on the panel
    pub min_regions: usize,

    /// Minimum distinct organizations on the panel
    pub min_organizations: usize,

    /// Maximum share of seats any single region or organization may hold
    pub max_concentration_percent: u8,
}

impl PanelConstraints {
    pub fn new(size: usize, policy: &DiversityPolicy) -> Self {
        Self {
            size,
            min_regions: policy.min_regions,
            min_organizations: policy.min_organizations,
            max_concentration_percent: policy.max_concentration_percent,
        }
    }

    /// Seats a single group may hold: max(1, floor(size * c_max))
    pub fn concentration_cap(&self) -> usize {
        (self.size * self.max_concentration_percent as usize / 100).max(1)
    }
}

/// Seats filled so far, with per-group counts
struct PanelBuilder<'a> {
    cap: usize,
    seats: Vec<&'a Voter>,
    seated: HashSet<&'a VoterId>,
    regions: HashMap<&'a str, usize>,
    organizations: HashMap<&'a str, usize>,
}

impl<'a> PanelBuilder<'a> {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            seats: Vec::new(),
            seated: HashSet::new(),
            regions: HashMap::new(),
            organizations: HashMap::new(),
        }
    }

    /// Candidate can be seated without breaching the cap
    fn admits(&self, voter: &Voter) -> bool {
        !self.seated.contains(&voter.id)
            && self.regions.get(voter.region.as_str()).copied().unwrap_or(0) < self.cap
            && self.organizations.get(voter.organization.as_str()).copied().unwrap_or(0) < self.cap
    }

    fn seat(&mut self, voter: &'a Voter) {
        self.seats.push(voter);
        self.seated.insert(&voter.id);
        *self.regions.entry(voter.region.as_str()).or_insert(0) += 1;
        *self.organizations.entry(voter.organization.as_str()).or_insert(0) += 1;
    }

    fn has_region(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    fn into_members(self) -> Vec<Voter> {
        self.seats.into_iter().cloned().collect()
    }
}

/// Select exactly `constraints.size` voters or fail
///
/// 1. drop excluded (and duplicate) candidates
/// 2. fail fast when the pool cannot satisfy the minimums
/// 3. seat one candidate per unseen region until `min_regions` is met
/// 4. fill remaining seats in order, never exceeding the concentration cap
///
/// Organizations are not seeded; a filled panel short of `min_organizations`
/// fails. Nothing is returned unless every constraint holds.
pub fn select_panel(
    candidates: &[Voter],
    constraints: &PanelConstraints,
    excluded: &HashSet<VoterId>,
) -> Result<Vec<VoterId>, DiversityError> {
    select_members(candidates, constraints, excluded)
        .map(|members| members.into_iter().map(|m| m.id).collect())
}

/// Same walk as `select_panel`, returning each member with the region and
/// organization it was seated under
pub fn select_members(
    candidates: &[Voter],
    constraints: &PanelConstraints,
    excluded: &HashSet<VoterId>,
) -> Result<Vec<Voter>, DiversityError> {
    let mut seen = HashSet::new();
    let pool: Vec<&Voter> = candidates
        .iter()
        .filter(|v| !excluded.contains(&v.id))
        .filter(|v| seen.insert(&v.id))
        .collect();

    if pool.len() < constraints.size {
        return Err(DiversityError::InsufficientCandidates {
            requested: constraints.size,
            available: pool.len(),
        });
    }
    if constraints.size < constraints.min_regions {
        return Err(DiversityError::PanelTooSmall {
            size: constraints.size,
            required: constraints.min_regions,
            dimension: "regions",
        });
    }
    if constraints.size < constraints.min_organizations {
        return Err(DiversityError::PanelTooSmall {
            size: constraints.size,
            required: constraints.min_organizations,
            dimension: "organizations",
        });
    }

    let available_regions: HashSet<&str> = pool.iter().map(|v| v.region.as_str()).collect();
    if available_regions.len() < constraints.min_regions {
        return Err(DiversityError::InsufficientRegions {
            required: constraints.min_regions,
            available: available_regions.len(),
        });
    }
    let available_orgs: HashSet<&str> = pool.iter().map(|v| v.organization.as_str()).collect();
    if available_orgs.len() < constraints.min_organizations {
        return Err(DiversityError::InsufficientOrganizations {
            required: constraints.min_organizations,
            available: available_orgs.len(),
        });
    }

    let cap = constraints.concentration_cap();
    let mut builder = PanelBuilder::new(cap);

    for &voter in &pool {
        if builder.regions.len() >= constraints.min_regions {
            break;
        }
        if !builder.has_region(&voter.region) && builder.admits(voter) {
            builder.seat(voter);
        }
    }
    if builder.regions.len() < constraints.min_regions {
        return Err(DiversityError::InsufficientRegions {
            required: constraints.min_regions,
            available: builder.regions.len(),
        });
    }

    for &voter in &pool {
        if builder.seats.len() >= constraints.size {
            break;
        }
        if builder.admits(voter) {
            builder.seat(voter);
        }
    }
    if builder.seats.len() < constraints.size {
        return Err(DiversityError::ConcentrationCapExhausted {
            cap,
            selected: builder.seats.len(),
            requested: constraints.size,
        });
    }
    if builder.organizations.len() < constraints.min_organizations {
        return Err(DiversityError::InsufficientOrganizations {
            required: constraints.min_organizations,
            available: builder.organizations.len(),
        });
    }

    debug!(
        "Selected panel of {} ({} regions, {} organizations, cap {})",
        builder.seats.len(),
        builder.regions.len(),
        builder.organizations.len(),
        cap
    );

    Ok(builder.into_members())
}
