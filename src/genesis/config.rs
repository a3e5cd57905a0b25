// Configuration constitutionnelle - Unified amendment protocol configuration
//
// Every threshold the vote-closing path reads is validated here, at load time.
// A missing or out-of-range value fails at startup, never inside a tally.

use crate::types::{ChamberDefinition, ChamberKind};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Entrenched pass requires 80% of cast votes to be YES
pub const DEFAULT_SUPERMAJORITY_PERCENT: u8 = 80;

/// Entrenched pass requires half the panel to vote
pub const DEFAULT_ENTRENCHED_PARTICIPATION_PERCENT: u8 = 50;

/// Below this participation at the deadline, a vote lapses
pub const DEFAULT_LAPSE_PARTICIPATION_PERCENT: u8 = 50;

/// Voting window for every chamber (14 days)
pub const DEFAULT_VOTING_WINDOW_DAYS: u32 = 14;

/// Window in which a ratified change can be challenged (10 days)
pub const DEFAULT_CHALLENGE_WINDOW_DAYS: u32 = 10;

/// Cooling-off before an entrenched change can be confirmed (90 days)
pub const DEFAULT_COOLING_OFF_DAYS: u32 = 90;

/// Longest accepted window of any kind (about a century)
pub const MAX_WINDOW_DAYS: u32 = 36_500;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Constitutional configuration consumed by the amendment engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionConfig {
    /// Provision keys that require the entrenched path
    pub entrenched_provisions: BTreeSet<String>,

    /// Provision keys computed by formula, never ballot-amendable
    pub formula_only_provisions: BTreeSet<String>,

    pub thresholds: ThresholdConfig,

    pub timing: TimingConfig,

    pub diversity: DiversityPolicy,

    /// Confirmation panel for entrenched proposals
    pub confirmation: ChamberDefinition,

    /// Chamber definitions active at load time
    pub phase: PhaseConfig,
}

/// Voting thresholds (whole percentages)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub supermajority_percent: u8,
    pub entrenched_participation_percent: u8,
    pub lapse_participation_percent: u8,
}

/// Durations in whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub voting_window_days: u32,
    pub challenge_window_days: u32,
    pub cooling_off_days: u32,
}

impl TimingConfig {
    pub fn voting_window(&self) -> Duration {
        Duration::days(self.voting_window_days as i64)
    }

    pub fn challenge_window(&self) -> Duration {
        Duration::days(self.challenge_window_days as i64)
    }

    pub fn cooling_off(&self) -> Duration {
        Duration::days(self.cooling_off_days as i64)
    }
}

/// Diversity requirements applied to every panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiversityPolicy {
    pub min_regions: usize,
    pub min_organizations: usize,

    /// No region or organization may hold more than this share of seats
    pub max_concentration_percent: u8,
}

/// A governance phase: a named set of chamber definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    pub proposal: ChamberDefinition,
    pub ratification: ChamberDefinition,
    pub challenge: ChamberDefinition,
}

impl PhaseConfig {
    pub fn chamber(&self, kind: ChamberKind) -> ChamberDefinition {
        match kind {
            ChamberKind::Proposal => self.proposal,
            ChamberKind::Ratification => self.ratification,
            ChamberKind::Challenge => self.challenge,
        }
    }

    pub fn validate(&self, diversity: &DiversityPolicy) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("phase.name", "must not be empty"));
        }
        validate_chamber("phase.proposal", &self.proposal, diversity)?;
        validate_chamber("phase.ratification", &self.ratification, diversity)?;
        validate_chamber("phase.challenge", &self.challenge, diversity)
    }
}

impl ConstitutionConfig {
    /// Unified KratOs constitution
    pub fn mainnet() -> Self {
        Self {
            entrenched_provisions: [
                "governance.supermajority_percent",
                "governance.cooling_off_days",
                "rights.voluntary_exit",
                "rights.anonymity",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            formula_only_provisions: ["commission_floor", "treasury.emission_rate"]
                .into_iter()
                .map(String::from)
                .collect(),
            thresholds: ThresholdConfig {
                supermajority_percent: DEFAULT_SUPERMAJORITY_PERCENT,
                entrenched_participation_percent: DEFAULT_ENTRENCHED_PARTICIPATION_PERCENT,
                lapse_participation_percent: DEFAULT_LAPSE_PARTICIPATION_PERCENT,
            },
            timing: TimingConfig {
                voting_window_days: DEFAULT_VOTING_WINDOW_DAYS,
                challenge_window_days: DEFAULT_CHALLENGE_WINDOW_DAYS,
                cooling_off_days: DEFAULT_COOLING_OFF_DAYS,
            },
            diversity: DiversityPolicy {
                min_regions: 3,
                min_organizations: 3,
                max_concentration_percent: 40,
            },
            confirmation: ChamberDefinition::new(11, 9),
            phase: PhaseConfig {
                name: "bootstrap".to_string(),
                proposal: ChamberDefinition::new(11, 6),
                ratification: ChamberDefinition::new(11, 8),
                challenge: ChamberDefinition::new(11, 6),
            },
        }
    }

    pub fn is_entrenched(&self, provision_key: &str) -> bool {
        self.entrenched_provisions.contains(provision_key)
    }

    pub fn is_formula_only(&self, provision_key: &str) -> bool {
        self.formula_only_provisions.contains(provision_key)
    }

    /// Check every field the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_percent(
            "thresholds.supermajority_percent",
            self.thresholds.supermajority_percent,
        )?;
        validate_percent(
            "thresholds.entrenched_participation_percent",
            self.thresholds.entrenched_participation_percent,
        )?;
        validate_percent(
            "thresholds.lapse_participation_percent",
            self.thresholds.lapse_participation_percent,
        )?;

        validate_window("timing.voting_window_days", self.timing.voting_window_days)?;
        validate_window("timing.challenge_window_days", self.timing.challenge_window_days)?;
        validate_window("timing.cooling_off_days", self.timing.cooling_off_days)?;

        validate_percent(
            "diversity.max_concentration_percent",
            self.diversity.max_concentration_percent,
        )?;

        self.phase.validate(&self.diversity)?;
        validate_chamber("confirmation", &self.confirmation, &self.diversity)?;

        if let Some(key) = self
            .entrenched_provisions
            .intersection(&self.formula_only_provisions)
            .next()
        {
            return Err(ConfigError::invalid(
                "entrenched_provisions",
                format!("'{}' is also formula-only", key),
            ));
        }

        Ok(())
    }

    /// Parse and validate from JSON text
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Charge depuis un fichier JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Sauvegarde vers un fichier JSON
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Read(e.to_string()))
    }
}

impl Default for ConstitutionConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

fn validate_percent(field: &'static str, value: u8) -> Result<(), ConfigError> {
    if value == 0 || value > 100 {
        return Err(ConfigError::invalid(field, format!("{} is not in 1..=100", value)));
    }
    Ok(())
}

fn validate_window(field: &'static str, days: u32) -> Result<(), ConfigError> {
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(ConfigError::invalid(
            field,
            format!("{} days is not in 1..={}", days, MAX_WINDOW_DAYS),
        ));
    }
    Ok(())
}

fn validate_chamber(
    field: &'static str,
    chamber: &ChamberDefinition,
    diversity: &DiversityPolicy,
) -> Result<(), ConfigError> {
    if chamber.panel_size == 0 {
        return Err(ConfigError::invalid(field, "panel_size must be positive"));
    }
    if chamber.pass_threshold == 0 || chamber.pass_threshold > chamber.panel_size {
        return Err(ConfigError::invalid(
            field,
            format!(
                "pass_threshold {} must be in 1..={}",
                chamber.pass_threshold, chamber.panel_size
            ),
        ));
    }
    if diversity.min_regions > chamber.panel_size
        || diversity.min_organizations > chamber.panel_size
    {
        return Err(ConfigError::invalid(
            field,
            "panel_size is smaller than the diversity minimums",
        ));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read constitution config: {0}")]
    Read(String),

    #[error("Failed to parse constitution config: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
