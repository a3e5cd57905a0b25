// Genesis - Constitution en vigueur au démarrage
pub mod config;

pub use config::{
    ConfigError, ConstitutionConfig, DiversityPolicy, PhaseConfig, ThresholdConfig, TimingConfig,
};
