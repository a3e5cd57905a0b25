// Storage - Schéma persistant des propositions
// Principe: Versionné, validé au chargement, sans moteur de stockage embarqué

pub mod record;

pub use record::*;
