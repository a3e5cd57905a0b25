// Types fondamentaux des amendements KratOs
// Principe: Minimal, auditable, durable

pub mod primitives;
pub mod amendment;
pub mod error;

pub use primitives::*;
pub use amendment::*;
pub use error::*;
