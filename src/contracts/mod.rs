// Contracts - Constitutional amendment protocol
// Principle: No central authority, every stage is hardcoded and auditable

pub mod panel_selection;
pub mod chambers;
pub mod ratification;
pub mod lifecycle;
pub mod events;
pub mod amendments;

pub use amendments::AmendmentContract;
pub use chambers::{ChamberController, RoundOutcome};
pub use events::{AmendmentEvent, AmendmentEventKind};
pub use lifecycle::{LifecycleController, PhaseDisposition, PhaseTransitionReport};
pub use panel_selection::{select_members, select_panel, PanelConstraints};
pub use ratification::PostRatificationController;
