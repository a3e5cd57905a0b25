// Tests module
// Scenarios: standard and entrenched pathways end to end, persistence, phase changes
// Invariants: disjoint panels, forward-only status, append-only ballots
// Proptests: randomized selection, tallying and call sequences

pub mod support;
