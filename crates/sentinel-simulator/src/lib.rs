//! Offline signal re-evaluation (C10, §4.10): point evaluation, sweeps, and
//! first-trigger discovery against historical chain state, driven by the
//! same compiled AST and evaluator the live worker uses.

pub mod simulator;
pub mod types;

pub use simulator::Simulator;
pub use types::{Diagnostic, PointResult, SweepConfig, SweepResult};
