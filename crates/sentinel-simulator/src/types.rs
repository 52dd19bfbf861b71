//! Result and configuration types for offline re-evaluation (C10, §4.10).

use chrono::{DateTime, Utc};

/// Left/right numeric values for a single-simple-condition signal,
/// returned alongside the verdict for diagnostic display (§4.10 "Point
/// evaluation").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostic {
    pub left: f64,
    pub right: f64,
}

/// The outcome of evaluating one signal at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResult {
    pub triggered: bool,
    pub conclusive: bool,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
    pub current_block: u64,
    pub window_start_block: u64,
    pub diagnostic: Option<Diagnostic>,
}

/// Bounds a [`sweep`](crate::simulator::Simulator::sweep) call (§4.10
/// "Cap total steps... to bound RPC load").
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub max_steps: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { max_steps: 2000 }
    }
}

/// One point in a [`sweep`](crate::simulator::Simulator::sweep) result,
/// reporting whether the requested range was truncated to respect
/// [`SweepConfig::max_steps`].
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub points: Vec<PointResult>,
    pub truncated: bool,
}
