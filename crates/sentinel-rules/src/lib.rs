//! DSL compiler and tree-walking evaluator for Sentinel signals.
//!
//! `compiler` implements C4, turning a user-authored [`sentinel_core::Condition`]
//! list into a [`sentinel_core::CompiledAst`]. `evaluator` implements C5, the
//! per-node arithmetic and comparison semantics. `signal_eval` implements C6,
//! driving C5 over every condition shape (simple/group/aggregate) and
//! combining results by the signal's top-level logic. `fetch` defines the
//! interface the evaluator uses to read chain state and indexed events,
//! implemented elsewhere by `sentinel-chain`.

pub mod compiler;
pub mod evaluator;
pub mod fetch;
pub mod signal_eval;

pub use compiler::{compile, compile_with_registry};
pub use evaluator::{evaluate_condition, evaluate_node, EvalClock};
pub use fetch::DataFetcher;
pub use signal_eval::{evaluate_signal, EvaluationContext, SignalEvalResult};
