use thiserror::Error;

/// Errors from processing one evaluation job. A job that fails is retained
/// for inspection rather than silently dropped (§6.2).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] sentinel_store::StoreError),

    #[error("evaluation setup error: {0}")]
    Eval(String),
}
