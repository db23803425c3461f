use thiserror::Error;

/// C4's error taxonomy (§7): the only two kinds visible above the materializer.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("transient start failure: {0}")]
    TransientStart(String),

    #[error("fatal start failure: {0}")]
    FatalStart(String),

    #[error("store error: {0}")]
    Store(#[from] zoe_store::StoreError),
}

/// C5's error taxonomy. The scheduler loop never lets a `MaterializeError`
/// escape the main loop; it is always absorbed into a status transition.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] zoe_store::StoreError),

    #[error("internal scheduler error: {0}")]
    Internal(String),
}
