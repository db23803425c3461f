use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("cannot delete an active execution: {0}")]
    ActiveExecutionDelete(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
