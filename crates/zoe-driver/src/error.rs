use thiserror::Error;

/// C3's error taxonomy, propagated to the Materializer: transient failures are
/// retried by the scheduler; fatal ones transition the execution to ERROR.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Cluster overloaded, connection reset, image pull timeout — retry.
    #[error("transient cluster error: {0}")]
    Transient(String),

    /// Image not found, resource request exceeds cluster capacity, malformed
    /// request — do not retry.
    #[error("fatal cluster error: {0}")]
    Fatal(String),
}

impl DriverError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Transient(_))
    }
}
