use thiserror::Error;

/// C1's single error kind: validation never partially accepts (§4.1).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid application description: {0}")]
    InvalidDescription(String),
}

impl DomainError {
    pub fn reason(&self) -> &str {
        match self {
            DomainError::InvalidDescription(reason) => reason,
        }
    }
}
