// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid poll interval: {0}s cannot be expressed as a periodic schedule")]
    InvalidPollInterval(u32),

    #[error("Empty server name")]
    EmptyServerName,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
