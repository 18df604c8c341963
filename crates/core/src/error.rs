// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The agent cannot run without this job; callers must terminate the process
    #[error("Fatal configuration error: {0}")]
    ConfigurationFatal(String),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Connection error: {0}")]
    Connection(#[from] crate::port::ConnectionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for errors that must end the agent process
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigurationFatal(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
