//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Agent or provider settings are invalid; fatal at construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inference/AI error
    #[error("Inference error: {0}")]
    Inference(String),

    /// A weather tool could not produce data
    ///
    /// Never returned from a chat turn; the workflow folds it into a failed
    /// `ToolResult`.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Whether the error was caused by the caller's input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_convert() {
        let err: ApplicationError = DomainError::EmptyUtterance.into();
        assert!(err.is_user_error());
        assert_eq!(err.to_string(), DomainError::EmptyUtterance.to_string());
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(
            ApplicationError::Inference("timeout".to_string()).to_string(),
            "Inference error: timeout"
        );
        assert!(!ApplicationError::Configuration("x".to_string()).is_user_error());
    }
}
