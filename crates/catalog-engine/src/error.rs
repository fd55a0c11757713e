//! Engine error types.

use thiserror::Error;

/// Errors surfaced by an `EngineGateway`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Target index, alias or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Engine refused a create because the name is taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Transport or protocol failure reaching the engine
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// Engine was reachable but rejected the operation
    #[error("Engine rejected {operation}: {reason}")]
    Operation { operation: String, reason: String },

    /// Engine answered with a body we could not interpret
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    /// Index was created but its engine id could not be read back
    #[error("Created '{index}' but could not read its id: {reason}")]
    CreatedWithoutId { index: String, reason: String },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Operation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::NotFound("index 'plants'".to_string());
        assert!(err.to_string().contains("plants"));

        let err = EngineError::operation("create_alias", "invalid_alias_name_exception");
        assert!(err.to_string().contains("create_alias"));
        assert!(err.to_string().contains("invalid_alias_name_exception"));
    }
}
