//! Error taxonomy for catalog operations.
//!
//! Every failure a caller can see is one of these kinds. Cross-store
//! failures carry which step completed and which failed, so the caller
//! knows which side is now authoritative.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use catalog_engine::EngineError;
use catalog_registry::RegistryError;
use catalog_types::TypesError;

/// One step of a multi-store lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStep {
    EngineCreate,
    RegistryInsert,
    EngineDelete,
    RegistryDelete,
    AliasRevoke,
    AliasGrant,
    RegistryUpdate,
}

impl LifecycleStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStep::EngineCreate => "engine create",
            LifecycleStep::RegistryInsert => "registry insert",
            LifecycleStep::EngineDelete => "engine delete",
            LifecycleStep::RegistryDelete => "registry delete",
            LifecycleStep::AliasRevoke => "alias revoke",
            LifecycleStep::AliasGrant => "alias grant",
            LifecycleStep::RegistryUpdate => "registry update",
        }
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the coordinator, document access and reconciliation.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Named index, alias or document is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate name or alias collision
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed or incomplete input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Engine could not be reached
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Engine was reachable but rejected the operation
    #[error("Engine operation failed: {0}")]
    EngineOperation(String),

    /// Registry write failed
    #[error("Registry write failed: {0}")]
    RegistryWrite(String),

    /// Registry read failed for a reason other than not-found
    #[error("Registry read failed: {0}")]
    RegistryRead(String),

    /// One store was changed and the other was not
    #[error("Partial failure: {completed} succeeded but {failed} failed: {message}")]
    PartialFailure {
        completed: LifecycleStep,
        failed: LifecycleStep,
        message: String,
    },
}

impl CatalogError {
    pub fn partial(completed: LifecycleStep, failed: LifecycleStep, cause: impl fmt::Display) -> Self {
        CatalogError::PartialFailure {
            completed,
            failed,
            message: cause.to_string(),
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::NotFound(_) => 404,
            CatalogError::Conflict(_) => 409,
            CatalogError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// The subsystem responsible for the failure.
    pub fn subsystem(&self) -> &'static str {
        match self {
            CatalogError::EngineUnavailable(_) | CatalogError::EngineOperation(_) => "engine",
            CatalogError::RegistryWrite(_) | CatalogError::RegistryRead(_) => "registry",
            CatalogError::PartialFailure { .. } => "engine+registry",
            CatalogError::NotFound(_) | CatalogError::Conflict(_) | CatalogError::Validation(_) => {
                "request"
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }

    /// Classify a failed registry read.
    pub fn registry_read(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => CatalogError::NotFound(format!("index '{}'", name)),
            other => CatalogError::RegistryRead(other.to_string()),
        }
    }

    /// Classify a failed registry write.
    pub fn registry_write(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateName(name) => {
                CatalogError::Conflict(format!("index '{}' is already tracked", name))
            }
            RegistryError::NotFound(name) => CatalogError::NotFound(format!("index '{}'", name)),
            other => CatalogError::RegistryWrite(other.to_string()),
        }
    }
}

impl From<EngineError> for CatalogError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(target) => CatalogError::NotFound(target),
            EngineError::AlreadyExists(target) => CatalogError::Conflict(target),
            EngineError::Unavailable(reason) => CatalogError::EngineUnavailable(reason),
            other @ (EngineError::Operation { .. }
            | EngineError::InvalidResponse(_)
            | EngineError::CreatedWithoutId { .. }
            | EngineError::Config(_)) => CatalogError::EngineOperation(other.to_string()),
        }
    }
}

impl From<TypesError> for CatalogError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::InvalidInput(msg) => CatalogError::Validation(msg),
            other => CatalogError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CatalogError::NotFound("x".into()).status_code(), 404);
        assert_eq!(CatalogError::Conflict("x".into()).status_code(), 409);
        assert_eq!(CatalogError::Validation("x".into()).status_code(), 400);
        assert_eq!(CatalogError::EngineUnavailable("x".into()).status_code(), 500);
        assert_eq!(CatalogError::RegistryWrite("x".into()).status_code(), 500);
        assert_eq!(
            CatalogError::partial(LifecycleStep::EngineDelete, LifecycleStep::RegistryDelete, "io")
                .status_code(),
            500
        );
    }

    #[test]
    fn test_server_errors_name_their_subsystem() {
        assert_eq!(CatalogError::EngineOperation("x".into()).subsystem(), "engine");
        assert_eq!(CatalogError::RegistryRead("x".into()).subsystem(), "registry");
        let err =
            CatalogError::partial(LifecycleStep::AliasRevoke, LifecycleStep::AliasGrant, "boom");
        assert_eq!(err.subsystem(), "engine+registry");
        assert!(err.to_string().contains("alias revoke succeeded but alias grant failed"));
    }

    #[test]
    fn test_engine_error_mapping() {
        let err: CatalogError = EngineError::AlreadyExists("plants".into()).into();
        assert!(matches!(err, CatalogError::Conflict(_)));

        let err: CatalogError = EngineError::Unavailable("refused".into()).into();
        assert!(matches!(err, CatalogError::EngineUnavailable(_)));

        let err: CatalogError = EngineError::operation("create", "mapper_parsing_exception").into();
        assert!(matches!(err, CatalogError::EngineOperation(msg) if msg.contains("mapper_parsing")));
    }

    #[test]
    fn test_registry_error_mapping() {
        let err = CatalogError::registry_write(RegistryError::DuplicateName("plants".into()));
        assert!(matches!(err, CatalogError::Conflict(_)));

        let err = CatalogError::registry_write(RegistryError::Backend("disk full".into()));
        assert!(matches!(err, CatalogError::RegistryWrite(_)));

        let err = CatalogError::registry_read(RegistryError::NotFound("ghost".into()));
        assert!(err.is_not_found());
    }
}
