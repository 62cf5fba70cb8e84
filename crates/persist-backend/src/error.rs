use persist_types::{ClassRef, Oid};

use crate::conflict::ConflictReport;

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The class loader has no class under this name.
    #[error("class not found: {0}")]
    ClassNotFound(ClassRef),

    /// No committed record exists for this OID.
    #[error("object not found: {0}")]
    NotFound(Oid),

    /// The same OID appears more than once in one batch.
    #[error("object written twice in one batch: {0}")]
    DuplicateWrite(Oid),

    /// Every identifier has been handed out.
    #[error("OID space exhausted")]
    OidSpaceExhausted,

    /// A write raced with another committed revision of the same object.
    #[error("{0}")]
    Conflict(ConflictReport),
}

/// Result alias for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;
