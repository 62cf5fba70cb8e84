use persist_backend::StoreError;
use persist_record::RecordError;
use persist_types::{ClassRef, Oid};
use thiserror::Error;

/// Errors from writing or reading object records.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// An attribute holds a value with no record encoding.
    #[error("value at `{path}` cannot be serialized: {kind}")]
    UnserializableValue { path: String, kind: String },

    /// A non-persistent object reaches itself. Without an OID there is
    /// nothing to break the cycle with.
    #[error("cycle through non-persistent {class} at `{path}`")]
    CyclicWithoutIdentity { path: String, class: ClassRef },

    #[error("nesting deeper than {max} at `{path}`")]
    DepthLimitExceeded { path: String, max: usize },

    /// The record passed the size limit. `size` is where encoding stopped,
    /// not the size the full record would have had.
    #[error("record for {oid} is {size} bytes (max {max})")]
    RecordTooLarge { oid: Oid, size: usize, max: usize },

    /// Too many non-persistent instances inlined into one record. Shared
    /// instances are written again at every use.
    #[error("record for {oid} inlines more than {max} objects at `{path}`")]
    TooManyInlineObjects { oid: Oid, path: String, max: usize },

    /// The backend failed while allocating an identifier.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// A class named in a record could not be loaded (full load path only).
    #[error("load error: {0}")]
    Load(#[source] StoreError),

    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

pub type SerializeResult<T> = Result<T, SerializeError>;
