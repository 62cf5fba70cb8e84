use thiserror::Error;

/// Errors from encoding or structurally parsing a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The bytes do not follow the record framing. Never carries partial
    /// output: callers get either a complete answer or this error.
    #[error("malformed record at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// A class, attribute, or key name exceeds the framing limit.
    #[error("name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("class name must not be empty")]
    EmptyClassName,
}

pub type RecordResult<T> = Result<T, RecordError>;
