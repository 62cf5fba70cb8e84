use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// An OID byte string whose length is not exactly 8.
    #[error("malformed identifier: expected 8 bytes, got {actual}")]
    MalformedIdentifier { actual: usize },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}
