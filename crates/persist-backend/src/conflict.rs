//! Conflict reports built from record bytes.
//!
//! A report names the classes on both sides of a write conflict using only
//! [`extract_class`]. Building one never deserializes either record and never
//! fails: a side whose bytes cannot be read is reported as `<unknown class>`
//! and keeps the reason for callers that want to tell corruption apart.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use persist_record::extract_class;
use persist_types::{ClassRef, Oid};

/// Placeholder shown for a side whose class could not be read.
pub const UNKNOWN_CLASS: &str = "<unknown class>";

/// Class identity of one side of a conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassIdentity {
    /// Class named by the record's class frame.
    Known(ClassRef),
    /// The record failed structural checks; `reason` says how.
    Unreadable { reason: String },
}

impl ClassIdentity {
    /// Read the class frame of `record`, falling back to `Unreadable`.
    pub fn from_record(oid: Oid, record: &[u8]) -> Self {
        match extract_class(record) {
            Ok(class) => Self::Known(class),
            Err(e) => {
                warn!(oid = %oid, error = %e, "conflict record unreadable, using placeholder");
                Self::Unreadable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn class(&self) -> Option<&ClassRef> {
        match self {
            Self::Known(c) => Some(c),
            Self::Unreadable { .. } => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(c) => write!(f, "{c}"),
            Self::Unreadable { .. } => f.write_str(UNKNOWN_CLASS),
        }
    }
}

/// Serials involved in a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSerials {
    /// Serial the writer based its change on (`None` for a new object).
    pub expected: Option<u64>,
    /// Serial currently committed.
    pub committed: u64,
}

/// Diagnostic for a write conflict on one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub oid: Oid,
    /// Class of the record already committed.
    pub committed: ClassIdentity,
    /// Class of the record being committed.
    pub attempted: ClassIdentity,
    pub serials: Option<ConflictSerials>,
}

impl ConflictReport {
    /// Build a report from the committed and attempted record bytes.
    pub fn from_records(oid: Oid, committed: &[u8], attempted: &[u8]) -> Self {
        Self {
            oid,
            committed: ClassIdentity::from_record(oid, committed),
            attempted: ClassIdentity::from_record(oid, attempted),
            serials: None,
        }
    }

    pub fn with_serials(mut self, expected: Option<u64>, committed: u64) -> Self {
        self.serials = Some(ConflictSerials {
            expected,
            committed,
        });
        self
    }

    /// Returns `true` if both sides name the same class.
    pub fn same_class(&self) -> bool {
        match (&self.committed, &self.attempted) {
            (ClassIdentity::Known(a), ClassIdentity::Known(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database conflict error (oid {}", self.oid)?;
        if self.same_class() {
            write!(f, ", class {}", self.committed)?;
        } else {
            write!(
                f,
                ", committed class {}, new class {}",
                self.committed, self.attempted
            )?;
        }
        if let Some(serials) = &self.serials {
            match serials.expected {
                Some(expected) => write!(f, ", serial this write started from {expected}")?,
                None => write!(f, ", written as a new object")?,
            }
            write!(f, ", serial currently committed {}", serials.committed)?;
        }
        f.write_str(")")
    }
}
