use serde::{Deserialize, Serialize};

use persist_types::{ClassRef, Oid};

use crate::error::StoreResult;

/// Source of fresh object identifiers.
///
/// Allocation is serialized by the implementation; callers treat it as a
/// blocking call and propagate its errors unchanged.
pub trait OidAllocator: Send + Sync {
    /// Return an identifier that has never been handed out before.
    fn allocate_oid(&self) -> StoreResult<Oid>;
}

/// A class the loader was able to resolve.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassHandle {
    pub class: ClassRef,
    /// Whether instances carry their own OID.
    pub persistent: bool,
}

/// Resolves symbolic class references into loaded classes.
///
/// Only the full deserialization path uses this. Metadata extraction and
/// conflict reporting must never call it.
pub trait ClassLoader: Send + Sync {
    fn load_class(&self, module: &str, name: &str) -> StoreResult<ClassHandle>;
}

/// One committed revision of an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub serial: u64,
    pub data: Vec<u8>,
}

/// A pending write of one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordWrite {
    pub oid: Oid,
    /// Serial the new state was derived from; `None` for a new object.
    pub expected_serial: Option<u64>,
    pub data: Vec<u8>,
}

/// Revisioned record storage keyed by OID.
///
/// All implementations must satisfy these invariants:
/// - Records are immutable once written; a new revision replaces the
///   current one under a new serial.
/// - A batch is applied entirely or not at all.
/// - A write whose expected serial does not match the committed one fails
///   with [`StoreError::Conflict`](crate::StoreError::Conflict).
pub trait RecordStore: Send + Sync {
    /// Latest committed revision, or `Ok(None)` if the OID is unknown.
    fn load(&self, oid: &Oid) -> StoreResult<Option<Revision>>;

    /// Apply a batch of writes under one new serial and return that serial.
    fn store_all(&self, writes: &[RecordWrite]) -> StoreResult<u64>;

    /// Write a single record.
    fn store(&self, oid: Oid, expected_serial: Option<u64>, data: Vec<u8>) -> StoreResult<u64> {
        self.store_all(&[RecordWrite {
            oid,
            expected_serial,
            data,
        }])
    }

    fn exists(&self, oid: &Oid) -> StoreResult<bool> {
        Ok(self.load(oid)?.is_some())
    }
}
