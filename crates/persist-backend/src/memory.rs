use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use tracing::debug;

use persist_types::{ClassRef, Oid};

use crate::conflict::ConflictReport;
use crate::error::{StoreError, StoreResult};
use crate::traits::{ClassHandle, ClassLoader, OidAllocator, RecordStore, RecordWrite, Revision};

#[derive(Default)]
struct RecordTable {
    revisions: HashMap<Oid, Revision>,
    last_serial: u64,
}

/// In-memory backend: OID allocator, class registry, and record store.
///
/// Intended for tests and embedding. Records and classes sit behind
/// `RwLock`s. OIDs come from a counter behind a `Mutex`, so concurrent
/// writers never receive the same identifier; `None` once `u64::MAX` has
/// been handed out.
pub struct InMemoryBackend {
    next_oid: Mutex<Option<Oid>>,
    records: RwLock<RecordTable>,
    classes: RwLock<HashMap<ClassRef, ClassHandle>>,
}

impl InMemoryBackend {
    /// Create an empty backend. The first allocated OID is 1; OID 0 is
    /// reserved for the root object.
    pub fn new() -> Self {
        Self::with_first_oid(Oid::new(1))
    }

    /// Create an empty backend whose first allocated OID is `first`.
    pub fn with_first_oid(first: Oid) -> Self {
        Self {
            next_oid: Mutex::new(Some(first)),
            records: RwLock::new(RecordTable::default()),
            classes: RwLock::new(HashMap::new()),
        }
    }

    /// Make `class` resolvable through [`ClassLoader::load_class`].
    pub fn register_class(&self, class: ClassRef, persistent: bool) -> ClassHandle {
        let handle = ClassHandle {
            class: class.clone(),
            persistent,
        };
        self.classes
            .write()
            .expect("lock poisoned")
            .insert(class, handle.clone());
        handle
    }

    /// Number of objects with a committed record.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").revisions.len()
    }

    /// Returns `true` if no record has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serial of the most recent successful batch (0 before any write).
    pub fn last_serial(&self) -> u64 {
        self.records.read().expect("lock poisoned").last_serial
    }

    /// Sorted list of every OID with a committed record.
    pub fn all_oids(&self) -> Vec<Oid> {
        let table = self.records.read().expect("lock poisoned");
        let mut oids: Vec<Oid> = table.revisions.keys().copied().collect();
        oids.sort();
        oids
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OidAllocator for InMemoryBackend {
    fn allocate_oid(&self) -> StoreResult<Oid> {
        let mut next = self.next_oid.lock().expect("lock poisoned");
        let oid = next.ok_or(StoreError::OidSpaceExhausted)?;
        *next = oid.checked_next();
        debug!(oid = %oid, "allocated oid");
        Ok(oid)
    }
}

impl ClassLoader for InMemoryBackend {
    fn load_class(&self, module: &str, name: &str) -> StoreResult<ClassHandle> {
        let class = ClassRef::new(module, name);
        let classes = self.classes.read().expect("lock poisoned");
        classes
            .get(&class)
            .cloned()
            .ok_or(StoreError::ClassNotFound(class))
    }
}

impl RecordStore for InMemoryBackend {
    fn load(&self, oid: &Oid) -> StoreResult<Option<Revision>> {
        let table = self.records.read().expect("lock poisoned");
        Ok(table.revisions.get(oid).cloned())
    }

    fn store_all(&self, writes: &[RecordWrite]) -> StoreResult<u64> {
        let mut table = self.records.write().expect("lock poisoned");

        // Validate the whole batch before touching anything.
        let mut batch_oids = HashSet::new();
        for write in writes {
            if !batch_oids.insert(write.oid) {
                return Err(StoreError::DuplicateWrite(write.oid));
            }
            match (table.revisions.get(&write.oid), write.expected_serial) {
                (None, None) => {}
                (None, Some(_)) => return Err(StoreError::NotFound(write.oid)),
                (Some(current), expected) if expected != Some(current.serial) => {
                    let report =
                        ConflictReport::from_records(write.oid, &current.data, &write.data)
                            .with_serials(expected, current.serial);
                    debug!(oid = %write.oid, committed = current.serial, "write conflict");
                    return Err(StoreError::Conflict(report));
                }
                (Some(_), _) => {}
            }
        }

        let serial = table.last_serial + 1;
        for write in writes {
            table.revisions.insert(
                write.oid,
                Revision {
                    serial,
                    data: write.data.clone(),
                },
            );
        }
        table.last_serial = serial;
        debug!(serial, records = writes.len(), "committed batch");
        Ok(serial)
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("object_count", &self.len())
            .field("last_serial", &self.last_serial())
            .finish()
    }
}
