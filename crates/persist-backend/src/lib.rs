//! Backend collaborators for the persistent-object store.
//!
//! The serialization core consumes three contracts from its storage
//! backend, each a trait here:
//!
//! - [`OidAllocator`] -- hands out fresh object identifiers
//! - [`ClassLoader`] -- resolves symbolic class references (full load path only)
//! - [`RecordStore`] -- revisioned record storage with conflict detection
//!
//! [`InMemoryBackend`] implements all three for tests and embedding.
//!
//! # Conflict reporting
//!
//! When a write races with a committed revision, the store raises
//! [`StoreError::Conflict`] carrying a [`ConflictReport`]. The report is
//! built from the two record byte strings alone; no class is ever loaded
//! to describe a conflict.

pub mod conflict;
pub mod error;
pub mod memory;
pub mod traits;

pub use conflict::{ClassIdentity, ConflictReport, ConflictSerials, UNKNOWN_CLASS};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBackend;
pub use traits::{ClassHandle, ClassLoader, OidAllocator, RecordStore, RecordWrite, Revision};
