//! Foundation types for the persistent-object store.
//!
//! Every other crate in the workspace depends on `persist-types`.
//!
//! # Key Types
//!
//! - [`Oid`]: 64-bit object identifier with a fixed 8-byte big-endian form
//! - [`ClassRef`]: symbolic (module path, class name) reference
//! - [`ClassRefToken`]: a class reference tagged as blueprint or literal
//!
//! The free functions [`encode`], [`decode`] and [`decode_unsigned`] are the
//! identifier codec used wherever OIDs cross a process boundary.

pub mod class_ref;
pub mod error;
pub mod oid;

pub use class_ref::{ClassRef, ClassRefToken};
pub use error::TypeError;
pub use oid::{decode, decode_unsigned, encode, Oid, OID_LEN};
