//! Record byte format for the persistent-object store.
//!
//! A record is the serialized state of exactly one persistent object at one
//! revision. It opens with a class-reference frame naming the object's
//! class, followed by the attribute-state frame. Other persistent objects
//! appear only as OID reference tokens; classes used as values appear only
//! as symbolic names.
//!
//! # Architecture
//!
//! - [`format`]: opcodes, limits, and varint framing shared by everything
//! - [`RecordBuilder`]: incremental encoder used by the object writer
//! - [`Cursor`]: bounds-checked forward-only reader
//! - [`extract_class`], [`scan_references`], [`inspect`]: metadata
//!   extraction that never loads a class

pub mod builder;
pub mod cursor;
pub mod error;
pub mod extract;
pub mod format;

pub use builder::RecordBuilder;
pub use cursor::Cursor;
pub use error::{RecordError, RecordResult};
pub use extract::{extract_class, inspect, scan_references, RecordSummary};
pub use format::{Opcode, ValueOpcode, MAX_NAME_LEN, MAX_NESTING_DEPTH};
