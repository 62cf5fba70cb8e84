use persist_types::{ClassRef, Oid};

use crate::error::{RecordError, RecordResult};
use crate::format::{encode_varint, Opcode, MAX_NAME_LEN};

/// Incremental encoder for one record.
///
/// The builder writes the class-reference frame on construction; callers
/// then open the state frame and push attribute names and values in
/// order. Container openers (`begin_list`, `begin_map`, `begin_instance`)
/// take the element count up front and the caller must push exactly that
/// many items.
#[derive(Debug)]
pub struct RecordBuilder {
    buf: Vec<u8>,
}

impl RecordBuilder {
    /// Start a record for an instance of `class`.
    pub fn new(class: &ClassRef) -> RecordResult<Self> {
        let mut builder = Self {
            buf: Vec::with_capacity(64),
        };
        builder.buf.push(Opcode::Class.byte());
        builder.class_names(class)?;
        Ok(builder)
    }

    /// Open the attribute-state frame.
    pub fn begin_state(&mut self, attr_count: usize) {
        self.buf.push(Opcode::State.byte());
        encode_varint(&mut self.buf, attr_count as u64);
    }

    /// Push an attribute name or map key.
    pub fn name(&mut self, name: &str) -> RecordResult<()> {
        if name.len() > MAX_NAME_LEN {
            return Err(RecordError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        self.raw_str(name);
        Ok(())
    }

    pub fn none(&mut self) {
        self.buf.push(Opcode::None.byte());
    }

    pub fn bool(&mut self, value: bool) {
        let op = if value { Opcode::True } else { Opcode::False };
        self.buf.push(op.byte());
    }

    pub fn int(&mut self, value: i64) {
        self.buf.push(Opcode::Int.byte());
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn float(&mut self, value: f64) {
        self.buf.push(Opcode::Float.byte());
        self.buf.extend_from_slice(&value.to_bits().to_be_bytes());
    }

    pub fn text(&mut self, value: &str) {
        self.buf.push(Opcode::Str.byte());
        self.raw_str(value);
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.buf.push(Opcode::Bytes.byte());
        encode_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    pub fn begin_list(&mut self, len: usize) {
        self.buf.push(Opcode::List.byte());
        encode_varint(&mut self.buf, len as u64);
    }

    /// Open a map; follow with `len` pairs of [`name`](Self::name) + value.
    pub fn begin_map(&mut self, len: usize) {
        self.buf.push(Opcode::Map.byte());
        encode_varint(&mut self.buf, len as u64);
    }

    /// Reference to a persistent object. Only the OID is written.
    pub fn persistent_ref(&mut self, oid: Oid) {
        self.buf.push(Opcode::PersistentRef.byte());
        self.buf.extend_from_slice(&oid.to_bytes());
    }

    /// A class used as a value. Only the symbolic name is written.
    pub fn class_literal(&mut self, class: &ClassRef) -> RecordResult<()> {
        self.buf.push(Opcode::ClassLiteral.byte());
        self.class_names(class)
    }

    /// Open an inline instance; follow with `attr_count` name + value pairs.
    pub fn begin_instance(&mut self, class: &ClassRef, attr_count: usize) -> RecordResult<()> {
        self.buf.push(Opcode::Instance.byte());
        self.class_names(class)?;
        encode_varint(&mut self.buf, attr_count as u64);
        Ok(())
    }

    /// Bytes written so far, excluding the terminator.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written. A builder always holds at
    /// least its class frame, so this is `false` in practice.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Terminate the record and return its bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(Opcode::End.byte());
        self.buf
    }

    fn class_names(&mut self, class: &ClassRef) -> RecordResult<()> {
        if class.name.is_empty() {
            return Err(RecordError::EmptyClassName);
        }
        self.name(&class.module)?;
        self.name(&class.name)
    }

    fn raw_str(&mut self, value: &str) {
        encode_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
    }
}
