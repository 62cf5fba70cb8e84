use persist_types::{ClassRef, Oid, OID_LEN};

use crate::error::{RecordError, RecordResult};
use crate::format::{decode_varint, Opcode, ValueOpcode, MAX_NAME_LEN};

/// Forward-only reader over record bytes.
///
/// Every read is bounds-checked and reports the absolute offset of the item
/// that failed. Nothing here interprets class names: they come back as text.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Build a `Malformed` error at `offset`.
    pub fn malformed(&self, offset: usize, reason: impl Into<String>) -> RecordError {
        RecordError::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    pub fn read_u8(&mut self) -> RecordResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| self.malformed(self.pos, "unexpected end of record"))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read any known opcode.
    pub fn read_opcode(&mut self) -> RecordResult<Opcode> {
        let at = self.pos;
        let byte = self.read_u8()?;
        Opcode::from_byte(byte).ok_or_else(|| self.malformed(at, format!("unknown opcode 0x{byte:02x}")))
    }

    /// Read an opcode that must start a value.
    pub fn read_value_opcode(&mut self) -> RecordResult<ValueOpcode> {
        let at = self.pos;
        let op = self.read_opcode()?;
        op.as_value()
            .ok_or_else(|| self.malformed(at, format!("{} where a value was expected", op.name())))
    }

    /// Read one opcode and require it to be `expected`.
    pub fn expect(&mut self, expected: Opcode) -> RecordResult<()> {
        let at = self.pos;
        let byte = self.read_u8()?;
        if byte != expected.byte() {
            return Err(self.malformed(
                at,
                format!("expected {} marker, found 0x{byte:02x}", expected.name()),
            ));
        }
        Ok(())
    }

    pub fn read_varint(&mut self) -> RecordResult<u64> {
        let (value, consumed) = decode_varint(&self.data[self.pos..], self.pos)?;
        self.pos += consumed;
        Ok(value)
    }

    /// Read an element count. Counts are not trusted for preallocation.
    pub fn read_count(&mut self) -> RecordResult<u64> {
        self.read_varint()
    }

    pub fn read_bytes(&mut self, len: usize) -> RecordResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.malformed(
                self.pos,
                format!("truncated: need {len} bytes, have {}", self.remaining()),
            ));
        }
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a length-prefixed byte string of any size.
    pub fn read_blob(&mut self) -> RecordResult<&'a [u8]> {
        let at = self.pos;
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| self.malformed(at, "length overflows usize"))?;
        self.read_bytes(len)
    }

    /// Read length-prefixed UTF-8 text of any size.
    pub fn read_text(&mut self) -> RecordResult<&'a str> {
        let at = self.pos;
        let bytes = self.read_blob()?;
        std::str::from_utf8(bytes).map_err(|_| self.malformed(at, "text is not valid UTF-8"))
    }

    /// Read a class, attribute, or key name (bounded by [`MAX_NAME_LEN`]).
    pub fn read_name(&mut self) -> RecordResult<&'a str> {
        let at = self.pos;
        let len = self.read_varint()?;
        if len > MAX_NAME_LEN as u64 {
            return Err(self.malformed(at, format!("name length {len} exceeds {MAX_NAME_LEN}")));
        }
        let bytes = self.read_bytes(len as usize)?;
        std::str::from_utf8(bytes).map_err(|_| self.malformed(at, "name is not valid UTF-8"))
    }

    /// Read a module path + class name pair.
    pub fn read_class(&mut self) -> RecordResult<ClassRef> {
        let module = self.read_name()?;
        let at = self.pos;
        let name = self.read_name()?;
        if name.is_empty() {
            return Err(self.malformed(at, "empty class name"));
        }
        Ok(ClassRef::new(module, name))
    }

    pub fn read_fixed8(&mut self) -> RecordResult<[u8; 8]> {
        let bytes = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    pub fn read_oid(&mut self) -> RecordResult<Oid> {
        let bytes = self.read_bytes(OID_LEN)?;
        let at = self.pos - OID_LEN;
        Oid::from_bytes(bytes).map_err(|e| self.malformed(at, e.to_string()))
    }

    /// Consume the `END` marker and require that nothing follows it.
    pub fn finish(mut self) -> RecordResult<()> {
        self.expect(Opcode::End)?;
        if !self.is_at_end() {
            return Err(self.malformed(
                self.pos,
                format!("{} trailing bytes after END", self.remaining()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_name_and_class() {
        let data = [1, b'm', 1, b'K'];
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_class().unwrap(), ClassRef::new("m", "K"));
        assert!(c.is_at_end());
    }

    #[test]
    fn truncated_name_reports_offset() {
        let data = [5, b'a', b'b'];
        let mut c = Cursor::new(&data);
        let err = c.read_name().unwrap_err();
        assert!(matches!(err, RecordError::Malformed { offset: 1, .. }));
    }

    #[test]
    fn invalid_utf8_name() {
        let data = [2, 0xff, 0xfe];
        let mut c = Cursor::new(&data);
        assert!(matches!(c.read_name(), Err(RecordError::Malformed { offset: 0, .. })));
    }

    #[test]
    fn oversized_name_length_rejected_before_reading() {
        let mut data = Vec::new();
        crate::format::encode_varint(&mut data, (MAX_NAME_LEN + 1) as u64);
        let mut c = Cursor::new(&data);
        let err = c.read_name().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn expect_mismatch() {
        let data = [b'X'];
        let mut c = Cursor::new(&data);
        let err = c.expect(Opcode::Class).unwrap_err();
        assert!(err.to_string().contains("expected CLASS marker"));
    }

    #[test]
    fn framing_opcode_is_not_a_value() {
        let data = [b'S'];
        let mut c = Cursor::new(&data);
        assert!(c.read_value_opcode().is_err());
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let c = Cursor::new(&[b'.', 0]);
        assert!(c.finish().is_err());
        let c = Cursor::new(&[b'.']);
        assert!(c.finish().is_ok());
    }

    #[test]
    fn read_oid_big_endian() {
        let data = [0, 0, 0, 1, 0, 0, 0, 0];
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_oid().unwrap(), Oid::new(1 << 32));
    }

    #[test]
    fn read_past_end() {
        let mut c = Cursor::new(&[]);
        assert!(c.read_u8().is_err());
        assert!(c.read_fixed8().is_err());
    }
}
