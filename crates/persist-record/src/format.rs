//! Shared definitions of the record byte format.
//!
//! ```text
//! record      := class_frame state_frame END
//! class_frame := CLASS str(module) str(name)
//! state_frame := STATE varint(n) { str(attr) value }*n
//! ```
//!
//! Values are tagged by a single opcode byte. Persistent references carry
//! a fixed 8-byte big-endian OID under their own opcode, so reference bytes
//! can never be mistaken for literal byte-string content.

use crate::error::{RecordError, RecordResult};

/// Longest class, attribute, or key name accepted in a record.
pub const MAX_NAME_LEN: usize = 64 * 1024;

/// Deepest nesting of lists, maps, and inline instances accepted in a record.
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Opcode bytes of the record format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Class-reference frame at the head of every record.
    Class = b'C',
    /// Start of the attribute-state frame.
    State = b'S',
    /// Record terminator.
    End = b'.',
    None = b'N',
    False = b'F',
    True = b'T',
    /// Signed 64-bit integer, big-endian.
    Int = b'I',
    /// IEEE-754 double, big-endian bits.
    Float = b'R',
    /// UTF-8 text.
    Str = b'U',
    /// Raw byte string.
    Bytes = b'B',
    List = b'L',
    Map = b'D',
    /// Reference to another persistent object by OID.
    PersistentRef = b'P',
    /// A class used as a value (never instantiated).
    ClassLiteral = b'G',
    /// Inline non-persistent instance with its own class and state.
    Instance = b'O',
}

impl Opcode {
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Parse an opcode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            b'C' => Self::Class,
            b'S' => Self::State,
            b'.' => Self::End,
            b'N' => Self::None,
            b'F' => Self::False,
            b'T' => Self::True,
            b'I' => Self::Int,
            b'R' => Self::Float,
            b'U' => Self::Str,
            b'B' => Self::Bytes,
            b'L' => Self::List,
            b'D' => Self::Map,
            b'P' => Self::PersistentRef,
            b'G' => Self::ClassLiteral,
            b'O' => Self::Instance,
            _ => return None,
        };
        Some(op)
    }

    /// Human-readable opcode name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Class => "CLASS",
            Self::State => "STATE",
            Self::End => "END",
            Self::None => "NONE",
            Self::False => "FALSE",
            Self::True => "TRUE",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Str => "STR",
            Self::Bytes => "BYTES",
            Self::List => "LIST",
            Self::Map => "MAP",
            Self::PersistentRef => "PREF",
            Self::ClassLiteral => "CLASSREF",
            Self::Instance => "INSTANCE",
        }
    }

    /// The value form of this opcode, or `None` for framing opcodes.
    pub fn as_value(self) -> Option<ValueOpcode> {
        let op = match self {
            Self::Class | Self::State | Self::End => return None,
            Self::None => ValueOpcode::None,
            Self::False => ValueOpcode::False,
            Self::True => ValueOpcode::True,
            Self::Int => ValueOpcode::Int,
            Self::Float => ValueOpcode::Float,
            Self::Str => ValueOpcode::Str,
            Self::Bytes => ValueOpcode::Bytes,
            Self::List => ValueOpcode::List,
            Self::Map => ValueOpcode::Map,
            Self::PersistentRef => ValueOpcode::PersistentRef,
            Self::ClassLiteral => ValueOpcode::ClassLiteral,
            Self::Instance => ValueOpcode::Instance,
        };
        Some(op)
    }

    /// Returns `true` for opcodes that may start a value.
    pub fn is_value(self) -> bool {
        self.as_value().is_some()
    }
}

/// The opcodes that may start a value. Framing opcodes have no variant here,
/// so a match over a value needs no arm for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueOpcode {
    None,
    False,
    True,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Map,
    PersistentRef,
    ClassLiteral,
    Instance,
}

/// Encode a u64 as an unsigned LEB128 varint.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from the front of `data`. Returns (value, bytes_consumed).
///
/// `offset` is the absolute position of `data` in the record, used only for
/// error reporting.
pub(crate) fn decode_varint(data: &[u8], offset: usize) -> RecordResult<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift >= 64 || (shift == 63 && byte & 0x7F > 1) {
            return Err(RecordError::Malformed {
                offset,
                reason: "varint overflow".into(),
            });
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(RecordError::Malformed {
        offset,
        reason: "truncated varint".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn opcode_bytes_are_distinct() {
        let all = [
            Opcode::Class,
            Opcode::State,
            Opcode::End,
            Opcode::None,
            Opcode::False,
            Opcode::True,
            Opcode::Int,
            Opcode::Float,
            Opcode::Str,
            Opcode::Bytes,
            Opcode::List,
            Opcode::Map,
            Opcode::PersistentRef,
            Opcode::ClassLiteral,
            Opcode::Instance,
        ];
        let mut bytes: Vec<u8> = all.iter().map(|op| op.byte()).collect();
        bytes.sort();
        bytes.dedup();
        assert_eq!(bytes.len(), all.len());
        for op in all {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op));
        }
    }

    #[test]
    fn reference_tag_differs_from_bytes_tag() {
        assert_ne!(Opcode::PersistentRef.byte(), Opcode::Bytes.byte());
        assert_ne!(Opcode::ClassLiteral.byte(), Opcode::Class.byte());
    }

    #[test]
    fn unknown_opcode() {
        assert!(Opcode::from_byte(0).is_none());
        assert!(Opcode::from_byte(0xff).is_none());
        assert!(Opcode::from_byte(b'c').is_none());
    }

    #[test]
    fn framing_opcodes_are_not_values() {
        assert!(!Opcode::Class.is_value());
        assert!(!Opcode::End.is_value());
        assert!(Opcode::PersistentRef.is_value());
        assert_eq!(Opcode::State.as_value(), None);
        assert_eq!(Opcode::Instance.as_value(), Some(ValueOpcode::Instance));
    }

    #[test]
    fn varint_zero_is_one_byte() {
        let mut buf = Vec::new();
        encode_varint(&mut buf, 0);
        assert_eq!(buf, vec![0]);
        assert_eq!(decode_varint(&buf, 0).unwrap(), (0, 1));
    }

    #[test]
    fn varint_truncated() {
        let err = decode_varint(&[0x80], 5).unwrap_err();
        assert_eq!(
            err,
            RecordError::Malformed {
                offset: 5,
                reason: "truncated varint".into()
            }
        );
    }

    #[test]
    fn varint_overflow() {
        let data = [0xffu8; 11];
        assert!(matches!(
            decode_varint(&data, 0),
            Err(RecordError::Malformed { .. })
        ));
        let mut tenth_too_big = vec![0xffu8; 9];
        tenth_too_big.push(0x02);
        assert!(decode_varint(&tenth_too_big, 0).is_err());
    }

    proptest! {
        #[test]
        fn varint_roundtrip(value in any::<u64>()) {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            let (decoded, consumed) = decode_varint(&buf, 0).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(consumed, buf.len());
        }
    }
}
