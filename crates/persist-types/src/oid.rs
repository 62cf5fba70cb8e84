use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Width of an encoded OID in bytes.
pub const OID_LEN: usize = 8;

/// Object identifier for a persistent object.
///
/// An `Oid` is an opaque 64-bit value assigned by the storage backend. Its
/// canonical byte form is always exactly 8 bytes, most significant byte
/// first, so identifiers compare and exchange identically on every platform.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(u64);

impl Oid {
    /// The conventional root object identifier.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw 64-bit value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw 64-bit value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Fixed 8-byte big-endian representation.
    pub const fn to_bytes(self) -> [u8; OID_LEN] {
        self.0.to_be_bytes()
    }

    /// Decode from a byte slice that must be exactly 8 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; OID_LEN] = bytes
            .try_into()
            .map_err(|_| TypeError::MalformedIdentifier {
                actual: bytes.len(),
            })?;
        Ok(Self(u64::from_be_bytes(arr)))
    }

    /// Hex-encoded string of the 8 bytes (16 lowercase characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse from hex, with or without a `0x` prefix.
    ///
    /// Shorter inputs are left-padded, so `"0x2a"` parses as 42.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.is_empty() || s.len() > OID_LEN * 2 {
            return Err(TypeError::InvalidHex(format!(
                "expected 1..=16 hex digits, got {}",
                s.len()
            )));
        }
        let padded = format!("{s:0>16}");
        let bytes = hex::decode(padded).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the next identifier, or `None` at the top of the space.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid(0x{})", self.to_hex())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<u64> for Oid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Oid> for u64 {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl From<[u8; OID_LEN]> for Oid {
    fn from(bytes: [u8; OID_LEN]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl From<Oid> for [u8; OID_LEN] {
    fn from(oid: Oid) -> Self {
        oid.to_bytes()
    }
}

// ---------------------------------------------------------------------------
// Codec entry points
// ---------------------------------------------------------------------------

/// Encode a 64-bit integer as its 8-byte big-endian form.
pub fn encode(value: u64) -> [u8; OID_LEN] {
    Oid::new(value).to_bytes()
}

/// Decode an 8-byte big-endian string into a 64-bit integer.
///
/// Fails with [`TypeError::MalformedIdentifier`] for any other length.
pub fn decode(bytes: &[u8]) -> Result<u64, TypeError> {
    Oid::from_bytes(bytes).map(Oid::get)
}

/// Decode an 8-byte big-endian string, always yielding an unsigned value.
///
/// The high bit is part of the magnitude, never a sign, so identifiers at
/// or above 2^63 decode to the same value as through [`decode`].
pub fn decode_unsigned(bytes: &[u8]) -> Result<u64, TypeError> {
    decode(bytes)
}
