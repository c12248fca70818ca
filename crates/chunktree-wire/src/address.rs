use std::fmt;
use std::str::FromStr;

use crate::error::WireError;

/// Width of an address in bytes.
pub const ADDRESS_SIZE: usize = 32;

/// Content address of a chunk: the BLAKE3 hash of its wire encoding.
///
/// Addresses are the only handle used to store and fetch chunks. They
/// display as 64 lowercase hex characters and parse back from the same
/// form, which is what the CLI prints and accepts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Wrap raw hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build an address from a slice that must be exactly 32 bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidAddress`] if the slice has the wrong
    /// length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WireError> {
        let raw: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| WireError::InvalidAddress {
            reason: format!("expected {ADDRESS_SIZE} bytes, got {}", bytes.len()),
        })?;
        Ok(Self(raw))
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

/// Serialized as the lowercase hex string.
impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Address {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| WireError::InvalidAddress {
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }
}
