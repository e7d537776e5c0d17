//! Compact GUID codec: 128-bit identifiers as 22-character URL-safe strings.
//!
//! The 16 bytes of a [`Uuid`] (in `as_bytes` order) are base64-encoded with the
//! URL-safe alphabet (`-` and `_` in place of `+` and `/`) and the two padding
//! characters dropped:
//!
//! ```text
//! 00000000-0000-0000-0000-000000000000  ->  AAAAAAAAAAAAAAAAAAAAAA
//! ```

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

use crate::error::AppError;

/// Length of every compact string.
pub const COMPACT_LEN: usize = 22;

const UUID_LEN: usize = 16;

/// Encode an identifier as its 22-character compact form.
pub fn encode(id: &Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

/// Decode a compact string back into an identifier.
///
/// Fails with [`AppError::Format`] on a wrong length, characters outside
/// `[A-Za-z0-9-_]`, or a final character with non-zero trailing bits (which
/// would let two strings map to the same identifier).
pub fn decode(s: &str) -> Result<Uuid, AppError> {
    if s.len() != COMPACT_LEN {
        return Err(AppError::Format(format!(
            "compact guid must be {COMPACT_LEN} characters, got {}",
            s.len()
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| AppError::Format(format!("invalid compact guid '{s}': {e}")))?;

    let bytes: [u8; UUID_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
        AppError::Format(format!(
            "compact guid '{s}' decoded to {} bytes, expected {UUID_LEN}",
            b.len()
        ))
    })?;

    Ok(Uuid::from_bytes(bytes))
}

/// A [`Uuid`] that displays, parses and serializes in compact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CompactGuid(Uuid);

impl CompactGuid {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for CompactGuid {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<CompactGuid> for Uuid {
    fn from(g: CompactGuid) -> Self {
        g.0
    }
}

impl fmt::Display for CompactGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl FromStr for CompactGuid {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s).map(Self)
    }
}

impl serde::Serialize for CompactGuid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(&self.0))
    }
}

impl<'de> serde::Deserialize<'de> for CompactGuid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
