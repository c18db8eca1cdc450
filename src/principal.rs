//! Principals: opaque byte identifiers with a checksummed textual form.
//!
//! Text form = lowercase base32 (RFC 4648, no padding) of `CRC32_BE(bytes) || bytes`,
//! split into dash-separated groups of five characters.

use core::fmt;
use core::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::PrincipalError;

/// Longest principal the remote service issues.
pub const MAX_PRINCIPAL_LEN: usize = 29;

const CRC_LEN: usize = 4;
const GROUP_LEN: usize = 5;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// The anonymous principal, `2vxsx-fae`.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(vec![0x04])
    }

    /// Wrap raw bytes.
    ///
    /// # Errors
    /// Returns `PrincipalError::TooLong` above [`MAX_PRINCIPAL_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrincipalError> {
        if bytes.len() > MAX_PRINCIPAL_LEN {
            return Err(PrincipalError::TooLong { len: bytes.len() });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// For compile-time constants known to fit.
    pub(crate) fn from_known(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= MAX_PRINCIPAL_LEN);
        Self(bytes.to_vec())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Parse the dash-grouped textual form, validating the checksum.
    ///
    /// # Errors
    /// Returns `PrincipalError` on bad base32, a short or long payload, a checksum mismatch,
    /// or text that is not in canonical grouping.
    pub fn from_text(text: &str) -> Result<Self, PrincipalError> {
        let compact: String = text.chars().filter(|c| *c != '-').collect();
        let decoded = BASE32_NOPAD
            .decode(compact.to_ascii_uppercase().as_bytes())
            .map_err(|_| PrincipalError::InvalidBase32)?;
        if decoded.len() < CRC_LEN {
            return Err(PrincipalError::TooShort);
        }
        let (crc, bytes) = decoded.split_at(CRC_LEN);
        let principal = Self::from_slice(bytes)?;
        if crc != crc32fast::hash(bytes).to_be_bytes() {
            return Err(PrincipalError::ChecksumMismatch);
        }
        if principal.to_text() != text {
            return Err(PrincipalError::NotCanonical(text.to_owned()));
        }
        Ok(principal)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let mut payload = Vec::with_capacity(CRC_LEN + self.0.len());
        payload.extend_from_slice(&crc32fast::hash(&self.0).to_be_bytes());
        payload.extend_from_slice(&self.0);
        let encoded = BASE32_NOPAD.encode(&payload).to_ascii_lowercase();

        let mut out = String::with_capacity(encoded.len() + encoded.len() / GROUP_LEN);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % GROUP_LEN == 0 {
                out.push('-');
            }
            out.push(c);
        }
        out
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl TryFrom<&[u8]> for Principal {
    type Error = PrincipalError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}
