use core::fmt;

use serde::{Deserialize, Serialize};

use crate::principal::Principal;

/// Nanoseconds since the Unix epoch.
pub type Timestamp = u64;

/// Origin of the relying page, e.g. `https://app.example`.
pub type FrontendHostname = String;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Upper bound, and default, for a delegation's time to live: 30 days.
pub const MAX_TIME_TO_LIVE_NS: u64 = 30 * 24 * 60 * 60 * NANOS_PER_SEC;

/// Attempts made at `get_delegation` before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Linear backoff step between `get_delegation` attempts.
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 1_000;

/// Derivation path of the seed-phrase recovery key: m/44'/223'/0'/0'/0'.
pub const IC_DERIVATION_PATH: [u32; 5] = [44, 223, 0, 0, 0];

/// Server-side identifier of a registered identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Anchor(pub u64);

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Anchor {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// Encoded public key as exchanged with the remote service and the relying page.
/// Raw 32-byte Ed25519 keys and DER-wrapped keys are both carried verbatim.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<u8>> for PublicKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for PublicKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Public key of the short-lived session the relying page wants delegated to.
pub type SessionKey = PublicKey;

/// Ephemeral request carried by one handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegationRequest {
    pub session_key: SessionKey,
    pub max_time_to_live: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub pubkey: PublicKey,
    pub expiration: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<Principal>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDelegation {
    pub delegation: Delegation,
    pub signature: Vec<u8>,
}

/// Anti-spam token attached to challenge creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub timestamp: Timestamp,
    pub nonce: u64,
}

/// Human-verification puzzle handed out before registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub png_image: Vec<u8>,
    pub challenge_key: String,
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("png_image", &format_args!("<{} bytes>", self.png_image.len()))
            .field("challenge_key", &self.challenge_key)
            .finish()
    }
}

/// The user's answer to a [`Challenge`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResult {
    pub key: String,
    pub chars: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Unknown,
    Platform,
    CrossPlatform,
    SeedPhrase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Authentication,
    Recovery,
}

/// A device registered to an anchor. `pubkey` is DER-encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub alias: String,
    pub pubkey: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<Vec<u8>>,
    pub key_type: KeyType,
    pub purpose: Purpose,
}

impl DeviceData {
    #[must_use]
    pub fn is_recovery(&self) -> bool {
        self.purpose == Purpose::Recovery
    }

    #[must_use]
    pub fn wants_seed_phrase(&self) -> bool {
        self.key_type == KeyType::SeedPhrase
    }
}
