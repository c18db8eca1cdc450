//! Hierarchical deterministic Ed25519 keys (SLIP-0010, hardened only).
//!
//! Every path element is OR-ed with [`HARDENED`] before use, so `[44, 223, 0, 0, 0]`
//! means m/44'/223'/0'/0'/0'. The engine never signs anything; it hands out
//! [`KeyPair`]s to whoever does.

use core::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use rand_core::OsRng;
use sha2::Sha512;

use crate::ser::{be32, ed25519_der};
use crate::types::PublicKey;

type HmacSha512 = Hmac<Sha512>;

pub const HARDENED: u32 = 0x8000_0000;

/// HMAC key for the master key derivation.
pub const MASTER_KEY_DOMAIN: &[u8] = b"ed25519 seed";

pub const KEY_BYTES: usize = 32;

#[allow(clippy::missing_panics_doc)]
fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> ([u8; KEY_BYTES], [u8; KEY_BYTES]) {
    let Ok(mut mac) = HmacSha512::new_from_slice(key) else {
        unreachable!("HMAC takes keys of any length")
    };
    for p in parts {
        mac.update(p);
    }
    let digest = mac.finalize().into_bytes();
    let mut il = [0u8; KEY_BYTES];
    let mut ir = [0u8; KEY_BYTES];
    il.copy_from_slice(&digest[..KEY_BYTES]);
    ir.copy_from_slice(&digest[KEY_BYTES..]);
    (il, ir)
}

/// A node of the derivation tree: private key material plus chain code.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    pub key: [u8; KEY_BYTES],
    pub chain_code: [u8; KEY_BYTES],
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExtendedKey(..)")
    }
}

/// (key, chain code) = split(HMAC-SHA512("ed25519 seed", seed))
#[must_use]
pub fn master_key(seed: &[u8]) -> ExtendedKey {
    let (key, chain_code) = hmac_sha512(MASTER_KEY_DOMAIN, &[seed]);
    ExtendedKey { key, chain_code }
}

/// (key, chain code) = split(HMAC-SHA512(chain code, 0x00 || key || BE32(index | 2^31)))
#[must_use]
pub fn derive_child(parent: &ExtendedKey, index: u32) -> ExtendedKey {
    let (key, chain_code) = hmac_sha512(
        &parent.chain_code,
        &[&[0x00], &parent.key, &be32(index | HARDENED)],
    );
    ExtendedKey { key, chain_code }
}

/// Fold [`derive_child`] over `path` starting at the master key.
#[must_use]
pub fn derive_extended(seed: &[u8], path: &[u32]) -> ExtendedKey {
    path.iter()
        .fold(master_key(seed), |node, &index| derive_child(&node, index))
}

/// Derive the Ed25519 key pair at `path` below `seed`. The empty path yields the master key.
#[must_use]
pub fn derive(seed: &[u8], path: &[u32]) -> KeyPair {
    KeyPair::from_seed(&derive_extended(seed, path).key)
}

/// Ed25519 key pair produced by the derivation engine.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Expand a 32-byte Ed25519 seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; KEY_BYTES]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// A fresh key from the operating system's RNG, for devices that are not derived.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// The 32-byte private seed.
    #[must_use]
    pub fn secret_bytes(&self) -> [u8; KEY_BYTES] {
        self.signing.to_bytes()
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; KEY_BYTES] {
        self.signing.verifying_key().to_bytes()
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// RFC 8410 DER encoding of the public key, the form devices are registered with.
    #[must_use]
    pub fn public_key_der(&self) -> PublicKey {
        PublicKey(ed25519_der(&self.public_key()))
    }

    /// Hand the key to a signer.
    #[must_use]
    pub const fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.signing.to_bytes() == other.signing.to_bytes()
    }
}

impl Eq for KeyPair {}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_der())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "mnemonic")]
mod mnemonic {
    use pbkdf2::pbkdf2_hmac;
    use sha2::Sha512;
    use unicode_normalization::UnicodeNormalization;

    use super::{derive, KeyPair};

    pub const SEED_BYTES: usize = 64;
    const PBKDF2_ROUNDS: u32 = 2048;
    const SALT_PREFIX: &str = "mnemonic";

    /// BIP-39 phrase to seed, skipping the wordlist and checksum checks.
    ///
    /// Any string, including the empty string, yields a seed.
    #[must_use]
    pub fn seed_from_mnemonic_without_validation(phrase: &str) -> [u8; SEED_BYTES] {
        let password: String = phrase.nfkd().collect();
        let salt: String = SALT_PREFIX.nfkd().collect();
        let mut seed = [0u8; SEED_BYTES];
        pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut seed);
        seed
    }

    /// Derive the key pair at `path` from a recovery phrase without validating it.
    ///
    /// A phrase that is not a valid BIP-39 mnemonic still yields a (different) key pair;
    /// callers that need validation do it before calling this.
    #[must_use]
    pub fn from_mnemonic_without_validation(phrase: &str, path: &[u32]) -> KeyPair {
        derive(&seed_from_mnemonic_without_validation(phrase), path)
    }
}

#[cfg(feature = "mnemonic")]
pub use mnemonic::{from_mnemonic_without_validation, seed_from_mnemonic_without_validation, SEED_BYTES};
