use crate::{principal::Principal, types::Timestamp};

/// Domain tag of the proof-of-work message.
pub const POW_DOMAIN: &[u8; 16] = b"ic-proof-of-work";

/// Byte offset of the nonce inside the proof-of-work message: tag length prefix, tag, timestamp.
pub const NONCE_OFFSET: usize = 1 + POW_DOMAIN.len() + 8;

/// `SubjectPublicKeyInfo` header for an Ed25519 key (RFC 8410).
pub const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

#[inline]
#[must_use]
pub const fn le64(x: u64) -> [u8; 8] {
    x.to_le_bytes()
}

#[inline]
#[must_use]
pub const fn be32(x: u32) -> [u8; 4] {
    x.to_be_bytes()
}

/// m = LEN(tag) || tag || LE64(timestamp) || LE64(nonce) || LEN(service_id) || `service_id`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn build_pow_message(timestamp: Timestamp, nonce: u64, service_id: &Principal) -> Vec<u8> {
    let id = service_id.as_slice();
    let mut v = Vec::with_capacity(NONCE_OFFSET + 8 + 1 + id.len());
    v.push(POW_DOMAIN.len() as u8);
    v.extend_from_slice(POW_DOMAIN);
    v.extend_from_slice(&le64(timestamp));
    v.extend_from_slice(&le64(nonce));
    // principals are at most 29 bytes
    v.push(id.len() as u8);
    v.extend_from_slice(id);
    v
}

/// Overwrite the nonce bytes of a message built by [`build_pow_message`].
#[inline]
pub fn write_nonce(message: &mut [u8], nonce: u64) {
    message[NONCE_OFFSET..NONCE_OFFSET + 8].copy_from_slice(&le64(nonce));
}

/// DER-encode a raw Ed25519 public key.
#[must_use]
pub fn ed25519_der(raw: &[u8; 32]) -> Vec<u8> {
    let mut v = Vec::with_capacity(ED25519_DER_PREFIX.len() + 32);
    v.extend_from_slice(&ED25519_DER_PREFIX);
    v.extend_from_slice(raw);
    v
}

/// Raw Ed25519 key bytes from either a 32-byte raw key or its DER encoding.
#[must_use]
pub fn ed25519_raw(encoded: &[u8]) -> Option<[u8; 32]> {
    let raw = match encoded.len() {
        32 => encoded,
        44 if encoded.starts_with(&ED25519_DER_PREFIX) => &encoded[ED25519_DER_PREFIX.len()..],
        _ => return None,
    };
    raw.try_into().ok()
}
