//! Representation-independent hashing of structured values.
//!
//! Maps hash as SHA-256 over the sorted `H(key) || H(value)` pairs. Strings and byte blobs
//! hash their raw bytes, integers their unsigned LEB128 encoding, arrays the concatenation
//! of their element hashes.

use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value<'a> {
    Bytes(&'a [u8]),
    String(&'a str),
    U64(u64),
    Array(Vec<Value<'a>>),
}

#[must_use]
pub fn hash_bytes(value: impl AsRef<[u8]>) -> Hash {
    Sha256::digest(value.as_ref()).into()
}

#[must_use]
pub fn hash_string(value: &str) -> Hash {
    hash_bytes(value.as_bytes())
}

/// Unsigned LEB128; a u64 needs at most ten bytes.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn leb128(mut n: u64) -> ([u8; 10], usize) {
    let mut buf = [0u8; 10];
    let mut i = 0;
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            buf[i] = byte;
            return (buf, i + 1);
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

#[must_use]
pub fn hash_u64(value: u64) -> Hash {
    let (buf, len) = leb128(value);
    hash_bytes(&buf[..len])
}

#[must_use]
pub fn hash_array(elements: &[Value<'_>]) -> Hash {
    let mut hasher = Sha256::new();
    for e in elements {
        hasher.update(hash_value(e));
    }
    hasher.finalize().into()
}

#[must_use]
pub fn hash_value(value: &Value<'_>) -> Hash {
    match value {
        Value::Bytes(b) => hash_bytes(b),
        Value::String(s) => hash_string(s),
        Value::U64(n) => hash_u64(*n),
        Value::Array(elements) => hash_array(elements),
    }
}

fn hash_key_value(key: &str, value: &Value<'_>) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&hash_string(key));
    out[32..].copy_from_slice(&hash_value(value));
    out
}

/// Order of `fields` does not matter.
#[must_use]
pub fn hash_of_map(fields: &[(&str, Value<'_>)]) -> Hash {
    let mut pairs: Vec<[u8; 64]> = fields
        .iter()
        .map(|(k, v)| hash_key_value(k, v))
        .collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    for p in &pairs {
        hasher.update(p);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn key_value_reference() {
        assert_eq!(
            hash_key_value("request_type", &Value::String("call")),
            hex!(
                "769e6f87bdda39c859642b74ce9763cdd37cb1cd672733e8c54efaa33ab78af9
                 7edb360f06acaef2cc80dba16cf563f199d347db4443da04da0c8173e3f9e4ed"
            )
        );
    }

    #[test]
    fn u64_reference() {
        assert_eq!(
            hash_u64(0),
            hex!("6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d")
        );
        assert_eq!(
            hash_u64(1234),
            hex!("8b37fd3ebbe6396a89ed8563dd0cc55927ac90138950460c77cffeb55cf63810")
        );
        assert_eq!(
            hash_u64(u64::MAX),
            hex!("51672ea45f3539654bf9193f4ff763d90022eee7df5f5b76353d6f11a9eaccec")
        );
    }

    #[test]
    fn leb128_encoding() {
        assert_eq!(leb128(0), ([0; 10], 1));
        let (buf, len) = leb128(1234);
        assert_eq!(&buf[..len], &[0xd2, 0x09]);
        let (buf, len) = leb128(u64::MAX);
        assert_eq!(len, 10);
        assert_eq!(buf[9], 0x01);
    }

    #[test]
    fn map_hash_ignores_field_order() {
        let a = [("a", Value::U64(1)), ("b", Value::String("x"))];
        let b = [("b", Value::String("x")), ("a", Value::U64(1))];
        assert_eq!(hash_of_map(&a), hash_of_map(&b));
        assert_ne!(hash_of_map(&a), hash_of_map(&a[..1]));
    }

    #[test]
    fn array_hash_is_hash_of_element_hashes() {
        let elems = [Value::Bytes(b"x"), Value::U64(2)];
        let mut concat = Vec::new();
        concat.extend_from_slice(&hash_bytes(b"x"));
        concat.extend_from_slice(&hash_u64(2));
        assert_eq!(hash_array(&elems), hash_bytes(&concat));
    }
}
