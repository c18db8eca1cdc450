//! SLIP-0010 Ed25519 test vector 1 (seed 000102030405060708090a0b0c0d0e0f).

use hex_literal::hex;
use idp_delegation::keys::{derive, derive_extended, master_key};

const SEED: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");

// (path, private key, public key); every index is hardened
const VECTORS: [(&[u32], [u8; 32], [u8; 32]); 6] = [
    (
        &[],
        hex!("2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"),
        hex!("a4b2856bfec510abab89753fac1ac0e1112364e7d250545963f135f2a33188ed"),
    ),
    (
        &[0],
        hex!("68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"),
        hex!("8c8a13df77a28f3445213a0f432fde644acaa215fc72dcdf300d5efaa85d350c"),
    ),
    (
        &[0, 1],
        hex!("b1d0bad404bf35da785a64ca1ac54b2617211d2777696fbffaf208f746ae84f2"),
        hex!("1932a5270f335bed617d5b935c80aedb1a35bd9fc1e31acafd5372c30f5c1187"),
    ),
    (
        &[0, 1, 2],
        hex!("92a5b23c0b8a99e37d07df3fb9966917f5d06e02ddbd909c7e184371463e9fc9"),
        hex!("ae98736566d30ed0e9d2f4486a64bc95740d89c7db33f52121f8ea8f76ff0fc1"),
    ),
    (
        &[0, 1, 2, 2],
        hex!("30d1dc7e5fc04c31219ab25a27ae00b50f6fd66622f6e9c913253d6511d1e662"),
        hex!("8abae2d66361c879b900d204ad2cc4984fa2aa344dd7ddc46007329ac76c429c"),
    ),
    (
        &[0, 1, 2, 2, 1_000_000_000],
        hex!("8f94d394a8e8fd6b1bc2f3f49f5c47e385281d5c17e65324b0f62483e37e8793"),
        hex!("3c24da049451555d51a7014a37337aa4e12d41e485abccfa46b47dfb2af54b7a"),
    ),
];

#[test]
fn slip10_vector_1() {
    for (path, private, public) in VECTORS {
        let kp = derive(&SEED, path);
        assert_eq!(kp.secret_bytes(), private, "private key at {path:?}");
        assert_eq!(kp.public_key(), public, "public key at {path:?}");
        assert_eq!(derive_extended(&SEED, path).key, private);
    }
}

#[test]
fn master_chain_code() {
    assert_eq!(
        master_key(&SEED).chain_code,
        hex!("90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb")
    );
}

#[test]
fn derivation_is_deterministic() {
    let a = derive(b"some seed material", &[44, 223, 0, 0, 0]);
    let b = derive(b"some seed material", &[44, 223, 0, 0, 0]);
    assert_eq!(a, b);
    assert_eq!(a.public_key_der().as_bytes().len(), 44);
}
