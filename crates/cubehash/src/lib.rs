#![forbid(unsafe_code)]
#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(not(feature = "std"), no_std)]

//! CubeHash160+16/32+160-256.
//!
//! Bernstein's CubeHash with 16 rounds per 32-byte message block, 160 initialization
//! rounds, 160 finalization rounds and a 256-bit digest. The state is 32 little-endian
//! 32-bit words (128 bytes). The round function has no data-dependent branches.
//!
//! ```
//! let digest = cubehash::hash(b"Hello");
//! assert_eq!(digest[..4], [0xe7, 0x12, 0x13, 0x9e]);
//! ```

/// Digest length in bytes.
pub const HASH_BYTES: usize = 32;

/// Message block length in bytes.
pub const BLOCK_BYTES: usize = 32;

/// Rounds applied per block.
pub const ROUNDS: u32 = 16;

/// Number of blank transforms run at initialization and at finalization.
const BLANK_TRANSFORMS: usize = 10;

const STATE_WORDS: usize = 32;

/// State after running the blank initialization transforms over
/// `[HASH_BYTES, BLOCK_BYTES, ROUNDS, 0, ...]`.
const IV: [u32; STATE_WORDS] = [
    0xea2b_d4b4, 0xccd6_f29f, 0x6311_7e71, 0x3548_1eae, 0x2251_2d5b, 0xe5d9_4e63, 0x7e62_4131,
    0xf4cc_12be, 0xc2d0_b696, 0x42af_2070, 0xd072_0c35, 0x3361_da8c, 0x28cc_eca4, 0x8ef8_ad83,
    0x4680_ac00, 0x40e5_fbab, 0xd890_41c3, 0x6107_fbd5, 0x6c85_9d41, 0xf0b2_6679, 0x0939_2549,
    0x5fa2_5603, 0x65c8_92fd, 0x93cb_6285, 0x2af2_b5ae, 0x9e4b_4e60, 0x774a_bfdd, 0x8525_4725,
    0x1581_5aeb, 0x4ab6_aad6, 0x9cda_f8af, 0xd603_2c0a,
];

/// One CubeHash transform: `ROUNDS` applications of the round function.
#[inline]
#[allow(clippy::needless_range_loop)]
fn transform(x: &mut [u32; STATE_WORDS]) {
    let mut y = [0u32; 16];
    for _ in 0..ROUNDS {
        for i in 0..16 {
            x[i + 16] = x[i + 16].wrapping_add(x[i]);
        }
        for i in 0..16 {
            y[i ^ 8] = x[i];
        }
        for i in 0..16 {
            x[i] = y[i].rotate_left(7);
        }
        for i in 0..16 {
            x[i] ^= x[i + 16];
        }
        for i in 0..16 {
            y[i ^ 2] = x[i + 16];
        }
        x[16..].copy_from_slice(&y);
        for i in 0..16 {
            x[i + 16] = x[i + 16].wrapping_add(x[i]);
        }
        for i in 0..16 {
            y[i ^ 4] = x[i];
        }
        for i in 0..16 {
            x[i] = y[i].rotate_left(11);
        }
        for i in 0..16 {
            x[i] ^= x[i + 16];
        }
        for i in 0..16 {
            y[i ^ 1] = x[i + 16];
        }
        x[16..].copy_from_slice(&y);
    }
}

/// Incremental CubeHash state.
#[derive(Clone)]
pub struct CubeHash {
    state: [u32; STATE_WORDS],
    pos: usize,
}

impl Default for CubeHash {
    fn default() -> Self {
        Self::new()
    }
}

impl CubeHash {
    /// Fresh state, already past the blank initialization rounds.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: IV, pos: 0 }
    }

    /// Absorb `data`. Full blocks are transformed as soon as they fill up.
    pub fn update(&mut self, data: &[u8]) {
        for &b in data {
            self.state[self.pos / 4] ^= u32::from(b) << (8 * (self.pos % 4));
            self.pos += 1;
            if self.pos == BLOCK_BYTES {
                transform(&mut self.state);
                self.pos = 0;
            }
        }
    }

    /// Pad with a single `0x80` byte, flip the finalization bit and squeeze the digest.
    #[must_use]
    pub fn finalize(mut self) -> [u8; HASH_BYTES] {
        self.state[self.pos / 4] ^= 0x80u32 << (8 * (self.pos % 4));
        transform(&mut self.state);
        self.state[31] ^= 1;
        for _ in 0..BLANK_TRANSFORMS {
            transform(&mut self.state);
        }

        let mut out = [0u8; HASH_BYTES];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// One-shot CubeHash of `data`.
#[must_use]
pub fn hash(data: &[u8]) -> [u8; HASH_BYTES] {
    let mut h = CubeHash::new();
    h.update(data);
    h.finalize()
}
