//! CubeHash proof-of-work attached to challenge creation.
//!
//! A token is valid when `cubehash(m)` starts with [`DIFFICULTY`] zero bytes, where `m` is
//! the message built by [`build_pow_message`]. The search is unbounded; callers that need to
//! abort it pass a [`CancellationToken`], which is polled every [`CANCEL_CHECK_INTERVAL`]
//! iterations.

use core::convert::Infallible;

use rand_core::{OsRng, RngCore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span};

use crate::errors::PowError;
use crate::principal::Principal;
use crate::ser::{build_pow_message, write_nonce};
use crate::types::{ProofOfWork, Timestamp};

/// Leading digest bytes that must be zero.
pub const DIFFICULTY: usize = 2;

pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Start nonces stay within 53 bits.
pub const START_NONCE_MASK: u64 = (1 << 53) - 1;

#[must_use]
pub fn random_start_nonce() -> u64 {
    OsRng.next_u64() & START_NONCE_MASK
}

#[inline]
#[must_use]
pub fn hash_ok(digest: &[u8], difficulty: usize) -> bool {
    digest.len() >= difficulty && digest[..difficulty].iter().all(|b| *b == 0)
}

/// Proof-of-work search at a fixed difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowSolver {
    difficulty: usize,
}

impl Default for PowSolver {
    fn default() -> Self {
        Self {
            difficulty: DIFFICULTY,
        }
    }
}

impl PowSolver {
    /// A solver with a non-default difficulty. Only the default is accepted by the service;
    /// lower values keep exhaustive property runs fast.
    #[must_use]
    pub const fn with_difficulty(difficulty: usize) -> Self {
        Self { difficulty }
    }

    #[must_use]
    pub const fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Search from a random 53-bit start nonce until a valid token is found.
    #[must_use]
    pub fn solve(&self, timestamp: Timestamp, service_id: &Principal) -> ProofOfWork {
        match self.search(timestamp, service_id, random_start_nonce(), |_| {
            Ok::<(), Infallible>(())
        }) {
            Ok(pow) => pow,
            Err(never) => match never {},
        }
    }

    /// Search upward from `start`, giving up once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `PowError::Cancelled` with the number of hashes tried when the token is
    /// cancelled before a solution is found.
    pub fn solve_from(
        &self,
        timestamp: Timestamp,
        service_id: &Principal,
        start: u64,
        cancel: &CancellationToken,
    ) -> Result<ProofOfWork, PowError> {
        self.search(timestamp, service_id, start, |iterations| {
            if cancel.is_cancelled() {
                Err(PowError::Cancelled { iterations })
            } else {
                Ok(())
            }
        })
    }

    /// Run [`Self::solve_from`] from a random start on the blocking pool so message handling
    /// on the runtime keeps going.
    ///
    /// # Errors
    ///
    /// `PowError::Cancelled` if `cancel` fires, `PowError::Worker` if the worker panicked.
    pub async fn solve_in_background(
        self,
        timestamp: Timestamp,
        service_id: Principal,
        cancel: CancellationToken,
    ) -> Result<ProofOfWork, PowError> {
        let start = random_start_nonce();
        tokio::task::spawn_blocking(move || self.solve_from(timestamp, &service_id, start, &cancel))
            .await
            .map_err(|e| PowError::Worker(e.to_string()))?
    }

    #[must_use]
    pub fn verify(&self, pow: &ProofOfWork, service_id: &Principal) -> bool {
        let message = build_pow_message(pow.timestamp, pow.nonce, service_id);
        hash_ok(&cubehash::hash(&message), self.difficulty)
    }

    fn search<E>(
        &self,
        timestamp: Timestamp,
        service_id: &Principal,
        start: u64,
        mut checkpoint: impl FnMut(u64) -> Result<(), E>,
    ) -> Result<ProofOfWork, E> {
        let span = info_span!("pow", service_id = %service_id, timestamp, difficulty = self.difficulty);
        let _enter = span.enter();
        debug!(start, "proof-of-work search started");

        let mut message = build_pow_message(timestamp, start, service_id);
        let mut nonce = start;
        let mut iterations: u64 = 0;
        loop {
            if hash_ok(&cubehash::hash(&message), self.difficulty) {
                info!(nonce, iterations, "proof-of-work found");
                return Ok(ProofOfWork { timestamp, nonce });
            }
            iterations += 1;
            if iterations % CANCEL_CHECK_INTERVAL == 0 {
                checkpoint(iterations).inspect_err(|_| {
                    info!(iterations, "proof-of-work search cancelled");
                })?;
            }
            nonce = nonce.wrapping_add(1);
            write_nonce(&mut message, nonce);
        }
    }
}

/// [`PowSolver::solve`] at the service difficulty.
#[must_use]
pub fn solve(timestamp: Timestamp, service_id: &Principal) -> ProofOfWork {
    PowSolver::default().solve(timestamp, service_id)
}

/// [`PowSolver::verify`] at the service difficulty.
#[must_use]
pub fn verify(pow: &ProofOfWork, service_id: &Principal) -> bool {
    PowSolver::default().verify(pow, service_id)
}

#[must_use]
pub fn verify_batch(tokens: &[ProofOfWork], service_id: &Principal) -> Vec<bool> {
    let solver = PowSolver::default();
    tokens.iter().map(|pow| solver.verify(pow, service_id)).collect()
}
