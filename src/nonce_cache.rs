use core::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::types::{ProofOfWork, Timestamp};

/// Proof-of-work tokens already spent, so each is accepted at most once.
///
/// Entries leave the cache only through [`NonceCache::prune_expired`], oldest timestamp first.
#[derive(Debug, Default)]
pub struct NonceCache {
    seen: HashSet<ProofOfWork>,
    by_age: BinaryHeap<Reverse<(Timestamp, u64)>>,
}

impl NonceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token. Returns `false` if it was already present.
    pub fn add(&mut self, pow: ProofOfWork) -> bool {
        let fresh = self.seen.insert(pow);
        if fresh {
            self.by_age.push(Reverse((pow.timestamp, pow.nonce)));
        }
        fresh
    }

    #[must_use]
    pub fn contains(&self, pow: &ProofOfWork) -> bool {
        self.seen.contains(pow)
    }

    /// Drop every token whose timestamp is at or before `expiry`.
    pub fn prune_expired(&mut self, expiry: Timestamp) {
        while let Some(Reverse((timestamp, nonce))) = self.by_age.peek().copied() {
            if timestamp > expiry {
                break;
            }
            self.by_age.pop();
            self.seen.remove(&ProofOfWork { timestamp, nonce });
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
