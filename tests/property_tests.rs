//! Property-based tests for derivation, proof-of-work and the spent-token cache

use idp_delegation::keys::{derive, derive_extended, master_key};
use idp_delegation::pow::{self, hash_ok};
use idp_delegation::ser::build_pow_message;
use idp_delegation::{NonceCache, PowSolver, Principal, ProofOfWork, DIFFICULTY};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

// At difficulty 1 a solution turns up every 256 hashes on average; missing one in this many
// is a 1-in-e^32 event.
const SEARCH_BOUND: u64 = 8192;

fn principal() -> impl Strategy<Value = Principal> {
    prop::collection::vec(any::<u8>(), 0..=29)
        .prop_map(|bytes| Principal::from_slice(&bytes).unwrap())
}

// Derivation is a pure function of seed and path
proptest! {
    #[test]
    fn derivation_deterministic(
        seed in prop::collection::vec(any::<u8>(), 16..=64),
        path in prop::collection::vec(any::<u32>(), 0..6),
    ) {
        prop_assert_eq!(derive(&seed, &path), derive(&seed, &path));
    }

    #[test]
    fn empty_path_is_master(seed in prop::collection::vec(any::<u8>(), 16..=64)) {
        let master = master_key(&seed);
        let derived = derive_extended(&seed, &[]);
        prop_assert_eq!(derived.key, master.key);
        prop_assert_eq!(derived.chain_code, master.chain_code);
    }

    // hardened indices: i and i | 2^31 name the same child
    #[test]
    fn hardened_bit_is_implied(
        seed in prop::collection::vec(any::<u8>(), 16..=64),
        index in 0u32..0x8000_0000,
    ) {
        prop_assert_eq!(derive(&seed, &[index]), derive(&seed, &[index | 0x8000_0000]));
    }
}

// Solver returns the first valid nonce at or after its start
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn solver_finds_first_solution(
        timestamp in any::<u64>(),
        start in any::<u64>(),
        id in principal(),
    ) {
        let solver = PowSolver::with_difficulty(1);
        let pow = solver
            .solve_from(timestamp, &id, start, &CancellationToken::new())
            .unwrap();

        prop_assert_eq!(pow.timestamp, timestamp);
        prop_assert!(solver.verify(&pow, &id));
        let steps = pow.nonce.wrapping_sub(start);
        prop_assert!(steps < SEARCH_BOUND, "{} hashes at difficulty 1", steps);
        for skipped in 0..steps {
            let candidate = ProofOfWork { timestamp, nonce: start.wrapping_add(skipped) };
            prop_assert!(!solver.verify(&candidate, &id));
        }
    }
}

// Service difficulty: the first two digest bytes are zero
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn solve_meets_service_difficulty(timestamp in any::<u64>(), id in principal()) {
        let proof = pow::solve(timestamp, &id);

        prop_assert_eq!(proof.timestamp, timestamp);
        let digest = cubehash::hash(&build_pow_message(timestamp, proof.nonce, &id));
        prop_assert_eq!(DIFFICULTY, 2);
        prop_assert!(hash_ok(&digest, DIFFICULTY));
        prop_assert_eq!(&digest[..2], &[0u8, 0][..]);
        prop_assert!(pow::verify(&proof, &id));
    }
}

proptest! {
    #[test]
    fn difficulty_counts_leading_zero_bytes(
        digest in prop::array::uniform32(any::<u8>()),
        difficulty in 0usize..=32,
    ) {
        let expected = digest[..difficulty].iter().all(|b| *b == 0);
        prop_assert_eq!(hash_ok(&digest, difficulty), expected);
    }

    #[test]
    fn streaming_matches_one_shot(
        data in prop::collection::vec(any::<u8>(), 0..300),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..5),
    ) {
        let mut points: Vec<usize> = cuts.iter().map(|c| c.index(data.len() + 1)).collect();
        points.sort_unstable();

        let mut hasher = cubehash::CubeHash::new();
        let mut from = 0;
        for to in points {
            hasher.update(&data[from..to]);
            from = to;
        }
        hasher.update(&data[from..]);
        prop_assert_eq!(hasher.finalize(), cubehash::hash(&data));
    }
}

// Spent-token cache: each token accepted once until its timestamp expires
proptest! {
    #[test]
    fn nonce_cache_accepts_each_token_once(
        tokens in prop::collection::vec((0u64..50, 0u64..50), 0..100),
        expiry in 0u64..50,
    ) {
        let mut cache = NonceCache::new();
        let mut distinct = std::collections::HashSet::new();
        for (timestamp, nonce) in &tokens {
            let pow = ProofOfWork { timestamp: *timestamp, nonce: *nonce };
            prop_assert_eq!(cache.add(pow), distinct.insert(pow));
            prop_assert!(cache.contains(&pow));
        }
        prop_assert_eq!(cache.len(), distinct.len());

        cache.prune_expired(expiry);
        for pow in &distinct {
            prop_assert_eq!(cache.contains(pow), pow.timestamp > expiry);
        }
        let survivors = distinct.iter().filter(|p| p.timestamp > expiry).count();
        prop_assert_eq!(cache.len(), survivors);
    }
}
