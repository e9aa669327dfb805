//! Deterministic per-trial seeding.
//!
//! A run is reproducible from one initial seed, yet every trial draws from
//! its own generator. Seed k+1 is the first draw of a generator seeded with
//! seed k (stream 0). Trial k draws its randomness from a generator seeded
//! with seed k on stream 1, so it never shares a stream with the chain.
//!
//! The chain is computed up front, which lets trials run in any order or in
//! parallel without changing the result.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Exclusive upper bound for chained seeds.
pub const MAX_RANDOM_SEED: u64 = u32::MAX as u64;

const CHAIN_STREAM: u64 = 0;
const TRIAL_STREAM: u64 = 1;

/// Precomputed seeds for every trial of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedChain {
    initial: u64,
    seeds: Vec<u64>,
}

impl SeedChain {
    /// Builds a chain of `n_trials` seeds starting from `initial`.
    #[must_use]
    pub fn new(initial: u64, n_trials: usize) -> Self {
        let mut seeds = Vec::with_capacity(n_trials);
        let mut seed = initial;
        for _ in 0..n_trials {
            seeds.push(seed);
            seed = next_seed(seed);
        }
        Self { initial, seeds }
    }

    /// Uses `seed` when given, otherwise an initial seed from OS entropy.
    #[must_use]
    pub fn resolve(seed: Option<u64>, n_trials: usize) -> Self {
        let initial = seed.unwrap_or_else(|| ChaCha8Rng::from_entropy().gen_range(0..MAX_RANDOM_SEED));
        Self::new(initial, n_trials)
    }

    /// The seed the chain started from; replaying it reproduces the run.
    #[must_use]
    pub fn initial_seed(&self) -> u64 {
        self.initial
    }

    #[must_use]
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Generator a trial draws from, given its chained seed.
    #[must_use]
    pub fn trial_rng(seed: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(TRIAL_STREAM);
        rng
    }
}

fn next_seed(seed: u64) -> u64 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(CHAIN_STREAM);
    rng.gen_range(0..MAX_RANDOM_SEED)
}
