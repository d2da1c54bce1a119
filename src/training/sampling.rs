//! Bootstrap bag generation.
//!
//! Each boosting round trains against a sampling set: one non-negative
//! multiplicity per case. Bootstrap bags draw `n_cases` indices with
//! replacement; a flat bag gives every case weight one (used when sampling is
//! disabled). Seeds are explicit so repeated runs are reproducible.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Generates per-case multiplicities for boosting rounds.
#[derive(Debug, Clone)]
pub struct BagSampler {
    n_cases: usize,
}

impl BagSampler {
    /// A sampler over `n_cases` cases.
    pub fn new(n_cases: usize) -> Self {
        assert!(n_cases > 0, "cannot sample from an empty dataset");
        Self { n_cases }
    }

    /// Draw one bootstrap bag: `n_cases` draws with replacement, returned as
    /// occurrence counts.
    pub fn bootstrap(&self, seed: u64) -> Vec<u32> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut counts = vec![0u32; self.n_cases];
        for _ in 0..self.n_cases {
            counts[rng.gen_range(0..self.n_cases)] += 1;
        }
        debug_assert_eq!(counts.iter().map(|&c| c as usize).sum::<usize>(), self.n_cases);
        counts
    }

    /// The flat bag: every case once.
    pub fn flat(&self) -> Vec<u32> {
        vec![1; self.n_cases]
    }
}
