//! Reusable per-round scratch buffers.
//!
//! Every training round needs a histogram sized to its term. Rather than
//! allocating one per round, a [`TrainCache`] keeps the backing buffer alive
//! and reshapes it; the buffer only ever grows. One cache belongs to exactly
//! one thread - the core shares nothing and takes no locks, so an outer
//! driver parallelizes by giving each worker thread its own cache.

use crate::data::Term;
use crate::error::Result;
use crate::training::histogram::Histogram;

/// Thread-local scratch for histogram-based training rounds.
#[derive(Debug, Default)]
pub struct TrainCache {
    pub(crate) hist: Histogram,
    /// Pre-transform snapshot, kept for debug-build query verification only.
    pub(crate) raw: Histogram,
}

impl TrainCache {
    /// A cache with no storage yet; buffers grow on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reshape the histogram for the coming round.
    pub(crate) fn prepare(&mut self, term: &Term, vlen: usize, has_hessians: bool) -> Result<()> {
        self.hist.reshape(term, vlen, has_hessians)
    }

    /// Record the pre-transform state for debug verification of range-sum
    /// queries. Does nothing in release builds.
    pub(crate) fn snapshot(&mut self) {
        if cfg!(debug_assertions) {
            self.raw.clone_from(&self.hist);
        }
    }
}
