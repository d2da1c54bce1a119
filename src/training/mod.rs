//! The round-level training engine.
//!
//! One boosting round over a feature pair runs, in order:
//!
//! 1. [`build_histogram`] - bin bag-weighted residuals by tuple index
//! 2. [`fast_totals`] - rewrite the histogram into its corner-sum cube
//! 3. [`range_sum`] - read arbitrary sub-box sums while sweeping cuts
//! 4. [`train_pair`] - pick the best two-level split and emit its tensor
//!
//! [`score_interaction_pair`] reuses steps 1-3 to rank candidate pairs.
//! Scratch buffers come from a per-thread [`TrainCache`]; bags come from a
//! [`BagSampler`] or any other source of per-case multiplicities.

pub mod cache;
pub mod gain;
pub mod histogram;
pub mod interaction;
pub mod pair;
pub mod sampling;
pub mod totals;

pub use cache::TrainCache;
pub use gain::{region_prediction, region_score, totals_score};
pub use histogram::{build_histogram, Histogram, Totals};
pub use interaction::score_interaction_pair;
pub use pair::{train_pair, PairOutcome};
pub use sampling::BagSampler;
pub use totals::{fast_totals, range_sum};
