//! glassboost: the training core of an explainable boosting machine.
//!
//! An explainable boosting machine is a gradient-boosted additive model over
//! low-cardinality categorical features. Each boosted round fits a shallow
//! piecewise-constant tensor to the current residuals for a single feature or
//! a pair of features, and superposes that tensor onto the long-lived model.
//!
//! This crate provides the round-level machinery:
//!
//! - [`data`] - bit-packed per-term input storage over pre-discretized cases
//! - [`training`] - bucket histograms, the in-place fast-totals (prefix-sum
//!   cube) transform, inclusion-exclusion range-sum queries, and the greedy
//!   two-level pair splitter
//! - [`model`] - the segmented tensor: per-axis cut positions plus a dense
//!   value grid, with in-place superposition and expansion
//!
//! The core is single-threaded and never blocks; callers parallelize by
//! running independent rounds on independent sampling sets, each with its own
//! [`training::TrainCache`].

pub mod data;
pub mod error;
pub mod model;
pub mod testing;
pub mod training;

pub use error::CoreError;
pub use model::SegmentedTensor;
