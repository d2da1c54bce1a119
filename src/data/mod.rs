//! Input-side data structures: features, terms, and packed per-term storage.
//!
//! All features are pre-discretized into a small integer alphabet before they
//! reach this crate. A [`Term`] groups one or more features into a single
//! tensorized axis set; [`PackedTermData`] stores each case's mixed-radix
//! tuple index for a term, bit-packed into `u64` words.

pub mod dataset;
pub mod feature;
pub mod packed;

pub use dataset::{BinMatrix, Gradients};
pub use feature::{Feature, Term, MAX_TERM_DIMENSIONS};
pub use packed::PackedTermData;
