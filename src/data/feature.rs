//! Features and feature terms.
//!
//! A [`Feature`] is one discretized column of the input matrix. A [`Term`] is
//! an ordered tuple of features trained together; pairs are the interesting
//! case, but the data layer supports anything up to [`MAX_TERM_DIMENSIONS`]
//! axes. The term owns the bit-packing geometry derived from its cell count,
//! so that packing and unpacking cannot disagree.

use crate::error::{CoreError, Result};

/// Width of the packed storage word. Fixed to `u64` on every platform so
/// that packed layouts and overflow limits are identical everywhere.
pub const WORD_BITS: usize = u64::BITS as usize;

/// Hard upper bound on the number of features in one term.
///
/// With at least two bins per feature, a 64th dimension would already
/// overflow the cell-count word; reserving the top bit also leaves headroom
/// for direction-vector manipulation in range-sum queries.
pub const MAX_TERM_DIMENSIONS: usize = WORD_BITS - 1;

// =============================================================================
// Feature
// =============================================================================

/// One pre-discretized input feature.
///
/// The axis alphabet is `{0, …, n_bins − 1}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feature {
    n_bins: usize,
    data_index: usize,
}

impl Feature {
    /// Create a feature with `n_bins` discrete states, reading its raw bins
    /// from column `data_index` of the input matrix.
    pub fn new(n_bins: usize, data_index: usize) -> Result<Self> {
        if n_bins < 2 {
            return Err(CoreError::InvalidInput("a feature needs at least 2 bins"));
        }
        Ok(Self { n_bins, data_index })
    }

    /// Number of discrete states.
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Column index inside the raw input matrix.
    #[inline]
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

// =============================================================================
// Term
// =============================================================================

/// An ordered tuple of features treated as a single tensorized axis set.
///
/// The term's cell count is the product of its features' bin counts; the
/// mixed-radix tuple index of a case is
/// `Σ_d bin_d · Π_{d' < d} n_bins_{d'}`, dimension 0 fastest. The product is
/// overflow-checked at construction time, before any buffer is ever sized
/// from it.
#[derive(Clone, Debug)]
pub struct Term {
    features: Vec<Feature>,
    n_cells: usize,
    bits_per_item: usize,
    items_per_word: usize,
}

impl Term {
    /// Build a term from its features.
    ///
    /// Fails with [`CoreError::SizeOverflow`] if the product of bin counts
    /// does not fit the storage word, and with [`CoreError::InvalidInput`]
    /// for an empty tuple or one longer than [`MAX_TERM_DIMENSIONS`].
    pub fn new(features: Vec<Feature>) -> Result<Self> {
        if features.is_empty() {
            return Err(CoreError::InvalidInput("a term needs at least one feature"));
        }
        if features.len() > MAX_TERM_DIMENSIONS {
            return Err(CoreError::InvalidInput("too many features in one term"));
        }

        let mut n_cells = 1usize;
        for feature in &features {
            n_cells = n_cells
                .checked_mul(feature.n_bins())
                .ok_or(CoreError::SizeOverflow)?;
        }

        // The tuple index ranges over 0..n_cells, so every slot must hold
        // n_cells - 1.
        let bits_per_item = bit_width(n_cells - 1).max(1);
        let items_per_word = (WORD_BITS / bits_per_item).max(1);

        Ok(Self { features, n_cells, bits_per_item, items_per_word })
    }

    /// Convenience constructor for the pair case.
    pub fn pair(a: Feature, b: Feature) -> Result<Self> {
        Self::new(vec![a, b])
    }

    /// Number of axes.
    #[inline]
    pub fn n_dims(&self) -> usize {
        self.features.len()
    }

    /// The features, in axis order (dimension 0 first).
    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Bin count of axis `dim`.
    #[inline]
    pub fn n_bins(&self, dim: usize) -> usize {
        self.features[dim].n_bins()
    }

    /// Total number of grid cells, `Π_d n_bins_d`.
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Bits occupied by one tuple index inside a storage word.
    #[inline]
    pub fn bits_per_item(&self) -> usize {
        self.bits_per_item
    }

    /// How many tuple indices fit in one storage word.
    #[inline]
    pub fn items_per_word(&self) -> usize {
        self.items_per_word
    }
}

#[inline]
fn bit_width(value: usize) -> usize {
    (usize::BITS - value.leading_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_rejects_degenerate_alphabet() {
        assert!(Feature::new(1, 0).is_err());
        assert!(Feature::new(2, 0).is_ok());
    }

    #[test]
    fn term_cell_count_is_product_of_bins() {
        let term = Term::pair(
            Feature::new(3, 0).unwrap(),
            Feature::new(5, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(term.n_cells(), 15);
        assert_eq!(term.n_dims(), 2);
    }

    #[test]
    fn term_packing_geometry() {
        // 15 cells -> 4 bits per item -> 16 items per 64-bit word.
        let term = Term::pair(
            Feature::new(3, 0).unwrap(),
            Feature::new(5, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(term.bits_per_item(), 4);
        assert_eq!(term.items_per_word(), 16);

        // A two-cell term still needs one bit.
        let tiny = Term::new(vec![Feature::new(2, 0).unwrap()]).unwrap();
        assert_eq!(tiny.bits_per_item(), 1);
        assert_eq!(tiny.items_per_word(), 64);
    }

    #[test]
    fn term_detects_cell_overflow() {
        // 32 features of 4 bins = 2^64 cells: one past the word width.
        let features: Vec<Feature> = (0..32).map(|i| Feature::new(4, i).unwrap()).collect();
        assert_eq!(Term::new(features).unwrap_err(), CoreError::SizeOverflow);
    }

    #[test]
    fn term_rejects_empty_and_oversized_tuples() {
        assert!(Term::new(vec![]).is_err());
        let too_many: Vec<Feature> = (0..64).map(|i| Feature::new(2, i).unwrap()).collect();
        assert!(Term::new(too_many).is_err());
    }
}
