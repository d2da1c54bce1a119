//! Bit-packed per-term input storage.
//!
//! For each case, the term's mixed-radix tuple index is packed into the
//! lowest free bit-slot of the current `u64` word; successive cases occupy
//! successive slots upward, successive words are laid out consecutively, and
//! the final word holds only the remainder with its upper bits zero.
//!
//! Putting the first case of a word in the least-significant slot means the
//! unpacking loop needs only a mask and a shift-down per case, with no extra
//! shift to position the first item.

use log::debug;

use crate::data::dataset::BinMatrix;
use crate::data::feature::Term;
use crate::error::{CoreError, Result};

/// Bit-packed tuple indices for one term over one dataset.
#[derive(Clone, Debug)]
pub struct PackedTermData {
    words: Vec<u64>,
    n_cases: usize,
    bits_per_item: usize,
    items_per_word: usize,
}

impl PackedTermData {
    /// Pack the tuple index of every case for `term`.
    ///
    /// Every raw bin index is validated against its feature's alphabet;
    /// a value at or above `n_bins` fails with [`CoreError::InvalidInput`]
    /// in all build profiles.
    pub fn from_dataset(term: &Term, matrix: &BinMatrix) -> Result<Self> {
        let n_cases = matrix.n_cases();
        let bits_per_item = term.bits_per_item();
        let items_per_word = term.items_per_word();

        let columns: Vec<&[u32]> = term
            .features()
            .iter()
            .map(|feature| {
                if feature.data_index() >= matrix.n_features() {
                    return Err(CoreError::InvalidInput("feature column is out of range"));
                }
                Ok(matrix.column(feature.data_index()))
            })
            .collect::<Result<_>>()?;

        let n_words = (n_cases - 1) / items_per_word + 1;
        let mut words = Vec::new();
        words
            .try_reserve_exact(n_words)
            .map_err(|_| CoreError::OutOfMemory)?;

        let mut word = 0u64;
        let mut slot = 0usize;
        for case in 0..n_cases {
            let mut tuple_index = 0usize;
            let mut multiple = 1usize;
            for (dim, feature) in term.features().iter().enumerate() {
                let bin = columns[dim][case] as usize;
                if bin >= feature.n_bins() {
                    return Err(CoreError::InvalidInput("bin index exceeds the feature alphabet"));
                }
                tuple_index += bin * multiple;
                multiple *= feature.n_bins();
            }

            word |= (tuple_index as u64) << (slot * bits_per_item);
            slot += 1;
            if slot == items_per_word {
                words.push(word);
                word = 0;
                slot = 0;
            }
        }
        if slot != 0 {
            words.push(word);
        }
        debug_assert_eq!(words.len(), n_words);

        debug!(
            "packed term data: {} cases, {} bits/item, {} words",
            n_cases,
            bits_per_item,
            words.len()
        );

        Ok(Self { words, n_cases, bits_per_item, items_per_word })
    }

    /// Number of cases stored.
    #[inline]
    pub fn n_cases(&self) -> usize {
        self.n_cases
    }

    /// Tuple index of a single case.
    #[inline]
    pub fn index_at(&self, case: usize) -> usize {
        debug_assert!(case < self.n_cases);
        let word = self.words[case / self.items_per_word];
        let shift = (case % self.items_per_word) * self.bits_per_item;
        let mask = item_mask(self.bits_per_item);
        ((word >> shift) & mask) as usize
    }

    /// Iterate the tuple indices of all cases in order.
    #[inline]
    pub fn indices(&self) -> TermIndexIter<'_> {
        TermIndexIter {
            words: &self.words,
            mask: item_mask(self.bits_per_item),
            bits_per_item: self.bits_per_item,
            items_per_word: self.items_per_word,
            word: 0,
            slot: 0,
            remaining: self.n_cases,
        }
    }
}

#[inline]
fn item_mask(bits_per_item: usize) -> u64 {
    if bits_per_item >= 64 {
        u64::MAX
    } else {
        (1u64 << bits_per_item) - 1
    }
}

/// Iterator over the unpacked tuple indices of a [`PackedTermData`].
pub struct TermIndexIter<'a> {
    words: &'a [u64],
    mask: u64,
    bits_per_item: usize,
    items_per_word: usize,
    word: usize,
    slot: usize,
    remaining: usize,
}

impl Iterator for TermIndexIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let bits = self.words[self.word] >> (self.slot * self.bits_per_item);
        let index = (bits & self.mask) as usize;
        self.slot += 1;
        if self.slot == self.items_per_word {
            self.slot = 0;
            self.word += 1;
        }
        self.remaining -= 1;
        Some(index)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for TermIndexIter<'_> {}
