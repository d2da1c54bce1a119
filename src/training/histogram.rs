//! Bucket histograms over a term's grid.
//!
//! A [`Histogram`] is a dense array of per-bin accumulators in row-major
//! mixed-radix order, dimension 0 fastest. Each bucket stores the accumulated
//! bag weight, one residual sum per vector component, and - for
//! classification - one hessian sum per component. Buckets are flat `f64`
//! runs of a fixed stride rather than a trait hierarchy; the layout is simple
//! enough that the scalar loops vectorize on their own.
//!
//! After the main cube, the buffer carries one wraparound ring per axis for
//! the in-place fast-totals transform (see [`super::totals`]); binning leaves
//! those slots untouched, and they must be zero when the transform starts.

use log::debug;

use crate::data::{Gradients, PackedTermData, Term};
use crate::error::{CoreError, Result};

// =============================================================================
// Histogram
// =============================================================================

/// Dense per-bin accumulators for one term, plus fast-totals ring slots.
#[derive(Clone, Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    stride: usize,
    n_cells: usize,
    n_slots: usize,
    vlen: usize,
    has_hessians: bool,
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram::empty()
    }
}

impl Histogram {
    /// An empty histogram; call [`Histogram::reshape`] before use.
    pub fn empty() -> Self {
        Self { buckets: Vec::new(), stride: 0, n_cells: 0, n_slots: 0, vlen: 0, has_hessians: false }
    }

    /// A zeroed histogram shaped for `term`.
    pub fn for_term(term: &Term, vlen: usize, has_hessians: bool) -> Result<Self> {
        let mut hist = Self::empty();
        hist.reshape(term, vlen, has_hessians)?;
        Ok(hist)
    }

    /// Reshape for `term` and zero every slot. The backing buffer only ever
    /// grows, so a cache can reuse one histogram across rounds.
    pub fn reshape(&mut self, term: &Term, vlen: usize, has_hessians: bool) -> Result<()> {
        if vlen == 0 {
            return Err(CoreError::InvalidInput("vector length must be positive"));
        }
        let n_cells = term.n_cells();
        let n_slots = n_cells
            .checked_add(ring_slot_count(term)?)
            .ok_or(CoreError::SizeOverflow)?;
        let stride = 1 + vlen * (1 + has_hessians as usize);
        let len = n_slots.checked_mul(stride).ok_or(CoreError::SizeOverflow)?;

        if len > self.buckets.capacity() {
            let additional = len - self.buckets.len();
            self.buckets
                .try_reserve_exact(additional)
                .map_err(|_| CoreError::OutOfMemory)?;
        }
        self.buckets.clear();
        self.buckets.resize(len, 0.0);

        self.stride = stride;
        self.n_cells = n_cells;
        self.n_slots = n_slots;
        self.vlen = vlen;
        self.has_hessians = has_hessians;
        Ok(())
    }

    /// Zero every slot, keeping the shape.
    pub fn reset(&mut self) {
        self.buckets.fill(0.0);
    }

    /// Number of main-cube buckets.
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Vector components per bucket.
    #[inline]
    pub fn vlen(&self) -> usize {
        self.vlen
    }

    /// Whether buckets carry hessian sums.
    #[inline]
    pub fn has_hessians(&self) -> bool {
        self.has_hessians
    }

    #[inline]
    fn offset(&self, slot: usize) -> usize {
        debug_assert!(slot < self.n_slots);
        slot * self.stride
    }

    /// Accumulated bag weight of a bucket.
    #[inline]
    pub fn weight(&self, slot: usize) -> f64 {
        self.buckets[self.offset(slot)]
    }

    /// Residual sum of component `k` of a bucket.
    #[inline]
    pub fn grad(&self, slot: usize, k: usize) -> f64 {
        debug_assert!(k < self.vlen);
        self.buckets[self.offset(slot) + 1 + k]
    }

    /// Hessian sum of component `k` of a bucket (zero for regression).
    #[inline]
    pub fn hess(&self, slot: usize, k: usize) -> f64 {
        debug_assert!(k < self.vlen);
        if self.has_hessians {
            self.buckets[self.offset(slot) + 1 + self.vlen + k]
        } else {
            0.0
        }
    }

    #[inline]
    fn accumulate(&mut self, slot: usize, weight: f64, grad: &[f64], hess: &[f64]) {
        let base = self.offset(slot);
        self.buckets[base] += weight;
        for (k, g) in grad.iter().enumerate() {
            self.buckets[base + 1 + k] += weight * g;
        }
        if self.has_hessians {
            for (k, h) in hess.iter().enumerate() {
                self.buckets[base + 1 + self.vlen + k] += weight * h;
            }
        }
    }

    /// `buckets[dst] += buckets[src]`, componentwise.
    #[inline]
    pub(crate) fn fold_slot(&mut self, dst: usize, src: usize) {
        let dst_base = self.offset(dst);
        let src_base = self.offset(src);
        for k in 0..self.stride {
            let v = self.buckets[src_base + k];
            self.buckets[dst_base + k] += v;
        }
    }

    /// `buckets[dst] = buckets[src]`, componentwise.
    #[inline]
    pub(crate) fn copy_slot(&mut self, dst: usize, src: usize) {
        let dst_base = self.offset(dst);
        let src_base = self.offset(src);
        for k in 0..self.stride {
            self.buckets[dst_base + k] = self.buckets[src_base + k];
        }
    }

    /// Zero `count` consecutive slots starting at `first`.
    #[inline]
    pub(crate) fn zero_slots(&mut self, first: usize, count: usize) {
        let base = self.offset(first);
        self.buckets[base..base + count * self.stride].fill(0.0);
    }
}

/// Extra slots appended after the main cube: one ring per axis, the ring for
/// axis `d` sized to the product of the lower axes' bin counts.
fn ring_slot_count(term: &Term) -> Result<usize> {
    let mut total = 0usize;
    let mut ring = 1usize;
    for feature in term.features() {
        total = total.checked_add(ring).ok_or(CoreError::SizeOverflow)?;
        ring = ring.checked_mul(feature.n_bins()).ok_or(CoreError::SizeOverflow)?;
    }
    Ok(total)
}

// =============================================================================
// Totals
// =============================================================================

/// One bucket's worth of accumulated sums, owned and reusable.
///
/// Range-sum queries write into a `Totals` so the hot sweep loop never
/// allocates; the splitter keeps a handful of these as registers.
#[derive(Clone, Debug)]
pub struct Totals {
    weight: f64,
    grad: Vec<f64>,
    hess: Vec<f64>,
    has_hessians: bool,
}

impl Totals {
    /// A zeroed register for `vlen` components.
    pub fn new(vlen: usize, has_hessians: bool) -> Self {
        Self {
            weight: 0.0,
            grad: vec![0.0; vlen],
            hess: vec![0.0; if has_hessians { vlen } else { 0 }],
            has_hessians,
        }
    }

    /// Zero all sums.
    #[inline]
    pub fn zero(&mut self) {
        self.weight = 0.0;
        self.grad.fill(0.0);
        self.hess.fill(0.0);
    }

    /// Accumulated bag weight.
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Residual sums per component.
    #[inline]
    pub fn grad(&self) -> &[f64] {
        &self.grad
    }

    /// Hessian sums per component (empty for regression).
    #[inline]
    pub fn hess(&self) -> &[f64] {
        &self.hess
    }

    /// The score/prediction denominator for component `k`: the hessian sum
    /// for classification, the bag weight for regression.
    #[inline]
    pub fn denominator(&self, k: usize) -> f64 {
        if self.has_hessians {
            self.hess[k]
        } else {
            self.weight
        }
    }

    /// Copy sums from another register without reallocating.
    #[inline]
    pub fn copy_from(&mut self, other: &Totals) {
        self.weight = other.weight;
        self.grad.copy_from_slice(&other.grad);
        self.hess.copy_from_slice(&other.hess);
    }

    /// `self += hist[slot]`.
    #[inline]
    pub fn add_slot(&mut self, hist: &Histogram, slot: usize) {
        self.weight += hist.weight(slot);
        for k in 0..self.grad.len() {
            self.grad[k] += hist.grad(slot, k);
        }
        if self.has_hessians {
            for k in 0..self.grad.len() {
                self.hess[k] += hist.hess(slot, k);
            }
        }
    }

    /// `self -= hist[slot]`.
    #[inline]
    pub fn sub_slot(&mut self, hist: &Histogram, slot: usize) {
        self.weight -= hist.weight(slot);
        for k in 0..self.grad.len() {
            self.grad[k] -= hist.grad(slot, k);
        }
        if self.has_hessians {
            for k in 0..self.grad.len() {
                self.hess[k] -= hist.hess(slot, k);
            }
        }
    }

    /// `self = hist[slot]`.
    #[inline]
    pub fn copy_slot(&mut self, hist: &Histogram, slot: usize) {
        self.zero();
        self.add_slot(hist, slot);
    }
}

// =============================================================================
// Binning
// =============================================================================

/// Bin every case's residuals into the histogram.
///
/// `bag` holds one non-negative multiplicity per case and scales both the
/// residuals and the hessians; an empty slice means unit weights for every
/// case. The ring slots after the main cube are not touched.
pub fn build_histogram(
    term: &Term,
    packed: &PackedTermData,
    bag: &[u32],
    gradients: &Gradients,
    hist: &mut Histogram,
) -> Result<()> {
    let n_cases = packed.n_cases();
    if gradients.n_cases() != n_cases {
        return Err(CoreError::InvalidInput("gradient count does not match case count"));
    }
    if !bag.is_empty() && bag.len() != n_cases {
        return Err(CoreError::InvalidInput("bag length does not match case count"));
    }
    if hist.n_cells() != term.n_cells()
        || hist.vlen() != gradients.vlen()
        || hist.has_hessians() != gradients.has_hessians()
    {
        return Err(CoreError::InvalidInput("histogram shape does not match term and gradients"));
    }

    debug!("binning {} cases into {} buckets", n_cases, hist.n_cells());

    hist.reset();
    for (case, slot) in packed.indices().enumerate() {
        let weight = if bag.is_empty() { 1 } else { bag[case] };
        if weight == 0 {
            continue;
        }
        hist.accumulate(slot, weight as f64, gradients.grad(case), gradients.hess(case));
    }
    Ok(())
}
