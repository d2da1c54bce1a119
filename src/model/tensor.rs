//! Piecewise-constant tensors over discretized axes.
//!
//! A [`SegmentedTensor`] represents a piecewise-constant function over one or
//! more discretized dimensions: per axis a sorted, strictly ascending list of
//! cut positions, plus a dense value grid with one `vlen`-sized entry per
//! region. A cut value `c` on an axis with `n` bins lies in `{0, …, n − 2}`
//! and names the last bin of its lower region: bins `<= c` fall below the
//! boundary, bins `> c` above it.
//!
//! Two states are first-class. A *compact* tensor carries only the cuts where
//! the function actually changes; an *expanded* tensor carries the full cut
//! sequence `0, 1, …, n − 2` on every axis, so value lookup can index the
//! grid directly without searching cuts. Expansion is monotone: once
//! expanded, a tensor never returns to compact form.
//!
//! Both [`SegmentedTensor::add`] and [`SegmentedTensor::expand`] rewrite the
//! value grid in place by walking it in reverse: the output index of any
//! input region is always greater than or equal to the input index, so
//! writing from the top down can never clobber a value that has not yet been
//! read.

use crate::error::{CoreError, Result};

/// Per-axis traversal state for the reverse superposition walk.
struct MergeAxis {
    /// Index of the current cut in `self`'s old cut list, -1 when exhausted.
    i1: isize,
    /// Same for the other tensor.
    i2: isize,
    /// Regions stepped in `self`'s grid per axis step.
    mult1: usize,
    /// Regions stepped in the other grid per axis step.
    mult2: usize,
}

/// Per-axis traversal state for the reverse expansion walk.
struct ExpandAxis {
    /// Index of the current cut in the old cut list, -1 when exhausted.
    old_cut: isize,
    /// New-grid cut value currently being crossed, counting down.
    countdown: isize,
    /// Regions stepped in the old grid per axis step.
    mult: usize,
}

/// A piecewise-constant function over discretized axes.
#[derive(Debug)]
pub struct SegmentedTensor {
    vlen: usize,
    cuts: Vec<Vec<usize>>,
    values: Vec<f64>,
    expanded: bool,
}

impl SegmentedTensor {
    /// Create a constant-zero tensor with `n_dims` axes and `vlen` values per
    /// region. The constant function is representable with zero cuts, so the
    /// value grid starts with exactly one region.
    pub fn new(n_dims: usize, vlen: usize) -> Result<Self> {
        if n_dims == 0 || vlen == 0 {
            return Err(CoreError::InvalidInput("tensor needs at least one axis and one value"));
        }
        let mut values = Vec::new();
        values.try_reserve_exact(vlen).map_err(|_| CoreError::OutOfMemory)?;
        values.resize(vlen, 0.0);
        Ok(Self { vlen, cuts: vec![Vec::new(); n_dims], values, expanded: false })
    }

    /// Number of axes.
    #[inline]
    pub fn n_dims(&self) -> usize {
        self.cuts.len()
    }

    /// Values per region.
    #[inline]
    pub fn vlen(&self) -> usize {
        self.vlen
    }

    /// Whether the tensor has been expanded to its dense form.
    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Cut positions on `axis`, sorted strictly ascending.
    #[inline]
    pub fn cuts(&self, axis: usize) -> &[usize] {
        &self.cuts[axis]
    }

    /// Total number of regions, `Π_d (n_cuts_d + 1)`.
    pub fn n_regions(&self) -> usize {
        self.cuts.iter().map(|c| c.len() + 1).product()
    }

    /// The live value grid, `n_regions() * vlen` long, region index
    /// mixed-radix with axis 0 fastest.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values[..self.n_regions() * self.vlen]
    }

    /// Mutable view of the live value grid.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        let len = self.n_regions() * self.vlen;
        &mut self.values[..len]
    }

    /// Drop all cuts and return to the constant-zero function.
    pub fn reset(&mut self) {
        for axis in &mut self.cuts {
            axis.clear();
        }
        self.values.truncate(self.vlen);
        self.values.resize(self.vlen, 0.0);
        self.values.fill(0.0);
        self.expanded = false;
    }

    /// Replace the cuts on `axis`. Capacity grows by the 1.5x policy and
    /// never shrinks.
    pub fn set_cuts(&mut self, axis: usize, cuts: &[usize]) -> Result<()> {
        debug_assert!(cuts.windows(2).all(|w| w[0] < w[1]), "cuts must ascend strictly");
        reserve_amortized(&mut self.cuts[axis], cuts.len())?;
        self.cuts[axis].clear();
        self.cuts[axis].extend_from_slice(cuts);
        Ok(())
    }

    /// Make room for at least `n_values` grid entries (in `f64` units),
    /// zero-filling any newly exposed tail. Growth is amortized at 1.5x and
    /// the buffer never shrinks.
    pub fn ensure_value_capacity(&mut self, n_values: usize) -> Result<()> {
        reserve_amortized(&mut self.values, n_values)?;
        if self.values.len() < n_values {
            self.values.resize(n_values, 0.0);
        }
        Ok(())
    }

    /// Deep copy of cuts, values, and the expanded flag.
    pub fn copy_from(&mut self, other: &SegmentedTensor) -> Result<()> {
        assert_eq!(self.n_dims(), other.n_dims());
        assert_eq!(self.vlen, other.vlen);
        for axis in 0..other.n_dims() {
            self.set_cuts(axis, &other.cuts[axis])?;
        }
        let n_values = other.n_regions() * other.vlen;
        self.ensure_value_capacity(n_values)?;
        self.values.truncate(n_values);
        self.values.resize(n_values, 0.0);
        self.values.copy_from_slice(other.values());
        self.expanded = other.expanded;
        Ok(())
    }

    /// Scale every region value in place; cuts are unchanged.
    pub fn multiply(&mut self, scalar: f64) {
        for value in self.values_mut() {
            *value *= scalar;
        }
    }

    /// The value vector of the region containing `point`.
    ///
    /// Expanded tensors index the grid directly; compact tensors binary-search
    /// each axis's cuts.
    pub fn value_at(&self, point: &[usize]) -> &[f64] {
        debug_assert_eq!(point.len(), self.n_dims());
        let mut index = 0;
        let mut multiple = 1;
        if self.expanded {
            for (axis, &p) in point.iter().enumerate() {
                index += p * multiple;
                multiple *= self.cuts[axis].len() + 1;
            }
        } else {
            for (axis, &p) in point.iter().enumerate() {
                let cuts = &self.cuts[axis];
                // region = number of cuts strictly below the point
                index += cuts.partition_point(|&c| c < p) * multiple;
                multiple *= cuts.len() + 1;
            }
        }
        &self.values[index * self.vlen..(index + 1) * self.vlen]
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    /// Expand to a dense grid with `region_counts[d]` regions on axis `d`.
    ///
    /// Preconditions: `region_counts[d] >= n_cuts_d + 1` for every axis.
    /// A second call on an already-expanded tensor is a no-op.
    pub fn expand(&mut self, region_counts: &[usize]) -> Result<()> {
        if self.expanded {
            return Ok(());
        }
        assert_eq!(region_counts.len(), self.n_dims());

        let mut old_total = 1usize;
        let mut new_total = 1usize;
        for (axis, &count) in region_counts.iter().enumerate() {
            debug_assert!(count >= self.cuts[axis].len() + 1);
            old_total *= self.cuts[axis].len() + 1;
            new_total = new_total.checked_mul(count).ok_or(CoreError::SizeOverflow)?;
        }
        let new_values = new_total
            .checked_mul(self.vlen)
            .ok_or(CoreError::SizeOverflow)?;

        // Reserve everything fallible up front so the walk cannot fail midway.
        self.ensure_value_capacity(new_values)?;
        for (axis, &count) in region_counts.iter().enumerate() {
            reserve_amortized(&mut self.cuts[axis], count - 1)?;
        }

        let mut state: Vec<ExpandAxis> = Vec::with_capacity(self.n_dims());
        let mut mult = 1usize;
        for (axis, &count) in region_counts.iter().enumerate() {
            state.push(ExpandAxis {
                old_cut: self.cuts[axis].len() as isize - 1,
                countdown: count as isize - 2,
                mult,
            });
            mult *= self.cuts[axis].len() + 1;
        }

        let vlen = self.vlen;
        let cuts = &self.cuts;
        let values = &mut self.values;

        let mut src = old_total - 1;
        let mut dst = new_total - 1;
        loop {
            for k in 0..vlen {
                values[dst * vlen + k] = values[src * vlen + k];
            }
            if dst == 0 {
                break;
            }
            dst -= 1;

            for (axis, st) in state.iter_mut().enumerate() {
                if st.old_cut >= 0 {
                    let cut = cuts[axis][st.old_cut as usize] as isize;
                    if st.countdown <= cut {
                        st.old_cut -= 1;
                        src -= st.mult;
                    }
                    st.countdown -= 1;
                    break;
                } else if st.countdown >= 0 {
                    st.countdown -= 1;
                    break;
                } else {
                    // axis fully unrolled: rewind it and carry to the next one
                    src += st.mult * cuts[axis].len();
                    st.old_cut = cuts[axis].len() as isize - 1;
                    st.countdown = region_counts[axis] as isize - 2;
                }
            }
        }
        debug_assert_eq!(src, 0);

        for (axis, &count) in region_counts.iter().enumerate() {
            let cuts = &mut self.cuts[axis];
            cuts.clear();
            cuts.extend(0..count - 1);
        }
        self.expanded = true;
        Ok(())
    }

    // =========================================================================
    // Superposition
    // =========================================================================

    /// Add `other` to `self` as piecewise-constant functions.
    ///
    /// The result carries the union of both cut sets per axis; each output
    /// region's value is the sum of the two input regions covering it. Both
    /// operands may be compact or expanded; the expanded flag of `self` is
    /// unchanged.
    pub fn add(&mut self, other: &SegmentedTensor) -> Result<()> {
        assert_eq!(self.n_dims(), other.n_dims());
        assert_eq!(self.vlen, other.vlen);

        let mut merged_lens = Vec::with_capacity(self.n_dims());
        let mut old_total = 1usize;
        let mut other_total = 1usize;
        let mut new_total = 1usize;
        for axis in 0..self.n_dims() {
            let merged = merged_cut_count(&self.cuts[axis], &other.cuts[axis]);
            merged_lens.push(merged);
            old_total *= self.cuts[axis].len() + 1;
            other_total *= other.cuts[axis].len() + 1;
            new_total = new_total.checked_mul(merged + 1).ok_or(CoreError::SizeOverflow)?;
        }
        let new_values = new_total
            .checked_mul(self.vlen)
            .ok_or(CoreError::SizeOverflow)?;

        // All fallible growth happens before any value is rewritten.
        self.ensure_value_capacity(new_values)?;
        for (axis, &merged) in merged_lens.iter().enumerate() {
            reserve_amortized(&mut self.cuts[axis], merged)?;
        }

        let mut state: Vec<MergeAxis> = Vec::with_capacity(self.n_dims());
        let mut mult1 = 1usize;
        let mut mult2 = 1usize;
        for axis in 0..self.n_dims() {
            state.push(MergeAxis {
                i1: self.cuts[axis].len() as isize - 1,
                i2: other.cuts[axis].len() as isize - 1,
                mult1,
                mult2,
            });
            mult1 *= self.cuts[axis].len() + 1;
            mult2 *= other.cuts[axis].len() + 1;
        }

        let vlen = self.vlen;
        let cuts1 = &self.cuts;
        let cuts2 = &other.cuts;
        let values = &mut self.values;

        let mut v1 = old_total - 1;
        let mut v2 = other_total - 1;
        let mut dst = new_total - 1;
        loop {
            for k in 0..vlen {
                values[dst * vlen + k] = values[v1 * vlen + k] + other.values[v2 * vlen + k];
            }
            if dst == 0 {
                break;
            }
            dst -= 1;

            for (axis, st) in state.iter_mut().enumerate() {
                match (st.i1 >= 0, st.i2 >= 0) {
                    (true, true) => {
                        let c1 = cuts1[axis][st.i1 as usize];
                        let c2 = cuts2[axis][st.i2 as usize];
                        // the merged cut being crossed is max(c1, c2); an input
                        // steps down exactly when it owns that cut
                        if c2 <= c1 {
                            st.i1 -= 1;
                            v1 -= st.mult1;
                        }
                        if c1 <= c2 {
                            st.i2 -= 1;
                            v2 -= st.mult2;
                        }
                        break;
                    }
                    (true, false) => {
                        st.i1 -= 1;
                        v1 -= st.mult1;
                        break;
                    }
                    (false, true) => {
                        st.i2 -= 1;
                        v2 -= st.mult2;
                        break;
                    }
                    (false, false) => {
                        // axis fully consumed: rewind both inputs and carry
                        v1 += st.mult1 * cuts1[axis].len();
                        v2 += st.mult2 * cuts2[axis].len();
                        st.i1 = cuts1[axis].len() as isize - 1;
                        st.i2 = cuts2[axis].len() as isize - 1;
                    }
                }
            }
        }
        debug_assert_eq!(v1, 0);
        debug_assert_eq!(v2, 0);

        // Merge the cut arrays last, in reverse, reusing self's storage:
        // output slots sit at or above the old entries they displace.
        for (axis, &merged) in merged_lens.iter().enumerate() {
            let old_len = self.cuts[axis].len();
            let cuts = &mut self.cuts[axis];
            cuts.resize(merged, 0);
            let other_cuts = &other.cuts[axis];

            let mut p1 = old_len as isize - 1;
            let mut p2 = other_cuts.len() as isize - 1;
            let mut top = merged as isize - 1;
            loop {
                if top == p1 {
                    // self's remaining prefix is already in place
                    break;
                }
                if top == p2 {
                    // everything left comes from the other tensor
                    cuts[..=top as usize].copy_from_slice(&other_cuts[..=top as usize]);
                    break;
                }
                let c1 = cuts[p1 as usize];
                let c2 = other_cuts[p2 as usize];
                if c2 <= c1 {
                    p1 -= 1;
                }
                if c1 <= c2 {
                    p2 -= 1;
                }
                cuts[top as usize] = c1.max(c2);
                top -= 1;
            }
        }
        Ok(())
    }
}

/// Number of cuts in the union of two sorted cut lists.
fn merged_cut_count(a: &[usize], b: &[usize]) -> usize {
    let mut count = 0;
    let mut ia = 0;
    let mut ib = 0;
    while ia < a.len() && ib < b.len() {
        let ca = a[ia];
        let cb = b[ib];
        if ca <= cb {
            ia += 1;
        }
        if cb <= ca {
            ib += 1;
        }
        count += 1;
    }
    count + (a.len() - ia) + (b.len() - ib)
}

/// Grow-only reservation with the 1.5x amortization policy.
fn reserve_amortized<T>(vec: &mut Vec<T>, needed: usize) -> Result<()> {
    if needed > vec.capacity() {
        let target = needed.saturating_add(needed >> 1);
        vec.try_reserve_exact(target - vec.len())
            .map_err(|_| CoreError::OutOfMemory)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor_1d(cuts: &[usize], values: &[f64]) -> SegmentedTensor {
        let mut t = SegmentedTensor::new(1, 1).unwrap();
        t.ensure_value_capacity(values.len()).unwrap();
        t.set_cuts(0, cuts).unwrap();
        t.values_mut().copy_from_slice(values);
        t
    }

    #[test]
    fn new_tensor_is_constant_zero() {
        let t = SegmentedTensor::new(2, 3).unwrap();
        assert_eq!(t.n_regions(), 1);
        assert_eq!(t.values(), &[0.0, 0.0, 0.0]);
        assert!(!t.is_expanded());
    }

    #[test]
    fn value_lookup_uses_last_low_bin_cuts() {
        // a cut names the last bin of its lower region
        let t = tensor_1d(&[2], &[10.0, 20.0]);
        assert_eq!(t.value_at(&[0]), &[10.0]);
        assert_eq!(t.value_at(&[2]), &[10.0]);
        assert_eq!(t.value_at(&[3]), &[20.0]);
        assert_eq!(t.value_at(&[4]), &[20.0]);
    }

    #[test]
    fn add_merges_step_functions() {
        let mut a = tensor_1d(&[2], &[10.0, 20.0]);
        let b = tensor_1d(&[3], &[1.0, 2.0]);
        a.add(&b).unwrap();
        assert_eq!(a.cuts(0), &[2, 3]);
        assert_eq!(a.values(), &[11.0, 21.0, 22.0]);
    }

    #[test]
    fn add_with_equal_cuts_keeps_one_boundary() {
        let mut a = tensor_1d(&[2], &[10.0, 20.0]);
        let b = tensor_1d(&[2], &[1.0, 2.0]);
        a.add(&b).unwrap();
        assert_eq!(a.cuts(0), &[2]);
        assert_eq!(a.values(), &[11.0, 22.0]);
    }

    #[test]
    fn add_zero_is_identity() {
        let mut a = tensor_1d(&[2], &[10.0, 20.0]);
        let zero = SegmentedTensor::new(1, 1).unwrap();
        a.add(&zero).unwrap();
        assert_eq!(a.cuts(0), &[2]);
        assert_eq!(a.values(), &[10.0, 20.0]);
    }

    #[test]
    fn add_two_dimensional_superposition() {
        // a varies along axis 0 only, b along axis 1 only
        let mut a = SegmentedTensor::new(2, 1).unwrap();
        a.ensure_value_capacity(2).unwrap();
        a.set_cuts(0, &[2]).unwrap();
        a.values_mut().copy_from_slice(&[1.0, 2.0]);

        let mut b = SegmentedTensor::new(2, 1).unwrap();
        b.ensure_value_capacity(2).unwrap();
        b.set_cuts(1, &[1]).unwrap();
        b.values_mut().copy_from_slice(&[10.0, 40.0]);

        a.add(&b).unwrap();
        assert_eq!(a.cuts(0), &[2]);
        assert_eq!(a.cuts(1), &[1]);
        // region index = r0 + 2 * r1, axis 0 fastest
        assert_eq!(a.values(), &[11.0, 12.0, 41.0, 42.0]);
    }

    #[test]
    fn expand_fills_every_bin() {
        // the cut at 2 keeps bins 0..=2 in the lower region
        let mut t = tensor_1d(&[2], &[10.0, 20.0]);
        t.expand(&[5]).unwrap();
        assert!(t.is_expanded());
        assert_eq!(t.cuts(0), &[0, 1, 2, 3]);
        assert_eq!(t.values(), &[10.0, 10.0, 10.0, 20.0, 20.0]);
    }

    #[test]
    fn expand_is_idempotent() {
        let mut t = tensor_1d(&[2], &[10.0, 20.0]);
        t.expand(&[5]).unwrap();
        let before = t.values().to_vec();
        t.expand(&[5]).unwrap();
        assert_eq!(t.values(), &before[..]);
        assert_eq!(t.cuts(0), &[0, 1, 2, 3]);
    }

    #[test]
    fn expand_two_dimensional() {
        let mut t = SegmentedTensor::new(2, 1).unwrap();
        t.ensure_value_capacity(2).unwrap();
        t.set_cuts(0, &[1]).unwrap();
        t.values_mut().copy_from_slice(&[1.0, 2.0]);

        t.expand(&[3, 2]).unwrap();
        assert_eq!(t.cuts(0), &[0, 1]);
        assert_eq!(t.cuts(1), &[0]);
        assert_eq!(t.values(), &[1.0, 1.0, 2.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn expanded_lookup_bypasses_cut_search() {
        let mut t = tensor_1d(&[2], &[-1.0, 1.0]);
        t.expand(&[4]).unwrap();
        assert_eq!(t.value_at(&[0]), &[-1.0]);
        assert_eq!(t.value_at(&[2]), &[-1.0]);
        assert_eq!(t.value_at(&[3]), &[1.0]);
    }

    #[test]
    fn copy_preserves_everything() {
        let mut src = tensor_1d(&[2], &[10.0, 20.0]);
        src.expand(&[4]).unwrap();
        let mut dst = SegmentedTensor::new(1, 1).unwrap();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.cuts(0), src.cuts(0));
        assert_eq!(dst.values(), src.values());
        assert!(dst.is_expanded());
    }

    #[test]
    fn multiply_scales_values_only() {
        let mut t = tensor_1d(&[2], &[10.0, 20.0]);
        t.multiply(0.5);
        assert_eq!(t.cuts(0), &[2]);
        assert_eq!(t.values(), &[5.0, 10.0]);
    }

    #[test]
    fn reset_returns_to_constant_zero() {
        let mut t = tensor_1d(&[2], &[10.0, 20.0]);
        t.reset();
        assert_eq!(t.n_regions(), 1);
        assert_eq!(t.values(), &[0.0]);
        assert!(!t.is_expanded());
    }

    #[test]
    fn vector_valued_add() {
        let mut a = SegmentedTensor::new(1, 2).unwrap();
        a.ensure_value_capacity(4).unwrap();
        a.set_cuts(0, &[1]).unwrap();
        a.values_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        let mut b = SegmentedTensor::new(1, 2).unwrap();
        b.ensure_value_capacity(4).unwrap();
        b.set_cuts(0, &[2]).unwrap();
        b.values_mut().copy_from_slice(&[10.0, 10.0, 20.0, 20.0]);

        a.add(&b).unwrap();
        assert_eq!(a.cuts(0), &[1, 2]);
        assert_eq!(a.values(), &[11.0, 12.0, 13.0, 14.0, 23.0, 24.0]);
    }
}
