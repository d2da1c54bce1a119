//! The fast-totals transform and range-sum queries.
//!
//! [`fast_totals`] rewrites a histogram in place so that the bucket at grid
//! point `(i_0, …, i_{N−1})` holds the sum of the original buckets over the
//! box `[0..i_0] × … × [0..i_{N−1}]` - the corner-sum cube. The transform
//! walks the cube once in mixed-radix order, folding each bucket through one
//! rolling wraparound ring per axis; the ring for axis `d` holds the partial
//! sums of the lower axes and is zeroed whenever axis `d` wraps. The extra
//! memory is the sum of the lower-axis products - always less than a second
//! cube.
//!
//! [`range_sum`] then reads the sum over an arbitrary sub-box in `O(2^k)`
//! bucket accesses, where `k` is the number of axes probed from their high
//! end, using the inclusion-exclusion principle over the prefix cube.
//!
//! The transform is destructive: the original histogram is not recoverable.
//! Debug builds re-check both operations against a brute-force reference
//! summation; release builds elide the checks entirely.

use crate::data::feature::MAX_TERM_DIMENSIONS;
use crate::data::Term;
use crate::training::histogram::{Histogram, Totals};

/// Per-axis state for the rolling-ring prefix transform.
struct RingAxis {
    /// First slot of this axis's ring.
    first: usize,
    /// One past the last slot of this axis's ring.
    wrap: usize,
    /// Slot the next bucket folds into.
    cur: usize,
    /// Current index along the axis.
    i: usize,
    /// Bin count of the axis.
    n_bins: usize,
}

/// Transform `hist` in place into its corner-sum cube.
///
/// The ring slots after the main cube must be zero on entry (binning leaves
/// them that way) and are left zero on exit.
pub fn fast_totals(hist: &mut Histogram, term: &Term) {
    debug_assert_eq!(hist.n_cells(), term.n_cells());

    #[cfg(debug_assertions)]
    let raw = hist.clone();

    let mut rings: Vec<RingAxis> = Vec::with_capacity(term.n_dims());
    let mut first = hist.n_cells();
    let mut ring_len = 1usize;
    for feature in term.features() {
        rings.push(RingAxis {
            first,
            wrap: first + ring_len,
            cur: first,
            i: 0,
            n_bins: feature.n_bins(),
        });
        first += ring_len;
        ring_len *= feature.n_bins();
    }

    let mut cell = 0usize;
    'walk: loop {
        // fold outermost ring first; each ring hands its running sum down
        // until the axis-0 ring holds the full prefix for this cell
        let mut prev = cell;
        for ring in rings.iter_mut().rev() {
            hist.fold_slot(ring.cur, prev);
            prev = ring.cur;
            ring.cur += 1;
            if ring.cur == ring.wrap {
                ring.cur = ring.first;
            }
        }
        hist.copy_slot(cell, prev);

        #[cfg(debug_assertions)]
        verify_prefix_cell(&raw, term, &rings, cell, hist);

        let mut carry = 0usize;
        loop {
            let ring = &mut rings[carry];
            ring.i += 1;
            if ring.i != ring.n_bins {
                break;
            }
            ring.i = 0;
            debug_assert_eq!(ring.cur, ring.first);
            let (first, count) = (ring.first, ring.wrap - ring.first);
            hist.zero_slots(first, count);
            carry += 1;
            if carry == rings.len() {
                break 'walk;
            }
        }
        cell += 1;
    }
}

#[cfg(debug_assertions)]
fn verify_prefix_cell(raw: &Histogram, term: &Term, rings: &[RingAxis], cell: usize, hist: &Histogram) {
    let start = vec![0usize; term.n_dims()];
    let last: Vec<usize> = rings.iter().map(|r| r.i).collect();
    let mut expect = Totals::new(hist.vlen(), hist.has_hessians());
    box_sum(raw, term, &start, &last, &mut expect);
    assert!(
        nearly_equal(expect.weight(), hist.weight(cell)),
        "prefix sum mismatch at cell {}: expected weight {}, got {}",
        cell,
        expect.weight(),
        hist.weight(cell)
    );
}

/// Read the sum over the box selected by `point` and `direction`.
///
/// Bit `d` of `direction` chooses the axis-`d` extent: `[0..point_d]` when
/// clear, `[point_d+1..n_bins_d-1]` when set. `direction == 0` degenerates to
/// a single bucket read.
pub fn range_sum(hist: &Histogram, term: &Term, point: &[usize], direction: usize, out: &mut Totals) {
    debug_assert_eq!(point.len(), term.n_dims());
    debug_assert_eq!(direction >> term.n_dims(), 0);

    if direction == 0 {
        let mut offset = 0usize;
        let mut multiple = 1usize;
        for (d, feature) in term.features().iter().enumerate() {
            offset += point[d] * multiple;
            multiple *= feature.n_bins();
        }
        out.copy_slot(hist, offset);
        return;
    }

    // for every axis probed from the high end, the prefix read either stops
    // at the point or runs to the last bin
    let mut spans = [(0usize, 0usize); MAX_TERM_DIMENSIONS];
    let mut n_high = 0usize;
    let mut start = 0usize;
    let mut multiple = 1usize;
    for (d, feature) in term.features().iter().enumerate() {
        if direction & (1 << d) != 0 {
            let last = multiple * (feature.n_bins() - 1);
            spans[n_high] = (multiple * point[d], last);
            n_high += 1;
            multiple += last;
        } else {
            start += multiple * point[d];
            multiple *= feature.n_bins();
        }
    }

    out.zero();
    for permute in 0..(1usize << n_high) {
        let mut offset = start;
        for (bit, &(at_point, at_last)) in spans[..n_high].iter().enumerate() {
            offset += if permute & (1 << bit) != 0 { at_last } else { at_point };
        }
        // sign is the parity of the axes left at the point
        if (n_high + permute.count_ones() as usize) % 2 == 1 {
            out.sub_slot(hist, offset);
        } else {
            out.add_slot(hist, offset);
        }
    }
}

/// Brute-force sum over the box `[start_d ..= last_d]` of a raw
/// (pre-transform) histogram. The reference for debug checks and tests.
#[cfg(any(test, debug_assertions))]
pub(crate) fn box_sum(raw: &Histogram, term: &Term, start: &[usize], last: &[usize], out: &mut Totals) {
    out.zero();
    let n_dims = term.n_dims();
    let mut at = start.to_vec();
    let mut offset = 0usize;
    let mut multiple = 1usize;
    for d in 0..n_dims {
        debug_assert!(last[d] < term.n_bins(d));
        debug_assert!(start[d] <= last[d]);
        offset += start[d] * multiple;
        multiple *= term.n_bins(d);
    }

    loop {
        out.add_slot(raw, offset);

        let mut d = 0usize;
        let mut step = 1usize;
        loop {
            if at[d] != last[d] {
                at[d] += 1;
                offset += step;
                break;
            }
            offset -= (last[d] - start[d]) * step;
            step *= term.n_bins(d);
            at[d] = start[d];
            d += 1;
            if d == n_dims {
                return;
            }
        }
    }
}

/// Re-check a range-sum result against the brute-force reference on a
/// pre-transform snapshot. Compiles to nothing in release builds.
pub(crate) fn verify_range_sum(
    raw: &Histogram,
    term: &Term,
    point: &[usize],
    direction: usize,
    got: &Totals,
) {
    #[cfg(debug_assertions)]
    {
        let n_dims = term.n_dims();
        let mut start = vec![0usize; n_dims];
        let mut last = vec![0usize; n_dims];
        for d in 0..n_dims {
            if direction & (1 << d) != 0 {
                start[d] = point[d] + 1;
                last[d] = term.n_bins(d) - 1;
            } else {
                start[d] = 0;
                last[d] = point[d];
            }
        }
        let mut expect = Totals::new(raw.vlen(), raw.has_hessians());
        box_sum(raw, term, &start, &last, &mut expect);
        assert!(
            nearly_equal(expect.weight(), got.weight()),
            "range sum mismatch at {:?}/{:#b}: expected weight {}, got {}",
            point,
            direction,
            expect.weight(),
            got.weight()
        );
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (raw, term, point, direction, got);
    }
}

#[cfg(debug_assertions)]
fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BinMatrix, Feature, Gradients, PackedTermData};
    use crate::training::histogram::build_histogram;

    fn term_2x2() -> Term {
        Term::pair(Feature::new(2, 0).unwrap(), Feature::new(2, 1).unwrap()).unwrap()
    }

    /// Histogram [[1,2],[3,4]] over a 2x2 grid via per-case weights.
    fn hist_2x2() -> Histogram {
        let term = term_2x2();
        let matrix = BinMatrix::new(
            vec![
                0, 1, 0, 1, // feature 0
                0, 0, 1, 1, // feature 1
            ],
            4,
            2,
        )
        .unwrap();
        let packed = PackedTermData::from_dataset(&term, &matrix).unwrap();
        let gradients = Gradients::regression(vec![1.0; 4], 4, 1).unwrap();
        let mut hist = Histogram::for_term(&term, 1, false).unwrap();
        build_histogram(&term, &packed, &[1, 2, 3, 4], &gradients, &mut hist).unwrap();
        hist
    }

    #[test]
    fn fast_totals_small_cube() {
        let term = term_2x2();
        let mut hist = hist_2x2();
        fast_totals(&mut hist, &term);

        let weights: Vec<f64> = (0..4).map(|s| hist.weight(s)).collect();
        assert_eq!(weights, vec![1.0, 3.0, 4.0, 10.0]);
        let grads: Vec<f64> = (0..4).map(|s| hist.grad(s, 0)).collect();
        assert_eq!(grads, vec![1.0, 3.0, 4.0, 10.0]);
    }

    #[test]
    fn range_sum_upper_quadrant() {
        let term = term_2x2();
        let mut hist = hist_2x2();
        fast_totals(&mut hist, &term);

        let mut totals = Totals::new(1, false);
        range_sum(&hist, &term, &[0, 0], 0b11, &mut totals);
        // sum over i > 0 and j > 0: 10 - 3 - 4 + 1
        assert_eq!(totals.weight(), 4.0);
    }

    #[test]
    fn zero_direction_is_a_single_read() {
        let term = term_2x2();
        let mut hist = hist_2x2();
        fast_totals(&mut hist, &term);

        let mut totals = Totals::new(1, false);
        range_sum(&hist, &term, &[1, 0], 0, &mut totals);
        assert_eq!(totals.weight(), 3.0);
    }

    #[test]
    fn direction_vectors_partition_the_cube() {
        let term = Term::pair(Feature::new(3, 0).unwrap(), Feature::new(4, 1).unwrap()).unwrap();
        let n_cases = 12;
        let mut f0 = Vec::new();
        let mut f1 = Vec::new();
        for j in 0..4u32 {
            for i in 0..3u32 {
                f0.push(i);
                f1.push(j);
            }
        }
        let mut bins = f0;
        bins.extend(f1);
        let matrix = BinMatrix::new(bins, n_cases, 2).unwrap();
        let packed = PackedTermData::from_dataset(&term, &matrix).unwrap();
        let grad: Vec<f64> = (0..n_cases).map(|c| c as f64 - 3.0).collect();
        let gradients = Gradients::regression(grad, n_cases, 1).unwrap();
        let bag: Vec<u32> = (0..n_cases as u32).map(|c| c % 3 + 1).collect();

        let mut hist = Histogram::for_term(&term, 1, false).unwrap();
        build_histogram(&term, &packed, &bag, &gradients, &mut hist).unwrap();
        let total_weight: f64 = (0..hist.n_cells()).map(|s| hist.weight(s)).sum();
        let total_grad: f64 = (0..hist.n_cells()).map(|s| hist.grad(s, 0)).sum();

        fast_totals(&mut hist, &term);

        // any interior point: the four quadrants partition the cube
        let mut totals = Totals::new(1, false);
        for point in [[0usize, 0usize], [1, 1], [1, 2], [0, 2]] {
            let mut weight = 0.0;
            let mut grad_sum = 0.0;
            for direction in 0..4usize {
                range_sum(&hist, &term, &point, direction, &mut totals);
                weight += totals.weight();
                grad_sum += totals.grad()[0];
            }
            assert!((weight - total_weight).abs() < 1e-9);
            assert!((grad_sum - total_grad).abs() < 1e-9);
        }
    }

    #[test]
    fn range_sum_matches_brute_force_everywhere() {
        let term = Term::pair(Feature::new(3, 0).unwrap(), Feature::new(3, 1).unwrap()).unwrap();
        let n_cases = 18;
        let mut f0 = Vec::new();
        let mut f1 = Vec::new();
        for c in 0..n_cases as u32 {
            f0.push(c % 3);
            f1.push((c / 3) % 3);
        }
        let mut bins = f0;
        bins.extend(f1);
        let matrix = BinMatrix::new(bins, n_cases, 2).unwrap();
        let packed = PackedTermData::from_dataset(&term, &matrix).unwrap();
        let grad: Vec<f64> = (0..n_cases).map(|c| ((c * 7) % 5) as f64 - 2.0).collect();
        let gradients = Gradients::regression(grad, n_cases, 1).unwrap();

        let mut raw = Histogram::for_term(&term, 1, false).unwrap();
        build_histogram(&term, &packed, &[], &gradients, &mut raw).unwrap();
        let mut hist = raw.clone();
        fast_totals(&mut hist, &term);

        let mut got = Totals::new(1, false);
        let mut expect = Totals::new(1, false);
        for p0 in 0..3 {
            for p1 in 0..3 {
                for direction in 0..4usize {
                    if direction & 1 != 0 && p0 == 2 {
                        continue; // empty high side
                    }
                    if direction & 2 != 0 && p1 == 2 {
                        continue;
                    }
                    let point = [p0, p1];
                    range_sum(&hist, &term, &point, direction, &mut got);

                    let mut start = [0usize; 2];
                    let mut last = [0usize; 2];
                    for d in 0..2 {
                        if direction & (1 << d) != 0 {
                            start[d] = point[d] + 1;
                            last[d] = 2;
                        } else {
                            last[d] = point[d];
                        }
                    }
                    box_sum(&raw, &term, &start, &last, &mut expect);
                    assert!((got.weight() - expect.weight()).abs() < 1e-9);
                    assert!((got.grad()[0] - expect.grad()[0]).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn fast_totals_three_dimensional() {
        let term = Term::new(vec![
            Feature::new(2, 0).unwrap(),
            Feature::new(3, 1).unwrap(),
            Feature::new(2, 2).unwrap(),
        ])
        .unwrap();
        let n_cells = term.n_cells();
        // one case per cell, weight = cell index + 1
        let n_cases = n_cells;
        let mut cols = vec![Vec::new(), Vec::new(), Vec::new()];
        for cell in 0..n_cells as u32 {
            cols[0].push(cell % 2);
            cols[1].push((cell / 2) % 3);
            cols[2].push(cell / 6);
        }
        let bins: Vec<u32> = cols.concat();
        let matrix = BinMatrix::new(bins, n_cases, 3).unwrap();
        let packed = PackedTermData::from_dataset(&term, &matrix).unwrap();
        let gradients = Gradients::regression(vec![1.0; n_cases], n_cases, 1).unwrap();
        let bag: Vec<u32> = (1..=n_cases as u32).collect();

        let mut raw = Histogram::for_term(&term, 1, false).unwrap();
        build_histogram(&term, &packed, &bag, &gradients, &mut raw).unwrap();
        let mut hist = raw.clone();
        fast_totals(&mut hist, &term);

        // every cell equals the brute-force prefix sum
        let mut expect = Totals::new(1, false);
        let mut cell = 0usize;
        for k in 0..2 {
            for j in 0..3 {
                for i in 0..2 {
                    box_sum(&raw, &term, &[0, 0, 0], &[i, j, k], &mut expect);
                    assert_eq!(hist.weight(cell), expect.weight());
                    cell += 1;
                }
            }
        }
    }
}
