//! The greedy two-level pair splitter.
//!
//! Given the prefix-summed histogram of a two-feature term, the splitter
//! searches the space of depth-two axis-aligned trees: a primary cut on one
//! axis, then an independent secondary cut on the other axis for each side of
//! the primary cut. Both primary-axis choices are explored; each candidate is
//! scored by summing the impurity gain of its four quadrants, read with two
//! range-sum queries per secondary candidate.
//!
//! The winner is emitted as a [`SegmentedTensor`] with one cut on the primary
//! axis and up to two on the secondary axis - two when the sides chose
//! different secondary positions, one when they agree. If no candidate scores
//! above zero the splitter emits a single-region constant-zero tensor and
//! reports the round as not improving, which is an advisory rather than an
//! error.

use log::trace;

use crate::data::{Gradients, PackedTermData, Term};
use crate::error::Result;
use crate::model::SegmentedTensor;
use crate::training::cache::TrainCache;
use crate::training::gain::{region_prediction, totals_score};
use crate::training::histogram::{build_histogram, Histogram, Totals};
use crate::training::totals::{fast_totals, range_sum, verify_range_sum};

/// What a pair round produced.
#[derive(Debug, Clone, Copy)]
pub struct PairOutcome {
    /// Total impurity gain of the emitted split, zero when nothing improved.
    pub gain: f64,
    /// False when the round emitted the constant-zero fallback tensor.
    pub improved: bool,
}

/// Scratch registers for one single-axis sweep.
struct SweepRegisters {
    low: Totals,
    high: Totals,
    best_low: Totals,
    best_high: Totals,
}

impl SweepRegisters {
    fn new(vlen: usize, has_hessians: bool) -> Self {
        Self {
            low: Totals::new(vlen, has_hessians),
            high: Totals::new(vlen, has_hessians),
            best_low: Totals::new(vlen, has_hessians),
            best_high: Totals::new(vlen, has_hessians),
        }
    }
}

/// The best two-level split seen so far, with its four quadrant sums.
struct BestSplit {
    score: f64,
    primary_axis: usize,
    primary_cut: usize,
    /// Secondary cut chosen on the primary-low side.
    low_cut: usize,
    /// Secondary cut chosen on the primary-high side.
    high_cut: usize,
    ll: Totals,
    lh: Totals,
    hl: Totals,
    hh: Totals,
}

impl BestSplit {
    fn new(vlen: usize, has_hessians: bool) -> Self {
        Self {
            score: f64::NEG_INFINITY,
            primary_axis: 0,
            primary_cut: 0,
            low_cut: 0,
            high_cut: 0,
            ll: Totals::new(vlen, has_hessians),
            lh: Totals::new(vlen, has_hessians),
            hl: Totals::new(vlen, has_hessians),
            hh: Totals::new(vlen, has_hessians),
        }
    }
}

/// Fit the best two-level split of a feature pair to the current residuals.
///
/// `bag` carries one bootstrap multiplicity per case (empty means unit
/// weights). The result is written into `out`, which must be a 2-dimensional
/// tensor with the gradients' vector length.
///
/// # Panics
///
/// Calling this with a term of dimensionality other than 2 is a programmer
/// error and panics.
pub fn train_pair(
    term: &Term,
    packed: &PackedTermData,
    bag: &[u32],
    gradients: &Gradients,
    cache: &mut TrainCache,
    out: &mut SegmentedTensor,
) -> Result<PairOutcome> {
    assert_eq!(term.n_dims(), 2, "the pair splitter requires a two-dimensional term");
    assert_eq!(out.n_dims(), 2, "output tensor dimensionality mismatch");
    assert_eq!(out.vlen(), gradients.vlen(), "output tensor vector length mismatch");

    let vlen = gradients.vlen();
    let has_hessians = gradients.has_hessians();

    cache.prepare(term, vlen, has_hessians)?;
    build_histogram(term, packed, bag, gradients, &mut cache.hist)?;
    cache.snapshot();
    fast_totals(&mut cache.hist, term);

    let hist = &cache.hist;
    let raw = &cache.raw;

    let mut regs = SweepRegisters::new(vlen, has_hessians);
    let mut side_ll = Totals::new(vlen, has_hessians);
    let mut side_lh = Totals::new(vlen, has_hessians);
    let mut best = BestSplit::new(vlen, has_hessians);
    let mut point = [0usize; 2];

    // primary cut on axis 0, secondary sweeps along axis 1
    for last_low in 0..term.n_bins(0) - 1 {
        point[0] = last_low;
        let (score_low, cut_low) = sweep_axis(hist, raw, term, &mut point, 0b00, 1, &mut regs);
        side_ll.copy_from(&regs.best_low);
        side_lh.copy_from(&regs.best_high);
        let (score_high, cut_high) = sweep_axis(hist, raw, term, &mut point, 0b01, 1, &mut regs);

        let score = score_low + score_high;
        if score > best.score {
            best.score = score;
            best.primary_axis = 0;
            best.primary_cut = last_low;
            best.low_cut = cut_low;
            best.high_cut = cut_high;
            best.ll.copy_from(&side_ll);
            best.lh.copy_from(&side_lh);
            best.hl.copy_from(&regs.best_low);
            best.hh.copy_from(&regs.best_high);
        }
    }

    // primary cut on axis 1, secondary sweeps along axis 0
    for last_low in 0..term.n_bins(1) - 1 {
        point[1] = last_low;
        let (score_low, cut_low) = sweep_axis(hist, raw, term, &mut point, 0b00, 0, &mut regs);
        side_ll.copy_from(&regs.best_low);
        side_lh.copy_from(&regs.best_high);
        let (score_high, cut_high) = sweep_axis(hist, raw, term, &mut point, 0b10, 0, &mut regs);

        let score = score_low + score_high;
        if score > best.score {
            best.score = score;
            best.primary_axis = 1;
            best.primary_cut = last_low;
            best.low_cut = cut_low;
            best.high_cut = cut_high;
            best.ll.copy_from(&side_ll);
            best.lh.copy_from(&side_lh);
            best.hl.copy_from(&regs.best_low);
            best.hh.copy_from(&regs.best_high);
        }
    }

    if best.score <= 0.0 {
        out.reset();
        trace!("pair sweep found no improving split");
        return Ok(PairOutcome { gain: 0.0, improved: false });
    }

    trace!(
        "pair split: primary axis {} at {}, secondary cuts {}/{}, gain {}",
        best.primary_axis,
        best.primary_cut,
        best.low_cut,
        best.high_cut,
        best.score
    );

    emit_tensor(out, &best, vlen)?;
    Ok(PairOutcome { gain: best.score, improved: true })
}

/// Find the best cut along `sweep_dim` within the box selected by
/// `direction_low` and the fixed coordinates of `point`.
///
/// Returns the best score together with the winning cut position; the
/// registers' `best_low`/`best_high` hold the winning side sums.
fn sweep_axis(
    hist: &Histogram,
    raw: &Histogram,
    term: &Term,
    point: &mut [usize; 2],
    direction_low: usize,
    sweep_dim: usize,
    regs: &mut SweepRegisters,
) -> (f64, usize) {
    debug_assert_eq!(direction_low & (1 << sweep_dim), 0);
    let direction_high = direction_low | (1 << sweep_dim);
    let n_bins = term.n_bins(sweep_dim);

    let mut best_score = f64::NEG_INFINITY;
    let mut best_cut = 0usize;
    for last_low in 0..n_bins - 1 {
        point[sweep_dim] = last_low;
        range_sum(hist, term, point, direction_low, &mut regs.low);
        verify_range_sum(raw, term, point, direction_low, &regs.low);
        range_sum(hist, term, point, direction_high, &mut regs.high);
        verify_range_sum(raw, term, point, direction_high, &regs.high);

        let score = totals_score(&regs.low) + totals_score(&regs.high);
        if score > best_score {
            best_score = score;
            best_cut = last_low;
            regs.best_low.copy_from(&regs.low);
            regs.best_high.copy_from(&regs.high);
        }
    }
    (best_score, best_cut)
}

/// Write the winning split's cuts and region predictions into `out`.
fn emit_tensor(out: &mut SegmentedTensor, best: &BestSplit, vlen: usize) -> Result<()> {
    let sec_axis = 1 - best.primary_axis;
    let sec_cuts: Vec<usize> = if best.low_cut == best.high_cut {
        vec![best.low_cut]
    } else {
        vec![best.low_cut.min(best.high_cut), best.low_cut.max(best.high_cut)]
    };
    let n_sec = sec_cuts.len() + 1;

    out.reset();
    out.ensure_value_capacity(2 * n_sec * vlen)?;
    out.set_cuts(best.primary_axis, &[best.primary_cut])?;
    out.set_cuts(sec_axis, &sec_cuts)?;

    // predictions per quadrant, indexed (primary side * 2 + secondary side)
    let mut pred = vec![0.0f64; 4 * vlen];
    for (q, totals) in [&best.ll, &best.lh, &best.hl, &best.hh].into_iter().enumerate() {
        for k in 0..vlen {
            pred[q * vlen + k] = region_prediction(totals.grad()[k], totals.denominator(k));
        }
    }

    let values = out.values_mut();
    for r_sec in 0..n_sec {
        let first_bin = if r_sec == 0 { 0 } else { sec_cuts[r_sec - 1] + 1 };
        for r_pri in 0..2 {
            // each primary side reads its own secondary cut
            let side_cut = if r_pri == 0 { best.low_cut } else { best.high_cut };
            let sec_side = (first_bin > side_cut) as usize;
            let region = if best.primary_axis == 0 {
                r_pri + 2 * r_sec
            } else {
                r_sec + n_sec * r_pri
            };
            let q = r_pri * 2 + sec_side;
            values[region * vlen..(region + 1) * vlen]
                .copy_from_slice(&pred[q * vlen..(q + 1) * vlen]);
        }
    }
    Ok(())
}
