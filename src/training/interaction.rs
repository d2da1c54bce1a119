//! Interaction strength scoring for feature pairs.
//!
//! Before committing pair terms to a model, an outer driver ranks candidate
//! pairs by how much a single bivariate split would explain on the full
//! dataset. The score is the best four-quadrant impurity gain over every
//! `(c0, c1)` cut combination - the same gain formula the pair splitter
//! optimizes, but with one cut per axis and unit case weights.

use log::debug;

use crate::data::{Gradients, PackedTermData, Term};
use crate::error::Result;
use crate::training::cache::TrainCache;
use crate::training::gain::totals_score;
use crate::training::histogram::{build_histogram, Totals};
use crate::training::totals::{fast_totals, range_sum, verify_range_sum};

/// Score how strongly a feature pair interacts on the full dataset.
///
/// Returns the best single `(c0, c1)` split's summed quadrant gain.
///
/// # Panics
///
/// Calling this with a term of dimensionality other than 2 is a programmer
/// error and panics.
pub fn score_interaction_pair(
    term: &Term,
    packed: &PackedTermData,
    gradients: &Gradients,
    cache: &mut TrainCache,
) -> Result<f64> {
    assert_eq!(term.n_dims(), 2, "interaction scoring requires a two-dimensional term");

    cache.prepare(term, gradients.vlen(), gradients.has_hessians())?;
    build_histogram(term, packed, &[], gradients, &mut cache.hist)?;
    cache.snapshot();
    fast_totals(&mut cache.hist, term);

    let hist = &cache.hist;
    let raw = &cache.raw;

    let mut quadrants: Vec<Totals> = (0..4)
        .map(|_| Totals::new(gradients.vlen(), gradients.has_hessians()))
        .collect();

    let mut best = f64::NEG_INFINITY;
    let mut point = [0usize; 2];
    for last0 in 0..term.n_bins(0) - 1 {
        point[0] = last0;
        for last1 in 0..term.n_bins(1) - 1 {
            point[1] = last1;

            let mut score = 0.0;
            for (direction, totals) in quadrants.iter_mut().enumerate() {
                range_sum(hist, term, &point, direction, totals);
                verify_range_sum(raw, term, &point, direction, totals);
                score += totals_score(totals);
            }
            if score > best {
                best = score;
            }
        }
    }

    debug!("interaction score for pair: {}", best);
    Ok(best)
}
