//! Split scores and region predictions.
//!
//! One impurity-gain formula is used throughout a training run: a region
//! scores `sum_residual^2 / denominator` and predicts
//! `sum_residual / denominator`, where the denominator is the accumulated bag
//! weight for regression and the accumulated hessian sum for classification.
//! A region with a zero denominator contributes zero to both.

use crate::training::histogram::Totals;

/// Impurity gain of one region for one vector component.
#[inline]
pub fn region_score(sum_residual: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        sum_residual * sum_residual / denominator
    }
}

/// Prediction update of one region for one vector component.
#[inline]
pub fn region_prediction(sum_residual: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        sum_residual / denominator
    }
}

/// Score of a totals register, summed over vector components.
#[inline]
pub fn totals_score(totals: &Totals) -> f64 {
    let mut score = 0.0;
    for (k, &grad) in totals.grad().iter().enumerate() {
        score += region_score(grad, totals.denominator(k));
    }
    debug_assert!(score >= 0.0);
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominator_contributes_nothing() {
        assert_eq!(region_score(3.0, 0.0), 0.0);
        assert_eq!(region_prediction(3.0, 0.0), 0.0);
    }

    #[test]
    fn score_is_squared_residual_over_denominator() {
        assert_eq!(region_score(3.0, 3.0), 3.0);
        assert_eq!(region_score(-3.0, 3.0), 3.0);
        assert_eq!(region_prediction(-3.0, 3.0), -1.0);
    }

    #[test]
    fn totals_score_sums_components() {
        let mut totals = Totals::new(2, false);
        // weight 2, grads (4, -2): 16/2 + 4/2
        let term = crate::data::Term::new(vec![crate::data::Feature::new(2, 0).unwrap()]).unwrap();
        let matrix = crate::data::BinMatrix::new(vec![0, 0], 2, 1).unwrap();
        let packed = crate::data::PackedTermData::from_dataset(&term, &matrix).unwrap();
        let gradients =
            crate::data::Gradients::regression(vec![2.0, -1.0, 2.0, -1.0], 2, 2).unwrap();
        let mut hist = crate::training::histogram::Histogram::for_term(&term, 2, false).unwrap();
        crate::training::histogram::build_histogram(&term, &packed, &[], &gradients, &mut hist)
            .unwrap();
        totals.add_slot(&hist, 0);
        assert_eq!(totals_score(&totals), 8.0 + 2.0);
    }
}
