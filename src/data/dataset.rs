//! Raw training inputs: the discretized bin matrix and per-case residuals.

use crate::error::{CoreError, Result};

// =============================================================================
// BinMatrix
// =============================================================================

/// Column-major matrix of raw bin indices, one column per input feature.
///
/// Values are validated against each feature's alphabet lazily, at the point
/// where a term's packed store is constructed; the matrix itself only checks
/// its own shape.
#[derive(Clone, Debug)]
pub struct BinMatrix {
    bins: Vec<u32>,
    n_cases: usize,
    n_features: usize,
}

impl BinMatrix {
    /// Wrap a column-major buffer of `n_cases * n_features` bin indices.
    pub fn new(bins: Vec<u32>, n_cases: usize, n_features: usize) -> Result<Self> {
        if n_cases == 0 {
            return Err(CoreError::InvalidInput("bin matrix needs at least one case"));
        }
        if bins.len() != n_cases * n_features {
            return Err(CoreError::InvalidInput("bin matrix length does not match its shape"));
        }
        Ok(Self { bins, n_cases, n_features })
    }

    /// Number of cases (rows).
    #[inline]
    pub fn n_cases(&self) -> usize {
        self.n_cases
    }

    /// Number of feature columns.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// The raw bin column for feature `data_index`.
    #[inline]
    pub fn column(&self, data_index: usize) -> &[u32] {
        let start = data_index * self.n_cases;
        &self.bins[start..start + self.n_cases]
    }
}

// =============================================================================
// Gradients
// =============================================================================

/// Per-case training signals for one boosting round.
///
/// Each case carries a residual vector of length `vlen` (the gradient of the
/// loss at the current prediction). Classification additionally carries a
/// hessian proxy per component, which becomes the denominator of split scores
/// and region predictions; regression leaves `hess` empty and divides by the
/// accumulated bag weight instead.
#[derive(Clone, Debug)]
pub struct Gradients {
    vlen: usize,
    n_cases: usize,
    grad: Vec<f64>,
    hess: Option<Vec<f64>>,
}

impl Gradients {
    /// Regression signals: residuals only.
    pub fn regression(grad: Vec<f64>, n_cases: usize, vlen: usize) -> Result<Self> {
        Self::validate(&grad, n_cases, vlen)?;
        Ok(Self { vlen, n_cases, grad, hess: None })
    }

    /// Classification signals: residuals plus hessian proxies.
    ///
    /// `vlen` is 1 for binary classification (collapsed to one logit) and the
    /// class count for K-way classification with K >= 3.
    pub fn classification(grad: Vec<f64>, hess: Vec<f64>, n_cases: usize, vlen: usize) -> Result<Self> {
        Self::validate(&grad, n_cases, vlen)?;
        Self::validate(&hess, n_cases, vlen)?;
        Ok(Self { vlen, n_cases, grad, hess: Some(hess) })
    }

    fn validate(values: &[f64], n_cases: usize, vlen: usize) -> Result<()> {
        if vlen == 0 {
            return Err(CoreError::InvalidInput("vector length must be positive"));
        }
        if values.len() != n_cases * vlen {
            return Err(CoreError::InvalidInput("signal length does not match case count"));
        }
        Ok(())
    }

    /// Residual vector length.
    #[inline]
    pub fn vlen(&self) -> usize {
        self.vlen
    }

    /// Number of cases.
    #[inline]
    pub fn n_cases(&self) -> usize {
        self.n_cases
    }

    /// Whether hessian proxies are present (classification).
    #[inline]
    pub fn has_hessians(&self) -> bool {
        self.hess.is_some()
    }

    /// Residuals for `case`, length `vlen`.
    #[inline]
    pub fn grad(&self, case: usize) -> &[f64] {
        &self.grad[case * self.vlen..(case + 1) * self.vlen]
    }

    /// Hessian proxies for `case`, length `vlen`. Empty slice for regression.
    #[inline]
    pub fn hess(&self, case: usize) -> &[f64] {
        match &self.hess {
            Some(hess) => &hess[case * self.vlen..(case + 1) * self.vlen],
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_matrix_shape_is_checked() {
        assert!(BinMatrix::new(vec![0, 1, 2], 2, 2).is_err());
        let m = BinMatrix::new(vec![0, 1, 2, 3], 2, 2).unwrap();
        assert_eq!(m.column(1), &[2, 3]);
    }

    #[test]
    fn gradients_length_is_checked() {
        assert!(Gradients::regression(vec![1.0; 6], 3, 2).is_ok());
        assert!(Gradients::regression(vec![1.0; 5], 3, 2).is_err());
        assert!(Gradients::classification(vec![1.0; 3], vec![1.0; 2], 3, 1).is_err());
    }

    #[test]
    fn gradients_per_case_views() {
        let g = Gradients::classification(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.1, 0.2, 0.3, 0.4],
            2,
            2,
        )
        .unwrap();
        assert_eq!(g.grad(1), &[3.0, 4.0]);
        assert_eq!(g.hess(1), &[0.3, 0.4]);
        assert!(g.has_hessians());
    }
}
