//! Testing utilities.
//!
//! Assertion helpers shared by unit tests and the integration tests under
//! `tests/`. Float comparisons use absolute tolerances; the defaults suit
//! values of order one, which is what residual sums and predictions look
//! like in practice.

use approx::abs_diff_eq;

/// Default tolerance for floating point comparisons.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Assert that two floats are approximately equal.
///
/// # Panics
///
/// Panics if the absolute difference exceeds the tolerance.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_approx_eq!($left, $right, $crate::testing::DEFAULT_TOLERANCE)
    };
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left_val = $left;
        let right_val = $right;
        let tol = $tolerance;
        let diff = (left_val - right_val).abs();
        if diff > tol {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                left_val, right_val, diff, tol
            );
        }
    }};
}

/// Assert that two slices are elementwise approximately equal.
///
/// # Panics
///
/// Panics on length mismatch or any element differing beyond the tolerance.
pub fn assert_slices_approx_eq(left: &[f64], right: &[f64], tolerance: f64) {
    assert_eq!(left.len(), right.len(), "slice lengths differ");
    for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        assert!(
            abs_diff_eq!(*l, *r, epsilon = tolerance),
            "slices differ at index {}: {} vs {}",
            i,
            l,
            r
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_accepts_tiny_differences() {
        assert_approx_eq!(1.0f64, 1.0 + 1e-12);
        assert_approx_eq!(2.0f64, 2.5, 1.0);
    }

    #[test]
    #[should_panic(expected = "left ≈ right")]
    fn approx_eq_rejects_large_differences() {
        assert_approx_eq!(1.0f64, 2.0);
    }

    #[test]
    fn slice_comparison() {
        assert_slices_approx_eq(&[1.0, 2.0], &[1.0, 2.0 + 1e-12], 1e-9);
    }
}
