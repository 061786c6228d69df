//! Provides the level-1 BLAS style helpers used by the solvers.
//!
//! All helpers work on equally sized `f64` slices; the shorter slice bounds the operation.

/// y := a*x + y
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// y := a*x + b*y
///
/// Consists of a scal(b, y) followed by an axpy(a, x, y).
pub fn axpby(alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
    scal(beta, y);
    axpy(alpha, x, y);
}

/// x := a*x
pub fn scal(alpha: f64, x: &mut [f64]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// Dot product of `x` and `y`.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Sum of squares of `x`.
pub fn sumsq(x: &[f64]) -> f64 {
    dot(x, x)
}

/// Sets every element of `x` to zero.
pub fn zero(x: &mut [f64]) {
    for xi in x.iter_mut() {
        *xi = 0f64;
    }
}
