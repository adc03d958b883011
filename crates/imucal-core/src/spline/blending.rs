//! Uniform B-spline blending matrices and power-basis vectors.
//!
//! The matrix entries follow the closed form for uniform B-splines; the
//! cumulative variant accumulates rows so that knot differences (rather than
//! knots themselves) are blended, which is what the Lie-group formulation
//! needs.

use nalgebra::{DMatrix, DVector, RealField};

fn binomial(n: usize, k: usize) -> f64 {
    let mut result = 1.0;
    for i in 0..k {
        result *= (n - i) as f64 / (i + 1) as f64;
    }
    result
}

/// Blending matrix `M` for a uniform B-spline of the given order.
///
/// Evaluation coefficients are `M * (1, u, u^2, ...)^T`. With `cumulative`
/// set, row `i` accumulates all rows `j > i`, yielding the cumulative form
/// whose first coefficient is identically 1.
pub fn blending_matrix(order: usize, cumulative: bool) -> DMatrix<f64> {
    assert!(order >= 2, "blending matrix needs order >= 2");
    let n = order;
    let mut m = DMatrix::zeros(n, n);

    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0;
            for s in j..n {
                let sign = if (s - j) % 2 == 0 { 1.0 } else { -1.0 };
                sum += sign
                    * binomial(n, s - j)
                    * ((n - s - 1) as f64).powi((n - 1 - i) as i32);
            }
            m[(j, i)] = binomial(n - 1, n - 1 - i) * sum;
        }
    }

    if cumulative {
        for i in 0..n {
            for j in (i + 1)..n {
                let row_j = m.row(j).clone_owned();
                let mut row_i = m.row_mut(i);
                row_i += row_j;
            }
        }
    }

    let mut factorial = 1.0;
    for i in 2..n {
        factorial *= i as f64;
    }
    m / factorial
}

/// Power-basis vector `(1, u, u^2, ...)` of the given length, differentiated
/// `derivative` times with respect to `u`.
///
/// Scaling by `inv_dt^derivative` is left to the caller.
pub fn power_basis<T: RealField>(order: usize, derivative: usize, u: T) -> DVector<T> {
    let mut p = DVector::zeros(order);
    if derivative >= order {
        return p;
    }
    let mut u_pow = T::one();
    for i in derivative..order {
        let mut c = 1.0;
        for k in 0..derivative {
            c *= (i - k) as f64;
        }
        p[i] = u_pow.clone() * T::from_f64(c).unwrap();
        u_pow *= u.clone();
    }
    p
}

/// Blend a power-basis vector through an `f64` blending matrix at a generic
/// scalar type: `coeff_j = sum_i M[j][i] * p[i]`.
pub fn blend_coeffs<T: RealField>(m: &DMatrix<f64>, p: &DVector<T>) -> Vec<T> {
    let n = m.nrows();
    let mut coeffs = Vec::with_capacity(n);
    for j in 0..n {
        let mut acc = T::zero();
        for i in 0..n {
            acc += p[i].clone() * T::from_f64(m[(j, i)]).unwrap();
        }
        coeffs.push(acc);
    }
    coeffs
}
