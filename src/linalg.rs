//! Dense Hermitian eigensolver for `ndarray` matrices.
//!
//! The decomposition itself is done by `nalgebra`'s symmetric (Hermitian) QR algorithm; this
//! module only moves data between the two array types, sorts the spectrum ascending and keeps
//! the eigenvectors as matching columns, the same layout `eigh` returns in the rest of the crate.
use crate::error::{BdgError, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use num_complex::Complex;

/// Hermitian eigendecomposition $H=U\,\mathrm{diag}(E)\,U^\dagger$.
///
/// Only the lower triangle is read. Eigenvalues are returned in ascending order and column `n` of
/// the second array is the eigenvector of `E[n]`.
pub fn eigh<S>(x: &ArrayBase<S, Ix2>) -> Result<(Array1<f64>, Array2<Complex<f64>>)>
where
    S: Data<Elem = Complex<f64>>,
{
    let n = x.nrows();
    if x.ncols() != n {
        return Err(BdgError::DimensionMismatch {
            context: "eigh: matrix must be square".to_string(),
            expected: n,
            found: x.ncols(),
        });
    }
    if n == 0 {
        return Ok((Array1::zeros(0), Array2::zeros((0, 0))));
    }
    if x.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(BdgError::EigenDecomposition { size: n });
    }
    let m = DMatrix::<Complex<f64>>::from_fn(n, n, |i, j| x[[i, j]]);
    let eig = SymmetricEigen::try_new(m, f64::EPSILON, 1000 * n)
        .ok_or(BdgError::EigenDecomposition { size: n })?;
    // 按本征值从小到大排序
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let eval = Array1::from_iter(order.iter().map(|&i| eig.eigenvalues[i]));
    let mut evec = Array2::<Complex<f64>>::zeros((n, n));
    for (col, &i) in order.iter().enumerate() {
        for row in 0..n {
            evec[[row, col]] = eig.eigenvectors[(row, i)];
        }
    }
    Ok((eval, evec))
}

/// Eigenvalues only, ascending.
pub fn eigvalsh<S>(x: &ArrayBase<S, Ix2>) -> Result<Array1<f64>>
where
    S: Data<Elem = Complex<f64>>,
{
    eigh(x).map(|(eval, _)| eval)
}

/// Conjugate transpose $A^\dagger$.
#[inline(always)]
pub fn conjugate<S>(x: &ArrayBase<S, Ix2>) -> Array2<Complex<f64>>
where
    S: Data<Elem = Complex<f64>>,
{
    x.t().mapv(|z| z.conj())
}

/// Whether `x` equals its conjugate transpose within `tol` (absolute, element-wise).
pub fn is_hermitian<S>(x: &ArrayBase<S, Ix2>, tol: f64) -> bool
where
    S: Data<Elem = Complex<f64>>,
{
    if x.nrows() != x.ncols() {
        return false;
    }
    let n = x.nrows();
    for i in 0..n {
        for j in 0..=i {
            if (x[[i, j]] - x[[j, i]].conj()).norm() > tol {
                return false;
            }
        }
    }
    true
}
