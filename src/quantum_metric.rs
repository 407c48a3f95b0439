//! Quantum metric of normal-state bands,
//! $$g_{\mu\nu}=\frac1{N_k}\,\mathrm{Re}\sum_{\bm k}\sum_{b}\sum_{n\neq b}
//! \frac{\bra{b}\partial_\mu H\ket{n}\bra{n}\partial_\nu H\ket{b}}{(E_b-E_n)^2}.$$
use crate::Direction;
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::linalg::conjugate;
use ndarray::prelude::*;
use num_complex::Complex;
use rayon::prelude::*;

/// Band pairs closer in energy than this are left out of the sum.
pub const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Quantum metric summed over `bands`, indexed `[μ, ν]`.
///
/// Degenerate band pairs, where the expression diverges, are skipped.
pub fn calculate_quantum_metric<H>(h: &H, k: &Array2<f64>, bands: &[usize]) -> Result<Array2<f64>>
where
    H: Hamiltonian + ?Sized,
{
    let n = h.number_of_bands();
    if let Some(&band) = bands.iter().find(|&&b| b >= n) {
        return Err(BdgError::InvalidBand {
            band,
            number_of_bands: n,
        });
    }
    if k.nrows() == 0 {
        return Err(BdgError::InvalidGrid("empty k-point grid".to_string()));
    }
    let (energies, bloch) = h.diagonalize_nonint(k)?;
    let der = [
        h.hamiltonian_derivative(k, Direction::X)?,
        h.hamiltonian_derivative(k, Direction::Y)?,
    ];

    let tensor = (0..k.nrows())
        .into_par_iter()
        .fold(
            || Array2::<Complex<f64>>::zeros((2, 2)),
            |mut acc, ik| {
                let u = bloch.index_axis(Axis(0), ik);
                let ud = conjugate(&u);
                // 速度算符在能带基下的矩阵元
                let v = [
                    ud.dot(&der[0].index_axis(Axis(0), ik)).dot(&u),
                    ud.dot(&der[1].index_axis(Axis(0), ik)).dot(&u),
                ];
                let e = energies.row(ik);
                for &b in bands {
                    for m in 0..n {
                        let gap = e[b] - e[m];
                        if m == b || gap.abs() < DEGENERACY_TOLERANCE {
                            continue;
                        }
                        for mu in 0..2 {
                            for nu in 0..2 {
                                acc[[mu, nu]] += v[mu][[b, m]] * v[nu][[m, b]] / (gap * gap);
                            }
                        }
                    }
                }
                acc
            },
        )
        .reduce(|| Array2::<Complex<f64>>::zeros((2, 2)), |a, b| a + b);
    Ok(tensor.mapv(|z| z.re) / k.nrows() as f64)
}
