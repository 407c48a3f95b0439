//! Supercurrent density carried by a finite-momentum pairing state.
use crate::Direction;
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::math::fermi_dirac;
use ndarray::Zip;
use ndarray::prelude::*;
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;

/// $j_\mu=\frac2{N_k}\mathrm{Re}\sum_{\bm k}\sum_{ij}\sum_n\partial_\mu H_{ij}(\bm k)\,
/// \psi^*_{in}(\bm k)\,\psi_{jn}(\bm k)\,f(E_n(\bm k))$ over the particle components of the BdG
/// eigenstates, returned as `[j_x, j_y]`.
pub fn calculate_current_density<H>(h: &H, k: &Array2<f64>) -> Result<Array1<f64>>
where
    H: Hamiltonian + ?Sized,
{
    let nk = k.nrows();
    if nk == 0 {
        return Err(BdgError::InvalidGrid("empty k-point grid".to_string()));
    }
    let n = h.number_of_bands();
    let beta = h.beta();
    let (energies, vectors) = h.diagonalize_bdg(k)?;
    let der = [
        h.hamiltonian_derivative(k, Direction::X)?,
        h.hamiltonian_derivative(k, Direction::Y)?,
    ];
    let current = (0..nk)
        .into_par_iter()
        .fold(
            || Array1::<Complex<f64>>::zeros(2),
            |mut acc, ik| {
                let psi = vectors.index_axis(Axis(0), ik);
                let particle = psi.slice(s![0..n, ..]);
                // 单粒子密度矩阵 ρ_ji = Σ_n ψ*_in ψ_jn f(E_n)
                let mut rho = Array2::<Complex<f64>>::zeros((n, n));
                for (col, e) in energies.row(ik).iter().enumerate() {
                    let occupation = fermi_dirac(*e, beta);
                    if occupation == 0.0 {
                        continue;
                    }
                    for i in 0..n {
                        for j in 0..n {
                            rho[[j, i]] += particle[[i, col]].conj() * particle[[j, col]] * occupation;
                        }
                    }
                }
                for dir in Direction::ALL {
                    let d = der[dir.index()].index_axis(Axis(0), ik);
                    acc[dir.index()] += Zip::from(&d)
                        .and(&rho.t())
                        .fold(Complex::zero(), |s, a, b| s + a * b);
                }
                acc
            },
        )
        .reduce(|| Array1::<Complex<f64>>::zeros(2), |a, b| a + b);
    Ok(current.mapv(|z| 2.0 * z.re / nk as f64))
}
