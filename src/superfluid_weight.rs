//! Superfluid weight of a BdG mean-field state, split into its conventional (intraband) and
//! geometric (interband) contributions,
//! $$D_{\mu\nu}=\frac1{N_k}\sum_{\bm k}\sum_{mnpq}C_{mnpq}(\bm k)\,
//! j^\mu_{mn}(\bm k)\,j^\nu_{qp}(-\bm k),$$
//! with the current operator $j^\mu_{mn}(\bm k)=\bra{m\bm k}\partial_\mu H(\bm k)\ket{n\bm k}$ in
//! the Bloch basis and the coherence factor
//! $$C_{mnpq}=2\sum_{ij}\frac{f(E_i)-f(E_j)}{E_j-E_i}\,
//! w^{+*}_{im}w^+_{jn}w^{-*}_{jp}w^-_{iq}.$$
use crate::Direction;
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::kpoints::{check_finite, negate};
use crate::linalg::conjugate;
use crate::math::{fermi_dirac, fermi_dirac_derivative};
use log::debug;
use ndarray::prelude::*;
use num_complex::Complex;
use rayon::prelude::*;
use std::collections::HashMap;

/// Quasiparticle energies closer than this are treated as degenerate.
pub const DEGENERACY_TOLERANCE: f64 = 1e-10;
/// k-points are identified after rounding to this resolution.
const K_RESOLUTION: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SuperfluidWeight {
    /// Terms with `m == n` and `p == q`, indexed `[μ, ν]`.
    pub conventional: Array2<Complex<f64>>,
    /// All other terms.
    pub geometric: Array2<Complex<f64>>,
}

impl SuperfluidWeight {
    pub fn total(&self) -> Array2<Complex<f64>> {
        &self.conventional + &self.geometric
    }
}

/// Distinct k-points of `k` (up to [`K_RESOLUTION`]) and how often each occurs.
fn unique_k_points(k: &Array2<f64>) -> (Array2<f64>, Vec<usize>) {
    let mut index: HashMap<[i64; 2], usize> = HashMap::new();
    let mut rows: Vec<usize> = Vec::new();
    let mut multiplicity: Vec<usize> = Vec::new();
    for (i, kk) in k.outer_iter().enumerate() {
        let key = [
            (kk[0] / K_RESOLUTION).round() as i64,
            (kk[1] / K_RESOLUTION).round() as i64,
        ];
        match index.get(&key) {
            Some(&u) => multiplicity[u] += 1,
            None => {
                index.insert(key, rows.len());
                rows.push(i);
                multiplicity.push(1);
            }
        }
    }
    (k.select(Axis(0), &rows), multiplicity)
}

/// $\langle m|M|n\rangle$ for all Bloch columns of `bloch`.
fn band_projection(
    bloch: &ArrayView2<Complex<f64>>,
    m: &ArrayView2<Complex<f64>>,
) -> Array2<Complex<f64>> {
    conjugate(bloch).dot(m).dot(bloch)
}

/// $C_{mnpq}$ at one k-point.
///
/// `w_plus[[m, i]]` projects the particle part of BdG state `i` on Bloch state `m` at `k`,
/// `w_minus[[m, i]]` its hole part on the time-reversed Bloch state `m` at `-k`.
pub fn coherence_factors(
    energies: &ArrayView1<f64>,
    psi: &ArrayView2<Complex<f64>>,
    bloch_k: &ArrayView2<Complex<f64>>,
    bloch_minus_k: &ArrayView2<Complex<f64>>,
    beta: f64,
) -> Array4<Complex<f64>> {
    let n = bloch_k.nrows();
    let w_plus = conjugate(bloch_k).dot(&psi.slice(s![0..n, ..]));
    let w_minus = bloch_minus_k.t().dot(&psi.slice(s![n..2 * n, ..]));
    let occupation = energies.mapv(|e| fermi_dirac(e, beta));

    let mut c = Array4::<Complex<f64>>::zeros((n, n, n, n));
    for i in 0..2 * n {
        for j in 0..2 * n {
            let coefficient = if (energies[i] - energies[j]).abs() < DEGENERACY_TOLERANCE {
                -fermi_dirac_derivative(energies[i], beta)
            } else {
                (occupation[i] - occupation[j]) / (energies[j] - energies[i])
            };
            if coefficient == 0.0 {
                continue;
            }
            for ((m, nn, p, q), x) in c.indexed_iter_mut() {
                *x += 2.0
                    * coefficient
                    * w_plus[[m, i]].conj()
                    * w_plus[[nn, j]]
                    * w_minus[[p, j]].conj()
                    * w_minus[[q, i]];
            }
        }
    }
    c
}

/// Superfluid weight of the current mean-field state of `h` on the grid `k`.
///
/// Coherence factors are computed once per distinct k-point; repeated k-points only add weight.
/// The pairing momentum must be zero.
pub fn calculate_superfluid_weight<H>(h: &H, k: &Array2<f64>) -> Result<SuperfluidWeight>
where
    H: Hamiltonian + ?Sized,
{
    if k.nrows() == 0 {
        return Err(BdgError::InvalidGrid("empty k-point grid".to_string()));
    }
    if h.has_pairing_momentum() {
        return Err(BdgError::invalid_parameter(
            "q",
            "the superfluid weight is only defined for zero pairing momentum",
        ));
    }
    check_finite(k)?;
    let beta = h.beta();
    let (unique, multiplicity) = unique_k_points(k);
    debug!("Superfluid weight: {} of {} k-points distinct", unique.nrows(), k.nrows());

    let minus = negate(&unique);
    let (bdg_energies, bdg_vectors) = h.diagonalize_bdg(&unique)?;
    let (_, bloch_k) = h.diagonalize_nonint(&unique)?;
    let (_, bloch_minus_k) = h.diagonalize_nonint(&minus)?;
    let der_k = [
        h.hamiltonian_derivative(&unique, Direction::X)?,
        h.hamiltonian_derivative(&unique, Direction::Y)?,
    ];
    let der_minus_k = [
        h.hamiltonian_derivative(&minus, Direction::X)?,
        h.hamiltonian_derivative(&minus, Direction::Y)?,
    ];

    let zero = || {
        (
            Array2::<Complex<f64>>::zeros((2, 2)),
            Array2::<Complex<f64>>::zeros((2, 2)),
        )
    };
    let (conventional, geometric) = (0..unique.nrows())
        .into_par_iter()
        .fold(zero, |(mut conv, mut geom), ik| {
            let bk = bloch_k.index_axis(Axis(0), ik);
            let bmk = bloch_minus_k.index_axis(Axis(0), ik);
            let c = coherence_factors(
                &bdg_energies.row(ik),
                &bdg_vectors.index_axis(Axis(0), ik),
                &bk,
                &bmk,
                beta,
            );
            let weight = multiplicity[ik] as f64;
            for mu in Direction::ALL {
                let j_up = band_projection(&bk, &der_k[mu.index()].index_axis(Axis(0), ik));
                for nu in Direction::ALL {
                    let j_down =
                        band_projection(&bmk, &der_minus_k[nu.index()].index_axis(Axis(0), ik));
                    for ((m, nn, p, q), cc) in c.indexed_iter() {
                        let s = cc * j_up[[m, nn]] * j_down[[q, p]] * weight;
                        if m == nn && p == q {
                            conv[[mu.index(), nu.index()]] += s;
                        } else {
                            geom[[mu.index(), nu.index()]] += s;
                        }
                    }
                }
            }
            (conv, geom)
        })
        .reduce(zero, |a, b| (a.0 + b.0, a.1 + b.1));
    let nk = k.nrows() as f64;
    Ok(SuperfluidWeight {
        conventional: conventional / nk,
        geometric: geometric / nk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Graphene, OneBand, TwoBand};
    use crate::parameters::{GrapheneParameters, OneBandParameters, TwoBandParameters};
    use ndarray::concatenate;

    fn graphene(delta: f64, beta: f64) -> Graphene {
        Graphene::new(GrapheneParameters {
            delta: Some(vec![[delta, 0.0], [delta, 0.0]]),
            beta,
            ..GrapheneParameters::example()
        })
        .unwrap()
    }

    #[test]
    fn test_weight_is_real_for_time_reversal_symmetric_model() {
        let model = graphene(0.3, 20.0);
        let k = model.lattice().generate_mp_grid(9, 9).unwrap();
        let d = calculate_superfluid_weight(&model, &k).unwrap();
        for z in d.conventional.iter().chain(d.geometric.iter()) {
            assert!(z.im.abs() < 1e-10, "imaginary part {}", z.im);
        }
        assert!(d.total().iter().any(|z| z.re.abs() > 1e-6));
    }

    #[test]
    fn test_one_band_has_no_geometric_part() {
        let model = OneBand::new(OneBandParameters {
            delta: Some(vec![[0.4, 0.0]]),
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = model.lattice().generate_mp_grid(8, 8).unwrap();
        let d = calculate_superfluid_weight(&model, &k).unwrap();
        assert!(d.geometric.iter().all(|z| z.norm() == 0.0));
        assert!(d.conventional.iter().all(|z| z.im.abs() < 1e-10));
        assert!(d.conventional[[0, 0]].norm() > 1e-6);
    }

    /// One band at q = 0: $C=\frac{\Delta^2}{E^2}\big[-f'(E)-\frac{\tanh(\beta E/2)}{2E}\big]$
    /// with $E=\sqrt{\xi^2+\Delta^2}$, so
    /// $D_{\mu\nu}=\frac1{N_k}\sum_k C\,\partial_\mu\xi(k)\,\partial_\nu\xi(-k)$.
    fn one_band_weight(model: &OneBand, k: &Array2<f64>, delta: f64, beta: f64) -> Array2<f64> {
        let xi = model.hamiltonian(k).unwrap();
        let minus = negate(k);
        let mut d = Array2::<f64>::zeros((2, 2));
        for mu in Direction::ALL {
            let dk = model.hamiltonian_derivative(k, mu).unwrap();
            for nu in Direction::ALL {
                let dmk = model.hamiltonian_derivative(&minus, nu).unwrap();
                for ik in 0..k.nrows() {
                    let e = (xi[[ik, 0, 0]].re.powi(2) + delta * delta).sqrt();
                    let c = delta * delta / (e * e)
                        * (-fermi_dirac_derivative(e, beta) - (0.5 * beta * e).tanh() / (2.0 * e));
                    d[[mu.index(), nu.index()]] += c * dk[[ik, 0, 0]].re * dmk[[ik, 0, 0]].re;
                }
            }
        }
        d / k.nrows() as f64
    }

    #[test]
    fn test_one_band_weight_at_finite_temperature() {
        let (delta, beta) = (0.4, 8.0);
        let model = OneBand::new(OneBandParameters {
            delta: Some(vec![[delta, 0.0]]),
            beta,
            chemical_potential: -0.3,
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = model.lattice().generate_mp_grid(10, 10).unwrap();
        let d = calculate_superfluid_weight(&model, &k).unwrap();
        let expected = one_band_weight(&model, &k, delta, beta);
        for (z, x) in d.conventional.iter().zip(expected.iter()) {
            assert!((z - Complex::new(*x, 0.0)).norm() < 1e-10, "{} vs {}", z, x);
        }
        // diamagnetic response is positive along both axes
        assert!(expected[[0, 0]] > 1e-3);
        assert!((expected[[0, 0]] - expected[[1, 1]]).abs() < 1e-10);
    }

    #[test]
    fn test_degenerate_copies_add_up() {
        // two identical bands: every BdG level is doubly degenerate, so the -f'(E) branch also
        // covers pairs of distinct states
        let (delta, beta) = (0.4, 8.0);
        let two = TwoBand::new(TwoBandParameters {
            delta: Some(vec![[delta, 0.0], [delta, 0.0]]),
            beta,
            ..TwoBandParameters::example()
        })
        .unwrap();
        let one = OneBand::new(OneBandParameters {
            delta: Some(vec![[delta, 0.0]]),
            beta,
            chemical_potential: TwoBandParameters::example().chemical_potential,
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = one.lattice().generate_mp_grid(8, 8).unwrap();
        let total = calculate_superfluid_weight(&two, &k).unwrap().total();
        let expected = one_band_weight(&one, &k, delta, beta);
        for (z, x) in total.iter().zip(expected.iter()) {
            assert!((z - Complex::new(2.0 * x, 0.0)).norm() < 1e-9, "{} vs {}", z, 2.0 * x);
        }
    }

    #[test]
    fn test_repeated_k_points_are_weighted() {
        let model = graphene(0.2, f64::INFINITY);
        let k = model.lattice().generate_mp_grid(5, 5).unwrap();
        let doubled = concatenate![Axis(0), k, k];
        let (unique, multiplicity) = unique_k_points(&doubled);
        assert_eq!(unique.nrows(), 25);
        assert!(multiplicity.iter().all(|m| *m == 2));

        let single = calculate_superfluid_weight(&model, &k).unwrap();
        let twice = calculate_superfluid_weight(&model, &doubled).unwrap();
        let diff = single.total() - twice.total();
        assert!(diff.iter().all(|z| z.norm() < 1e-10));
    }

    #[test]
    fn test_coherence_factor_hermitian_swap() {
        // C_nmqp = C_mnpq^*
        let model = graphene(0.25, 5.0);
        let k = array![[0.3, -0.7]];
        let (e, v) = model.diagonalize_bdg(&k).unwrap();
        let (_, bk) = model.diagonalize_nonint(&k).unwrap();
        let (_, bmk) = model.diagonalize_nonint(&negate(&k)).unwrap();
        let c = coherence_factors(
            &e.row(0),
            &v.index_axis(Axis(0), 0),
            &bk.index_axis(Axis(0), 0),
            &bmk.index_axis(Axis(0), 0),
            5.0,
        );
        for ((m, n, p, q), x) in c.indexed_iter() {
            assert!((c[[n, m, q, p]] - x.conj()).norm() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_pairing_momentum() {
        let mut model = graphene(0.2, 10.0);
        model.set_q(array![0.1, 0.0]).unwrap();
        let k = model.lattice().generate_mp_grid(3, 3).unwrap();
        assert!(calculate_superfluid_weight(&model, &k).is_err());
        assert!(calculate_superfluid_weight(&graphene(0.2, 10.0), &Array2::zeros((0, 2))).is_err());
    }
}
