//! The [`Hamiltonian`] trait: every lattice model only supplies its Bloch Hamiltonian, the
//! momentum derivative and its mean-field state, the BdG construction, the diagonalization and
//! the gap equation are written once here.
use crate::Direction;
use crate::error::{BdgError, Result};
use crate::kpoints::{check_finite, shift_minus};
use crate::lattice::BaseLattice;
use crate::linalg::eigh;
use crate::math::{fermi_dirac, gauss};
use crate::parameters::ModelParameters;
use ndarray::prelude::*;
use ndarray::{Zip, s};
use num_complex::Complex;
use rayon::prelude::*;

/// Interaction, temperature, pairing momentum and order parameter of a model.
///
/// This is the only mutable part of a model. Every setter validates its input, a rejected
/// update leaves the state untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanFieldState {
    delta: Array1<Complex<f64>>,
    hubbard_int: Array1<f64>,
    beta: f64,
    q: Array1<f64>,
}

fn check_beta(beta: f64) -> Result<f64> {
    if beta.is_nan() {
        return Err(BdgError::invalid_parameter("beta", "must not be NaN"));
    }
    if beta <= 0.0 {
        return Err(BdgError::invalid_parameter(
            "beta",
            format!("must be positive (or inf), got {}", beta),
        ));
    }
    Ok(beta)
}

fn check_q(q: &Array1<f64>) -> Result<()> {
    if q.len() != 2 {
        return Err(BdgError::DimensionMismatch {
            context: "pairing momentum q".to_string(),
            expected: 2,
            found: q.len(),
        });
    }
    if q.iter().any(|x| !x.is_finite()) {
        return Err(BdgError::invalid_parameter("q", "must not be NaN or Infinity"));
    }
    Ok(())
}

impl MeanFieldState {
    pub fn new(
        number_of_bands: usize,
        hubbard_int_orbital_basis: &[f64],
        beta: f64,
        q: Option<[f64; 2]>,
        delta: Option<&[[f64; 2]]>,
    ) -> Result<Self> {
        if hubbard_int_orbital_basis.len() != number_of_bands {
            return Err(BdgError::invalid_parameter(
                "hubbard_int_orbital_basis",
                format!(
                    "expected {} entries (one per band), got {}",
                    number_of_bands,
                    hubbard_int_orbital_basis.len()
                ),
            ));
        }
        if hubbard_int_orbital_basis.iter().any(|u| !u.is_finite()) {
            return Err(BdgError::invalid_parameter(
                "hubbard_int_orbital_basis",
                "must not be NaN or Infinity",
            ));
        }
        let q = arr1(&q.unwrap_or([0.0, 0.0]));
        check_q(&q)?;
        let mut state = MeanFieldState {
            delta: Array1::zeros(number_of_bands),
            hubbard_int: Array1::from_vec(hubbard_int_orbital_basis.to_vec()),
            beta: check_beta(beta)?,
            q,
        };
        if let Some(d) = delta {
            state.set_delta(Array1::from_iter(d.iter().map(|[re, im]| Complex::new(*re, *im))))?;
        }
        Ok(state)
    }

    pub fn delta(&self) -> &Array1<Complex<f64>> {
        &self.delta
    }

    /// Replaces the whole order parameter; wrong length or non-finite entries are rejected.
    pub fn set_delta(&mut self, delta: Array1<Complex<f64>>) -> Result<()> {
        if delta.len() != self.hubbard_int.len() {
            return Err(BdgError::DimensionMismatch {
                context: "delta_orbital_basis".to_string(),
                expected: self.hubbard_int.len(),
                found: delta.len(),
            });
        }
        if delta.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
            return Err(BdgError::invalid_parameter(
                "delta",
                "must not be NaN or Infinity",
            ));
        }
        self.delta = delta;
        Ok(())
    }

    pub fn hubbard_int(&self) -> &Array1<f64> {
        &self.hubbard_int
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn set_beta(&mut self, beta: f64) -> Result<()> {
        self.beta = check_beta(beta)?;
        Ok(())
    }

    pub fn q(&self) -> &Array1<f64> {
        &self.q
    }

    pub fn set_q(&mut self, q: Array1<f64>) -> Result<()> {
        check_q(&q)?;
        self.q = q;
        Ok(())
    }

    /// `delta` as `[re, im]` pairs, the layout used by the configuration and the save records.
    pub fn delta_pairs(&self) -> Vec<[f64; 2]> {
        self.delta.iter().map(|z| [z.re, z.im]).collect()
    }
}

/// Band energies along a k-grid, optionally weighted by the overlap with two reference orbitals.
#[derive(Debug, Clone)]
pub struct BandStructure {
    /// `(nk, N)` normal-state energies, ascending per k.
    pub energies: Array2<f64>,
    /// `|<o_0|n>|^2 - |<o_1|n>|^2` per band, present when overlaps were requested.
    pub weights: Option<Array2<f64>>,
}

/// Diagonalizes every matrix of a `(nk, n, n)` stack independently.
///
/// Returns the `(nk, n)` eigenvalues (ascending per k) and the `(nk, n, n)` eigenvectors, column
/// `m` of slice `k` belonging to eigenvalue `[k, m]`.
pub fn diagonalize_all(mats: &Array3<Complex<f64>>) -> Result<(Array2<f64>, Array3<Complex<f64>>)> {
    let (nk, n, _) = mats.dim();
    let solved = mats
        .outer_iter()
        .into_par_iter()
        .map(|m| eigh(&m))
        .collect::<Result<Vec<_>>>()?;
    let mut band = Array2::<f64>::zeros((nk, n));
    let mut vectors = Array3::<Complex<f64>>::zeros((nk, n, n));
    for (ik, (eval, evec)) in solved.into_iter().enumerate() {
        band.row_mut(ik).assign(&eval);
        vectors.index_axis_mut(Axis(0), ik).assign(&evec);
    }
    Ok((band, vectors))
}

/// Multiplies `delta` by $e^{-i\varphi}$ where $\varphi$ is the phase of its largest component.
pub fn remove_global_phase(delta: &mut Array1<Complex<f64>>) {
    let largest = delta
        .iter()
        .copied()
        .max_by(|a, b| a.norm().total_cmp(&b.norm()));
    if let Some(z) = largest {
        if z.norm() > 0.0 {
            let phase = Complex::from_polar(1.0, -z.arg());
            delta.mapv_inplace(|d| d * phase);
        }
    }
}

pub trait Hamiltonian: Send + Sync {
    /// Model name, the tag used in configuration files and save records.
    fn name(&self) -> &'static str;
    /// Number of orbitals N, the BdG matrix is 2N × 2N.
    fn number_of_bands(&self) -> usize;
    /// Bloch Hamiltonian at one (finite) Cartesian k-point.
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>>;
    /// $\partial H/\partial k_{\text{direction}}$ at one Cartesian k-point.
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>>;
    fn mean_field(&self) -> &MeanFieldState;
    fn mean_field_mut(&mut self) -> &mut MeanFieldState;
    fn lattice(&self) -> Box<dyn BaseLattice>;
    /// Scalar parameters together with the current `beta`, `q` and `delta`.
    fn parameters(&self) -> ModelParameters;

    fn delta_orbital_basis(&self) -> &Array1<Complex<f64>> {
        self.mean_field().delta()
    }
    fn set_delta_orbital_basis(&mut self, delta: Array1<Complex<f64>>) -> Result<()> {
        self.mean_field_mut().set_delta(delta)
    }
    fn hubbard_int_orbital_basis(&self) -> &Array1<f64> {
        self.mean_field().hubbard_int()
    }
    fn beta(&self) -> f64 {
        self.mean_field().beta()
    }
    fn set_beta(&mut self, beta: f64) -> Result<()> {
        self.mean_field_mut().set_beta(beta)
    }
    fn q(&self) -> &Array1<f64> {
        self.mean_field().q()
    }
    fn set_q(&mut self, q: Array1<f64>) -> Result<()> {
        self.mean_field_mut().set_q(q)
    }
    fn has_pairing_momentum(&self) -> bool {
        self.q().iter().any(|x| *x != 0.0)
    }

    /// $H(\bm k)$ for every row of `k`, shape `(nk, N, N)`.
    fn hamiltonian(&self, k: &Array2<f64>) -> Result<Array3<Complex<f64>>> {
        check_grid(k)?;
        let n = self.number_of_bands();
        let mut hamk = Array3::<Complex<f64>>::zeros((k.nrows(), n, n));
        Zip::from(hamk.outer_iter_mut())
            .and(k.outer_iter())
            .par_for_each(|mut h, kk| h.assign(&self.hamiltonian_onek(&kk)));
        Ok(hamk)
    }

    /// $\partial_{\text{direction}} H(\bm k)$ for every row of `k`, shape `(nk, N, N)`.
    fn hamiltonian_derivative(
        &self,
        k: &Array2<f64>,
        direction: Direction,
    ) -> Result<Array3<Complex<f64>>> {
        check_grid(k)?;
        let n = self.number_of_bands();
        let mut der = Array3::<Complex<f64>>::zeros((k.nrows(), n, n));
        Zip::from(der.outer_iter_mut())
            .and(k.outer_iter())
            .par_for_each(|mut h, kk| h.assign(&self.hamiltonian_derivative_onek(&kk, direction)));
        Ok(der)
    }

    /// The 2N × 2N BdG matrices, shape `(nk, 2N, 2N)`.
    ///
    /// The hole block is $-H^*(\bm q-\bm k)$, the anomalous block $\Delta_i$ sits at `[N+i, i]`
    /// and its conjugate at `[i, N+i]`.
    fn bdg_hamiltonian(&self, k: &Array2<f64>) -> Result<Array3<Complex<f64>>> {
        let n = self.number_of_bands();
        let h_k = self.hamiltonian(k)?;
        let h_qk = self.hamiltonian(&shift_minus(k, self.q())?)?;
        let delta = self.delta_orbital_basis();
        let mut bdg = Array3::<Complex<f64>>::zeros((k.nrows(), 2 * n, 2 * n));
        Zip::from(bdg.outer_iter_mut())
            .and(h_k.outer_iter())
            .and(h_qk.outer_iter())
            .par_for_each(|mut b, hk, hqk| {
                b.slice_mut(s![0..n, 0..n]).assign(&hk);
                b.slice_mut(s![n..2 * n, n..2 * n])
                    .assign(&hqk.mapv(|z| -z.conj()));
                for i in 0..n {
                    b[[n + i, i]] = delta[i];
                    b[[i, n + i]] = delta[i].conj();
                }
            });
        Ok(bdg)
    }

    /// Momentum derivative of [`Hamiltonian::bdg_hamiltonian`]: block diagonal with
    /// $\partial H(\bm k)$ and $\partial H^*(\bm q-\bm k)$ (the sign of the hole block flips
    /// with the inner derivative of $\bm q-\bm k$).
    fn bdg_hamiltonian_derivative(
        &self,
        k: &Array2<f64>,
        direction: Direction,
    ) -> Result<Array3<Complex<f64>>> {
        let n = self.number_of_bands();
        let d_k = self.hamiltonian_derivative(k, direction)?;
        let d_qk = self.hamiltonian_derivative(&shift_minus(k, self.q())?, direction)?;
        let mut bdg = Array3::<Complex<f64>>::zeros((k.nrows(), 2 * n, 2 * n));
        Zip::from(bdg.outer_iter_mut())
            .and(d_k.outer_iter())
            .and(d_qk.outer_iter())
            .par_for_each(|mut b, dk, dqk| {
                b.slice_mut(s![0..n, 0..n]).assign(&dk);
                b.slice_mut(s![n..2 * n, n..2 * n])
                    .assign(&dqk.mapv(|z| z.conj()));
            });
        Ok(bdg)
    }

    /// Normal-state bands and Bloch vectors.
    fn diagonalize_nonint(&self, k: &Array2<f64>) -> Result<(Array2<f64>, Array3<Complex<f64>>)> {
        diagonalize_all(&self.hamiltonian(k)?)
    }

    /// BdG quasiparticle energies `(nk, 2N)` and eigenvectors `(nk, 2N, 2N)`.
    fn diagonalize_bdg(&self, k: &Array2<f64>) -> Result<(Array2<f64>, Array3<Complex<f64>>)> {
        diagonalize_all(&self.bdg_hamiltonian(k)?)
    }

    /// One step of the gap equation, returns the new order parameter and leaves the model alone.
    ///
    /// $$\Delta_i=\Big[-\frac{U_i}{N_k}\sum_{\bm k}\sum_{j}\psi^*_{ij}(\bm k)\,\psi_{N+i,j}(\bm k)\,f(E_j)\Big]^*,$$
    /// after which the phase of the largest component is removed. The BdG matrix at `k` already
    /// pairs `k` with `q - k`, so the occupations come from the spectrum at `k` for any `q`.
    fn gap_equation(&self, k: &Array2<f64>) -> Result<Array1<Complex<f64>>> {
        let n = self.number_of_bands();
        let nk = k.nrows();
        if nk == 0 {
            return Err(BdgError::InvalidGrid("empty k-point grid".to_string()));
        }
        let beta = self.beta();
        let (energies, vectors) = self.diagonalize_bdg(k)?;
        let u = self.hubbard_int_orbital_basis();
        let sum = (0..nk)
            .into_par_iter()
            .fold(
                || Array1::<Complex<f64>>::zeros(n),
                |mut acc, ik| {
                    let psi = vectors.index_axis(Axis(0), ik);
                    for j in 0..2 * n {
                        let occupation = fermi_dirac(energies[[ik, j]], beta);
                        if occupation == 0.0 {
                            continue;
                        }
                        for i in 0..n {
                            acc[i] += psi[[i, j]].conj() * psi[[n + i, j]] * occupation;
                        }
                    }
                    acc
                },
            )
            .reduce(|| Array1::<Complex<f64>>::zeros(n), |a, b| a + b);
        let mut delta = Array1::from_iter(
            sum.iter()
                .zip(u.iter())
                .map(|(s, ui)| (*s * (-*ui / nk as f64)).conj()),
        );
        remove_global_phase(&mut delta);
        Ok(delta)
    }

    /// Normal-state band structure; with `overlaps = Some((o0, o1))` each state is also weighted
    /// by $|\langle o_0|n\rangle|^2-|\langle o_1|n\rangle|^2$.
    fn calculate_bandstructure(
        &self,
        k: &Array2<f64>,
        overlaps: Option<(&Array1<Complex<f64>>, &Array1<Complex<f64>>)>,
    ) -> Result<BandStructure> {
        let n = self.number_of_bands();
        let (energies, vectors) = self.diagonalize_nonint(k)?;
        let weights = match overlaps {
            None => None,
            Some((o0, o1)) => {
                if o0.len() != n || o1.len() != n {
                    return Err(BdgError::DimensionMismatch {
                        context: "band structure overlaps".to_string(),
                        expected: n,
                        found: o0.len().min(o1.len()),
                    });
                }
                let mut w = Array2::<f64>::zeros((k.nrows(), n));
                Zip::from(w.outer_iter_mut())
                    .and(vectors.outer_iter())
                    .par_for_each(|mut w, v| {
                        for (b, col) in v.axis_iter(Axis(1)).enumerate() {
                            let p0: Complex<f64> =
                                o0.iter().zip(col.iter()).map(|(o, c)| o.conj() * c).sum();
                            let p1: Complex<f64> =
                                o1.iter().zip(col.iter()).map(|(o, c)| o.conj() * c).sum();
                            w[b] = p0.norm_sqr() - p1.norm_sqr();
                        }
                    });
                Some(w)
            }
        };
        Ok(BandStructure { energies, weights })
    }

    /// Gaussian-broadened BdG density of states per k-point at every energy of `energies`.
    fn density_of_states(
        &self,
        k: &Array2<f64>,
        energies: &Array1<f64>,
        broadening: f64,
    ) -> Result<Array1<f64>> {
        if !(broadening > 0.0) || !broadening.is_finite() {
            return Err(BdgError::invalid_parameter(
                "broadening",
                "must be a positive finite number",
            ));
        }
        let (band, _) = self.diagonalize_bdg(k)?;
        let nk = k.nrows() as f64;
        let dos = band
            .outer_iter()
            .into_par_iter()
            .fold(
                || Array1::<f64>::zeros(energies.len()),
                |mut acc, eval| {
                    for e in eval.iter() {
                        Zip::from(&mut acc)
                            .and(energies)
                            .for_each(|a, &omega| *a += gauss(omega - e, broadening));
                    }
                    acc
                },
            )
            .reduce(|| Array1::<f64>::zeros(energies.len()), |a, b| a + b);
        Ok(dos / nk)
    }

    /// Full quasiparticle gap on the grid, $2\min_{\bm k,n}|E_n(\bm k)|$.
    fn spectral_gap(&self, k: &Array2<f64>) -> Result<f64> {
        let (band, _) = self.diagonalize_bdg(k)?;
        Ok(2.0 * band.iter().fold(f64::INFINITY, |m, e| m.min(e.abs())))
    }
}

fn check_grid(k: &Array2<f64>) -> Result<()> {
    if k.ncols() != 2 {
        return Err(BdgError::DimensionMismatch {
            context: "k-points must be two dimensional".to_string(),
            expected: 2,
            found: k.ncols(),
        });
    }
    check_finite(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{eigvalsh, is_hermitian};
    use crate::models::{DressedGraphene, Graphene, OneBand, TwoBand};
    use crate::parameters::{
        DressedGrapheneParameters, GrapheneParameters, OneBandParameters, TwoBandParameters,
    };
    use ndarray::array;

    fn grid() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.3, -1.2],
            [1.7, 0.4],
            [-2.9, 2.2],
            [3.1, 3.1],
            [0.05, 1.9]
        ]
    }

    fn dressed(delta: Option<Vec<[f64; 2]>>, q: Option<[f64; 2]>) -> DressedGraphene {
        DressedGraphene::new(DressedGrapheneParameters {
            hopping_gr: 1.0,
            hopping_x: 0.01,
            hopping_x_gr_a: 1.0,
            lattice_constant: 3f64.sqrt(),
            chemical_potential: 0.3,
            hubbard_int_orbital_basis: vec![1.0, 1.0, 0.5],
            beta: f64::INFINITY,
            q,
            delta,
        })
        .unwrap()
    }

    #[test]
    fn test_hamiltonians_are_hermitian() {
        let k = grid();
        let models: Vec<Box<dyn Hamiltonian>> = vec![
            Box::new(OneBand::new(OneBandParameters::example()).unwrap()),
            Box::new(TwoBand::new(TwoBandParameters::example()).unwrap()),
            Box::new(Graphene::new(GrapheneParameters::example()).unwrap()),
            Box::new(dressed(Some(vec![[0.1, 0.2], [0.3, 0.0], [0.0, -0.4]]), Some([0.2, 0.1]))),
        ];
        for m in models.iter() {
            for h in m.hamiltonian(&k).unwrap().outer_iter() {
                assert!(is_hermitian(&h, 1e-12), "{} not hermitian", m.name());
            }
            for dir in Direction::ALL {
                for h in m.hamiltonian_derivative(&k, dir).unwrap().outer_iter() {
                    assert!(is_hermitian(&h, 1e-12));
                }
            }
            for h in m.bdg_hamiltonian(&k).unwrap().outer_iter() {
                assert!(is_hermitian(&h, 1e-12));
            }
        }
    }

    #[test]
    fn test_bdg_spectrum_without_pairing() {
        let model = dressed(None, None);
        let k = grid();
        let (bdg, _) = model.diagonalize_bdg(&k).unwrap();
        let (normal, _) = model.diagonalize_nonint(&k).unwrap();
        let n = model.number_of_bands();
        for ik in 0..k.nrows() {
            let mut expected: Vec<f64> = normal.row(ik).iter().flat_map(|e| [*e, -*e]).collect();
            expected.sort_by(|a, b| a.total_cmp(b));
            for j in 0..2 * n {
                assert!((bdg[[ik, j]] - expected[j]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_bdg_spectrum_is_particle_hole_symmetric() {
        // E(k) = -E(q - k) reversed
        let model = dressed(Some(vec![[0.3, 0.1], [0.2, 0.0], [0.1, 0.0]]), Some([0.4, -0.2]));
        let k = grid();
        let (e_k, _) = model.diagonalize_bdg(&k).unwrap();
        let (e_qk, _) = model.diagonalize_bdg(&shift_minus(&k, model.q()).unwrap()).unwrap();
        let m = 2 * model.number_of_bands();
        for ik in 0..k.nrows() {
            for j in 0..m {
                assert!((e_k[[ik, j]] + e_qk[[ik, m - 1 - j]]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_eigenvectors_diagonalize_bdg() {
        let model = dressed(Some(vec![[0.3, 0.1], [0.2, 0.0], [0.1, 0.0]]), None);
        let k = grid();
        let h = model.bdg_hamiltonian(&k).unwrap();
        let (e, v) = model.diagonalize_bdg(&k).unwrap();
        for ik in 0..k.nrows() {
            let hv = h.index_axis(Axis(0), ik).dot(&v.index_axis(Axis(0), ik));
            for j in 0..6 {
                for a in 0..6 {
                    assert!((hv[[a, j]] - v[[ik, a, j]] * e[[ik, j]]).norm() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_bdg_derivative_matches_finite_difference() {
        let model = dressed(Some(vec![[0.3, 0.1], [0.2, 0.0], [0.1, 0.0]]), Some([0.3, 0.2]));
        let k = grid();
        let eps = 1e-6;
        for dir in Direction::ALL {
            let mut kp = k.clone();
            let mut km = k.clone();
            kp.column_mut(dir.index()).mapv_inplace(|x| x + eps);
            km.column_mut(dir.index()).mapv_inplace(|x| x - eps);
            let fd = (model.bdg_hamiltonian(&kp).unwrap() - model.bdg_hamiltonian(&km).unwrap())
                / Complex::new(2.0 * eps, 0.0);
            let analytic = model.bdg_hamiltonian_derivative(&k, dir).unwrap();
            for (a, b) in fd.iter().zip(analytic.iter()) {
                assert!((a - b).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn test_non_finite_k_is_rejected() {
        let model = OneBand::new(OneBandParameters::example()).unwrap();
        let k = array![[0.0, 0.0], [f64::INFINITY, 1.0]];
        assert!(matches!(
            model.hamiltonian(&k),
            Err(BdgError::InvalidKPoint { index: 1, .. })
        ));
        assert!(model.bdg_hamiltonian(&k).is_err());
        assert!(model.gap_equation(&k).is_err());
        assert!(model.hamiltonian(&array![[0.0, 0.0, 0.0]]).is_err());
    }

    #[test]
    fn test_gap_equation_zero_without_interaction() {
        let mut model = DressedGraphene::new(DressedGrapheneParameters {
            hubbard_int_orbital_basis: vec![0.0, 0.0, 0.0],
            ..DressedGrapheneParameters::example()
        })
        .unwrap();
        model
            .set_delta_orbital_basis(array![
                Complex::new(0.5, 0.1),
                Complex::new(-0.2, 0.3),
                Complex::new(1.0, 0.0)
            ])
            .unwrap();
        let k = model.lattice().generate_bz_grid(6, 6).unwrap();
        let new = model.gap_equation(&k).unwrap();
        assert_eq!(new.len(), 3);
        assert!(new.iter().all(|z| *z == Complex::new(0.0, 0.0)));
        // state untouched
        assert_eq!(model.delta_orbital_basis()[0], Complex::new(0.5, 0.1));
    }

    #[test]
    fn test_gap_equation_single_band_matches_bcs() {
        // Δ' = U/Nk Σ Δ tanh(βE/2)/(2E)
        let mut model = OneBand::new(OneBandParameters {
            hubbard_int_orbital_basis: vec![1.5],
            beta: 20.0,
            ..OneBandParameters::example()
        })
        .unwrap();
        let delta = 0.3;
        model.set_delta_orbital_basis(array![Complex::new(delta, 0.0)]).unwrap();
        let k = model.lattice().generate_bz_grid(12, 12).unwrap();
        let new = model.gap_equation(&k).unwrap();
        let h = model.hamiltonian(&k).unwrap();
        let beta = model.beta();
        let mut expected = 0.0;
        for hk in h.outer_iter() {
            let xi = hk[[0, 0]].re;
            let e = (xi * xi + delta * delta).sqrt();
            expected += delta * (beta * e / 2.0).tanh() / (2.0 * e);
        }
        expected *= 1.5 / k.nrows() as f64;
        assert!((new[0].re - expected).abs() < 1e-10);
        assert!(new[0].im.abs() < 1e-12);
    }

    #[test]
    fn test_gap_equation_at_finite_q() {
        // one band, E± = (ξ_k - ξ_{q-k})/2 ± s with s² = ((ξ_k + ξ_{q-k})/2)² + Δ²:
        // Δ' = U/N_k Σ_k Δ (f(E-) - f(E+)) / 2s
        let (u, delta, beta) = (1.5, 0.3, 10.0);
        let model = OneBand::new(OneBandParameters {
            hubbard_int_orbital_basis: vec![u],
            delta: Some(vec![[delta, 0.0]]),
            beta,
            q: Some([0.6, 0.2]),
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = model.lattice().generate_mp_grid(12, 12).unwrap();
        let xi_k = model.hamiltonian(&k).unwrap();
        let xi_qk = model.hamiltonian(&shift_minus(&k, model.q()).unwrap()).unwrap();
        let sum: f64 = xi_k
            .iter()
            .zip(xi_qk.iter())
            .map(|(a, b)| {
                let (a, b) = (a.re, b.re);
                let s = (0.25 * (a + b).powi(2) + delta * delta).sqrt();
                let (e_plus, e_minus) = (0.5 * (a - b) + s, 0.5 * (a - b) - s);
                delta * (fermi_dirac(e_minus, beta) - fermi_dirac(e_plus, beta)) / (2.0 * s)
            })
            .sum();
        let expected = u * sum / k.nrows() as f64;
        let new = model.gap_equation(&k).unwrap();
        assert!(expected > 0.0);
        assert!((new[0] - Complex::new(expected, 0.0)).norm() < 1e-10, "{} vs {}", new[0], expected);

        let mut at_rest = model.clone();
        at_rest.set_q(array![0.0, 0.0]).unwrap();
        assert!((at_rest.gap_equation(&k).unwrap()[0].re - expected).abs() > 1e-4);
    }

    #[test]
    fn test_remove_global_phase() {
        let mut d = array![Complex::new(0.0, 1.0), Complex::new(0.0, 0.5)];
        remove_global_phase(&mut d);
        assert!((d[0] - Complex::new(1.0, 0.0)).norm() < 1e-12);
        assert!((d[1] - Complex::new(0.5, 0.0)).norm() < 1e-12);
        let mut zero = Array1::<Complex<f64>>::zeros(2);
        remove_global_phase(&mut zero);
        assert!(zero.iter().all(|z| z.norm() == 0.0));
    }

    #[test]
    fn test_setters_validate() {
        let mut model = dressed(None, None);
        assert!(matches!(
            model.set_delta_orbital_basis(Array1::zeros(2)),
            Err(BdgError::DimensionMismatch { .. })
        ));
        assert!(model.set_beta(f64::NAN).is_err());
        assert!(model.set_beta(-1.0).is_err());
        assert!(model.set_beta(f64::INFINITY).is_ok());
        assert!(model.set_q(array![0.1]).is_err());
        assert!(model.set_q(array![0.1, f64::NAN]).is_err());
        assert!(model.set_q(array![0.1, 0.0]).is_ok());
        assert!(model.has_pairing_momentum());
    }

    #[test]
    fn test_dos_and_spectral_gap() {
        let mut model = OneBand::new(OneBandParameters::example()).unwrap();
        model.set_delta_orbital_basis(array![Complex::new(0.2, 0.0)]).unwrap();
        let k = model.lattice().generate_mp_grid(8, 8).unwrap();
        let gap = model.spectral_gap(&k).unwrap();
        // at μ = 0 the Fermi surface crosses the mp grid, so the gap is exactly 2Δ
        assert!((gap - 0.4).abs() < 1e-10);
        let energies = crate::math::linspace(-8.0, 8.0, 3201, true);
        let dos = model.density_of_states(&k, &energies, 0.05).unwrap();
        let de = energies[1] - energies[0];
        // 2N states per k
        assert!((dos.sum() * de - 2.0).abs() < 1e-3);
        assert!(model.density_of_states(&k, &energies, 0.0).is_err());
    }

    #[test]
    fn test_bandstructure_weights() {
        let model = dressed(None, None);
        let k = grid();
        let o0 = array![Complex::new(1.0, 0.0), Complex::new(0.0, 0.0), Complex::new(0.0, 0.0)];
        let o1 = array![Complex::new(0.0, 0.0), Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)];
        let bands = model.calculate_bandstructure(&k, Some((&o0, &o1))).unwrap();
        let w = bands.weights.unwrap();
        assert_eq!(w.shape(), &[k.nrows(), 3]);
        assert!(w.iter().all(|x| x.abs() <= 1.0 + 1e-12));
        // completeness: Σ_n |<o0|n>|^2 - |<o1|n>|^2 = 0
        for row in w.outer_iter() {
            assert!(row.sum().abs() < 1e-10);
        }
        let one = eigvalsh(&model.hamiltonian(&k).unwrap().index_axis(Axis(0), 2)).unwrap();
        assert!((bands.energies[[2, 0]] - one[0]).abs() < 1e-12);
        assert!(model.calculate_bandstructure(&k, Some((&o0, &array![Complex::new(1.0, 0.0)]))).is_err());
    }
}
