use crate::Direction;
use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, MeanFieldState};
use crate::lattice::{BaseLattice, BravaisLattice};
use crate::linalg::conjugate;
use crate::models::snapshot;
use crate::parameters::{ModelParameters, TightBindingParameters};
use ndarray::prelude::*;
use num_complex::Complex;

/// N-orbital tight-binding model built from a hopping table.
///
/// The table is stored the usual way: `ham[0]` is the (hermitian) home-cell block, `ham[i]`
/// for `i > 0` holds the hoppings into cell `ham_r[i]`, whose hermitian partner at `-R` is added
/// on the fly,
/// $$H_{mn}(\bm k)=\sum_{\bm R}\bra{m\bm 0}\hat H\ket{n\bm R}e^{i(\bm R-\bm\tau_m+\bm\tau_n)\cdot\bm k}.$$
#[derive(Debug, Clone)]
pub struct TightBinding {
    parameters: TightBindingParameters,
    lattice: BravaisLattice,
    mean_field: MeanFieldState,
    ham: Array3<Complex<f64>>,
    /// Cartesian R of every block of `ham`.
    ham_r: Array2<f64>,
    /// Cartesian orbital positions, one per row.
    orb: Array2<f64>,
}

impl TightBinding {
    #[allow(non_snake_case)]
    pub fn new(parameters: TightBindingParameters) -> Result<Self> {
        parameters.validate()?;
        let lattice = BravaisLattice::new(parameters.lattice_vectors)?;
        let n = parameters.number_of_bands();
        let mean_field = MeanFieldState::new(
            n,
            &parameters.hubbard_int_orbital_basis,
            parameters.beta,
            parameters.q,
            parameters.delta.as_deref(),
        )?;

        let mut hamR: Vec<[i32; 2]> = vec![[0, 0]];
        let mut blocks: Vec<Array2<Complex<f64>>> = vec![Array2::from_diag(
            &Array1::from_iter(
                parameters
                    .onsite
                    .iter()
                    .map(|e| Complex::new(e - parameters.chemical_potential, 0.0)),
            ),
        )];
        for hop in parameters.hoppings.iter() {
            let t = Complex::new(hop.t[0], hop.t[1]);
            if hop.r == [0, 0] {
                blocks[0][[hop.i, hop.j]] += t;
                blocks[0][[hop.j, hop.i]] += t.conj();
                continue;
            }
            let index = match hamR.iter().position(|r| *r == hop.r) {
                Some(index) => index,
                None => {
                    hamR.push(hop.r);
                    blocks.push(Array2::zeros((n, n)));
                    hamR.len() - 1
                }
            };
            blocks[index][[hop.i, hop.j]] += t;
        }

        let nR = hamR.len();
        let mut ham = Array3::<Complex<f64>>::zeros((nR, n, n));
        for (mut slot, block) in ham.outer_iter_mut().zip(blocks.iter()) {
            slot.assign(block);
        }
        let lat = lattice.vectors().clone();
        let R_frac = Array2::from_shape_fn((nR, 2), |(i, d)| hamR[i][d] as f64);
        let orb_frac = match &parameters.orbital_positions {
            Some(pos) => Array2::from_shape_fn((n, 2), |(i, d)| pos[i][d]),
            None => Array2::zeros((n, 2)),
        };
        Ok(TightBinding {
            ham_r: R_frac.dot(&lat),
            orb: orb_frac.dot(&lat),
            parameters,
            lattice,
            mean_field,
            ham,
        })
    }

    /// $e^{i\bm k\cdot\bm R}$ for every stored block.
    fn bloch_phases(&self, k: &ArrayView1<f64>) -> Array1<Complex<f64>> {
        self.ham_r.dot(k).mapv(|x| Complex::new(0.0, x).exp())
    }

    /// $U^\dagger M U$ with $U=\mathrm{diag}(e^{i\bm k\cdot\bm\tau})$.
    fn orbital_gauge(&self, k: &ArrayView1<f64>, m: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
        let u = self.orb.dot(k).mapv(|x| Complex::new(0.0, x).exp());
        Array2::from_shape_fn(m.raw_dim(), |(i, j)| u[i].conj() * m[[i, j]] * u[j])
    }

    /// Bloch sum without the orbital phases.
    fn hamk_lattice_gauge(&self, phases: &Array1<Complex<f64>>) -> Array2<Complex<f64>> {
        let n = self.number_of_bands();
        let mut hamk = Array2::<Complex<f64>>::zeros((n, n));
        for (block, w) in self.ham.outer_iter().zip(phases.iter()).skip(1) {
            hamk.scaled_add(*w, &block);
        }
        &self.ham.index_axis(Axis(0), 0) + &hamk + &conjugate(&hamk)
    }
}

impl Hamiltonian for TightBinding {
    fn name(&self) -> &'static str {
        "TightBinding"
    }
    fn number_of_bands(&self) -> usize {
        self.parameters.number_of_bands()
    }
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>> {
        let hamk = self.hamk_lattice_gauge(&self.bloch_phases(k));
        self.orbital_gauge(k, &hamk)
    }
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>> {
        let n = self.number_of_bands();
        let alpha = direction.index();
        let phases = self.bloch_phases(k);
        let mut vv = Array2::<Complex<f64>>::zeros((n, n));
        for (i, (block, w)) in self.ham.outer_iter().zip(phases.iter()).enumerate().skip(1) {
            //对 R 求和
            vv.scaled_add(*w * Complex::new(0.0, self.ham_r[[i, alpha]]), &block);
        }
        let mut v = &vv + &conjugate(&vv);
        // 轨道位置带来的相位 i(τ_n-τ_m)
        let hamk = self.hamk_lattice_gauge(&phases);
        for ((m, l), x) in v.indexed_iter_mut() {
            let d = self.orb[[l, alpha]] - self.orb[[m, alpha]];
            *x += hamk[[m, l]] * Complex::new(0.0, d);
        }
        self.orbital_gauge(k, &v)
    }
    fn mean_field(&self) -> &MeanFieldState {
        &self.mean_field
    }
    fn mean_field_mut(&mut self) -> &mut MeanFieldState {
        &mut self.mean_field
    }
    fn lattice(&self) -> Box<dyn BaseLattice> {
        Box::new(self.lattice.clone())
    }
    fn parameters(&self) -> ModelParameters {
        let (beta, q, delta) = snapshot(&self.mean_field);
        ModelParameters::TightBinding(TightBindingParameters {
            beta,
            q,
            delta,
            ..self.parameters.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::is_hermitian;
    use crate::models::{Graphene, OneBand};
    use crate::parameters::{GrapheneParameters, HoppingTerm, OneBandParameters};
    use ndarray::array;

    fn hop(i: usize, j: usize, r: [i32; 2], t: f64) -> HoppingTerm {
        HoppingTerm { i, j, r, t: [t, 0.0] }
    }

    fn square() -> TightBinding {
        TightBinding::new(TightBindingParameters {
            lattice_vectors: [[1.0, 0.0], [0.0, 1.0]],
            orbital_positions: None,
            onsite: vec![0.0],
            hoppings: vec![hop(0, 0, [1, 0], -1.0), hop(0, 0, [0, 1], -1.0)],
            chemical_potential: 0.3,
            hubbard_int_orbital_basis: vec![1.0],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        })
        .unwrap()
    }

    fn honeycomb() -> TightBinding {
        let a = 3f64.sqrt();
        TightBinding::new(TightBindingParameters {
            lattice_vectors: [[a, 0.0], [a / 2.0, 1.5]],
            orbital_positions: Some(vec![[0.0, 0.0], [-1.0 / 3.0, 2.0 / 3.0]]),
            onsite: vec![0.0, 0.0],
            hoppings: vec![
                hop(0, 1, [0, 0], -1.0),
                hop(0, 1, [1, -1], -1.0),
                hop(0, 1, [0, -1], -1.0),
            ],
            chemical_potential: 0.5,
            hubbard_int_orbital_basis: vec![1.0, 1.0],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        })
        .unwrap()
    }

    fn grid() -> Array2<f64> {
        array![[0.0, 0.0], [0.4, -1.3], [2.1, 0.9], [-1.7, 2.5]]
    }

    #[test]
    fn test_reproduces_one_band() {
        let tb = square();
        let reference = OneBand::new(OneBandParameters {
            chemical_potential: 0.3,
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = grid();
        let diff = tb.hamiltonian(&k).unwrap() - reference.hamiltonian(&k).unwrap();
        assert!(diff.iter().all(|z| z.norm() < 1e-12));
        for dir in Direction::ALL {
            let diff = tb.hamiltonian_derivative(&k, dir).unwrap()
                - reference.hamiltonian_derivative(&k, dir).unwrap();
            assert!(diff.iter().all(|z| z.norm() < 1e-12));
        }
    }

    #[test]
    fn test_reproduces_graphene_with_orbital_positions() {
        let tb = honeycomb();
        let reference = Graphene::new(GrapheneParameters::example()).unwrap();
        let k = grid();
        let diff = tb.hamiltonian(&k).unwrap() - reference.hamiltonian(&k).unwrap();
        assert!(diff.iter().all(|z| z.norm() < 1e-12));
        for dir in Direction::ALL {
            let d = tb.hamiltonian_derivative(&k, dir).unwrap();
            for m in d.outer_iter() {
                assert!(is_hermitian(&m, 1e-12));
            }
            let diff = d - reference.hamiltonian_derivative(&k, dir).unwrap();
            assert!(diff.iter().all(|z| z.norm() < 1e-12));
        }
    }

    #[test]
    fn test_same_cell_hopping_is_completed() {
        let tb = TightBinding::new(TightBindingParameters {
            lattice_vectors: [[1.0, 0.0], [0.0, 1.0]],
            orbital_positions: None,
            onsite: vec![0.0, 1.0],
            hoppings: vec![HoppingTerm {
                i: 0,
                j: 1,
                r: [0, 0],
                t: [0.2, 0.5],
            }],
            chemical_potential: 0.0,
            hubbard_int_orbital_basis: vec![0.0, 0.0],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        })
        .unwrap();
        let h = tb.hamiltonian(&array![[0.7, 0.1]]).unwrap();
        assert_eq!(h[[0, 0, 1]], Complex::new(0.2, 0.5));
        assert_eq!(h[[0, 1, 0]], Complex::new(0.2, -0.5));
        assert_eq!(h[[0, 1, 1]], Complex::new(1.0, 0.0));
    }
}
