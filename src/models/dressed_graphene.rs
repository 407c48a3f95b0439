use crate::Direction;
use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, MeanFieldState};
use crate::lattice::{BaseLattice, GrapheneLattice};
use crate::models::graphene::{structure_factor, structure_factor_derivative};
use crate::models::snapshot;
use crate::parameters::{DressedGrapheneParameters, ModelParameters};
use ndarray::prelude::*;
use num_complex::Complex;

/// Graphene with one extra orbital X per cell sitting on top of sublattice A.
///
/// Orbitals are ordered (A, B, X). X hybridizes with A through `hopping_x_gr_a` and has its own
/// triangular-lattice dispersion
/// $-2t_X\big(\cos ak_x+2\cos\frac{ak_x}{2}\cos\frac{\sqrt3ak_y}{2}\big)$.
#[derive(Debug, Clone)]
pub struct DressedGraphene {
    parameters: DressedGrapheneParameters,
    lattice: GrapheneLattice,
    mean_field: MeanFieldState,
}

impl DressedGraphene {
    pub fn new(parameters: DressedGrapheneParameters) -> Result<Self> {
        parameters.validate()?;
        let lattice = GrapheneLattice::new(parameters.lattice_constant)?;
        let mean_field = MeanFieldState::new(
            3,
            &parameters.hubbard_int_orbital_basis,
            parameters.beta,
            parameters.q,
            parameters.delta.as_deref(),
        )?;
        Ok(DressedGraphene {
            parameters,
            lattice,
            mean_field,
        })
    }
}

impl Hamiltonian for DressedGraphene {
    fn name(&self) -> &'static str {
        "DressedGraphene"
    }
    fn number_of_bands(&self) -> usize {
        3
    }
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>> {
        let p = &self.parameters;
        let a = p.lattice_constant;
        let s3 = 3f64.sqrt();
        let mut h = Array2::<Complex<f64>>::zeros((3, 3));
        h[[0, 1]] = -structure_factor(a, k) * p.hopping_gr;
        h[[1, 0]] = h[[0, 1]].conj();
        h[[0, 2]] = Complex::new(p.hopping_x_gr_a, 0.0);
        h[[2, 0]] = h[[0, 2]];
        h[[2, 2]] = Complex::new(
            -2.0 * p.hopping_x
                * ((a * k[0]).cos() + 2.0 * (a * k[0] / 2.0).cos() * (s3 * a * k[1] / 2.0).cos()),
            0.0,
        );
        for i in 0..3 {
            h[[i, i]] -= p.chemical_potential;
        }
        h
    }
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>> {
        let p = &self.parameters;
        let a = p.lattice_constant;
        let s3 = 3f64.sqrt();
        let mut h = Array2::<Complex<f64>>::zeros((3, 3));
        h[[0, 1]] = -structure_factor_derivative(a, k, direction) * p.hopping_gr;
        h[[1, 0]] = h[[0, 1]].conj();
        let d22 = match direction {
            Direction::X => {
                2.0 * a
                    * p.hopping_x
                    * ((a * k[0]).sin() + (a * k[0] / 2.0).sin() * (s3 * a * k[1] / 2.0).cos())
            }
            Direction::Y => {
                2.0 * s3 * a * p.hopping_x * (a * k[0] / 2.0).cos() * (s3 * a * k[1] / 2.0).sin()
            }
        };
        h[[2, 2]] = Complex::new(d22, 0.0);
        h
    }
    fn mean_field(&self) -> &MeanFieldState {
        &self.mean_field
    }
    fn mean_field_mut(&mut self) -> &mut MeanFieldState {
        &mut self.mean_field
    }
    fn lattice(&self) -> Box<dyn BaseLattice> {
        Box::new(self.lattice)
    }
    fn parameters(&self) -> ModelParameters {
        let (beta, q, delta) = snapshot(&self.mean_field);
        ModelParameters::DressedGraphene(DressedGrapheneParameters {
            beta,
            q,
            delta,
            ..self.parameters.clone()
        })
    }
}
