use crate::Direction;
use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, MeanFieldState};
use crate::lattice::{BaseLattice, GrapheneLattice};
use crate::models::snapshot;
use crate::parameters::{GrapheneParameters, ModelParameters};
use ndarray::prelude::*;
use num_complex::Complex;

/// Structure factor of the three nearest-neighbour bonds A → B and its momentum derivative,
/// shared by [`Graphene`] and [`DressedGraphene`](crate::models::DressedGraphene).
///
/// $$f(\bm k)=e^{iak_y/\sqrt3}+2e^{-iak_y/(2\sqrt3)}\cos(ak_x/2)$$
pub(crate) fn structure_factor(a: f64, k: &ArrayView1<f64>) -> Complex<f64> {
    let s3 = 3f64.sqrt();
    Complex::from_polar(1.0, a * k[1] / s3)
        + Complex::from_polar(2.0, -a * k[1] / (2.0 * s3)) * (a * k[0] / 2.0).cos()
}

pub(crate) fn structure_factor_derivative(
    a: f64,
    k: &ArrayView1<f64>,
    direction: Direction,
) -> Complex<f64> {
    let s3 = 3f64.sqrt();
    let i = Complex::<f64>::i();
    let e_half = Complex::from_polar(1.0, -a * k[1] / (2.0 * s3));
    match direction {
        Direction::X => -e_half * a * (a * k[0] / 2.0).sin(),
        Direction::Y => {
            i * a / s3 * (Complex::from_polar(1.0, a * k[1] / s3) - e_half * (a * k[0] / 2.0).cos())
        }
    }
}

/// Nearest-neighbour graphene, orbitals ordered (A, B).
#[derive(Debug, Clone)]
pub struct Graphene {
    parameters: GrapheneParameters,
    lattice: GrapheneLattice,
    mean_field: MeanFieldState,
}

impl Graphene {
    pub fn new(parameters: GrapheneParameters) -> Result<Self> {
        parameters.validate()?;
        let lattice = GrapheneLattice::new(parameters.lattice_constant)?;
        let mean_field = MeanFieldState::new(
            2,
            &parameters.hubbard_int_orbital_basis,
            parameters.beta,
            parameters.q,
            parameters.delta.as_deref(),
        )?;
        Ok(Graphene {
            parameters,
            lattice,
            mean_field,
        })
    }
}

impl Hamiltonian for Graphene {
    fn name(&self) -> &'static str {
        "Graphene"
    }
    fn number_of_bands(&self) -> usize {
        2
    }
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>> {
        let t = self.parameters.hopping;
        let mu = Complex::new(self.parameters.chemical_potential, 0.0);
        let h01 = -structure_factor(self.parameters.lattice_constant, k) * t;
        arr2(&[[-mu, h01], [h01.conj(), -mu]])
    }
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>> {
        let t = self.parameters.hopping;
        let d01 = -structure_factor_derivative(self.parameters.lattice_constant, k, direction) * t;
        let zero = Complex::new(0.0, 0.0);
        arr2(&[[zero, d01], [d01.conj(), zero]])
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
        ModelParameters::Graphene(GrapheneParameters {
            beta,
            q,
            delta,
            ..self.parameters.clone()
        })
    }
}
