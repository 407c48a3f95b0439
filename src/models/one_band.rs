use crate::Direction;
use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, MeanFieldState};
use crate::lattice::{BaseLattice, SquareLattice};
use crate::models::snapshot;
use crate::parameters::{ModelParameters, OneBandParameters};
use ndarray::prelude::*;
use num_complex::Complex;

/// Nearest-neighbour single band on the square lattice,
/// $\xi(\bm k)=-2t(\cos ak_x+\cos ak_y)-\mu$.
#[derive(Debug, Clone)]
pub struct OneBand {
    parameters: OneBandParameters,
    lattice: SquareLattice,
    mean_field: MeanFieldState,
}

impl OneBand {
    pub fn new(parameters: OneBandParameters) -> Result<Self> {
        parameters.validate()?;
        let lattice = SquareLattice::new(parameters.lattice_constant)?;
        let mean_field = MeanFieldState::new(
            1,
            &parameters.hubbard_int_orbital_basis,
            parameters.beta,
            parameters.q,
            parameters.delta.as_deref(),
        )?;
        Ok(OneBand {
            parameters,
            lattice,
            mean_field,
        })
    }
}

impl Hamiltonian for OneBand {
    fn name(&self) -> &'static str {
        "OneBand"
    }
    fn number_of_bands(&self) -> usize {
        1
    }
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>> {
        let t = self.parameters.hopping;
        let a = self.parameters.lattice_constant;
        let xi = -2.0 * t * ((a * k[0]).cos() + (a * k[1]).cos()) - self.parameters.chemical_potential;
        arr2(&[[Complex::new(xi, 0.0)]])
    }
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>> {
        let t = self.parameters.hopping;
        let a = self.parameters.lattice_constant;
        let d = 2.0 * t * a * (a * k[direction.index()]).sin();
        arr2(&[[Complex::new(d, 0.0)]])
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
        ModelParameters::OneBand(OneBandParameters {
            beta,
            q,
            delta,
            ..self.parameters.clone()
        })
    }
}
