use crate::Direction;
use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, MeanFieldState};
use crate::lattice::{BaseLattice, SquareLattice};
use crate::models::snapshot;
use crate::parameters::{ModelParameters, TwoBandParameters};
use ndarray::prelude::*;
use num_complex::Complex;

/// Two uncoupled copies of the square-lattice band; the orbitals only differ through their
/// Hubbard interaction.
#[derive(Debug, Clone)]
pub struct TwoBand {
    parameters: TwoBandParameters,
    lattice: SquareLattice,
    mean_field: MeanFieldState,
}

impl TwoBand {
    pub fn new(parameters: TwoBandParameters) -> Result<Self> {
        parameters.validate()?;
        let lattice = SquareLattice::new(parameters.lattice_constant)?;
        let mean_field = MeanFieldState::new(
            2,
            &parameters.hubbard_int_orbital_basis,
            parameters.beta,
            parameters.q,
            parameters.delta.as_deref(),
        )?;
        Ok(TwoBand {
            parameters,
            lattice,
            mean_field,
        })
    }
}

impl Hamiltonian for TwoBand {
    fn name(&self) -> &'static str {
        "TwoBand"
    }
    fn number_of_bands(&self) -> usize {
        2
    }
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>> {
        let t = self.parameters.hopping;
        let a = self.parameters.lattice_constant;
        let xi = -2.0 * t * ((a * k[0]).cos() + (a * k[1]).cos()) - self.parameters.chemical_potential;
        Array2::from_diag_elem(2, Complex::new(xi, 0.0))
    }
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>> {
        let t = self.parameters.hopping;
        let a = self.parameters.lattice_constant;
        let d = 2.0 * t * a * (a * k[direction.index()]).sin();
        Array2::from_diag_elem(2, Complex::new(d, 0.0))
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
        ModelParameters::TwoBand(TwoBandParameters {
            beta,
            q,
            delta,
            ..self.parameters.clone()
        })
    }
}
