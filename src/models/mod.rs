//! Concrete lattice models.
//!
//! Each model owns its validated parameters, its lattice and a [`MeanFieldState`]; everything
//! else comes from the provided methods of [`Hamiltonian`].
mod dressed_graphene;
mod graphene;
mod one_band;
mod tight_binding;
mod two_band;

pub use dressed_graphene::DressedGraphene;
pub use graphene::Graphene;
pub use one_band::OneBand;
pub use tight_binding::TightBinding;
pub use two_band::TwoBand;

use crate::Direction;
use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, MeanFieldState};
use crate::lattice::BaseLattice;
use crate::parameters::ModelParameters;
use ndarray::{Array2, ArrayView1};
use num_complex::Complex;

/// `beta`, `q` and `delta` of a state in the layout of the parameter structs.
pub(crate) fn snapshot(state: &MeanFieldState) -> (f64, Option<[f64; 2]>, Option<Vec<[f64; 2]>>) {
    let q = state.q();
    (state.beta(), Some([q[0], q[1]]), Some(state.delta_pairs()))
}

/// Any of the models, selected at run time from the `[model]` table.
#[derive(Debug, Clone)]
pub enum AnyHamiltonian {
    OneBand(OneBand),
    TwoBand(TwoBand),
    Graphene(Graphene),
    DressedGraphene(DressedGraphene),
    TightBinding(TightBinding),
}

impl AnyHamiltonian {
    pub fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        Ok(match parameters {
            ModelParameters::OneBand(p) => AnyHamiltonian::OneBand(OneBand::new(p.clone())?),
            ModelParameters::TwoBand(p) => AnyHamiltonian::TwoBand(TwoBand::new(p.clone())?),
            ModelParameters::Graphene(p) => AnyHamiltonian::Graphene(Graphene::new(p.clone())?),
            ModelParameters::DressedGraphene(p) => {
                AnyHamiltonian::DressedGraphene(DressedGraphene::new(p.clone())?)
            }
            ModelParameters::TightBinding(p) => {
                AnyHamiltonian::TightBinding(TightBinding::new(p.clone())?)
            }
        })
    }

    fn inner(&self) -> &dyn Hamiltonian {
        match self {
            AnyHamiltonian::OneBand(m) => m,
            AnyHamiltonian::TwoBand(m) => m,
            AnyHamiltonian::Graphene(m) => m,
            AnyHamiltonian::DressedGraphene(m) => m,
            AnyHamiltonian::TightBinding(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Hamiltonian {
        match self {
            AnyHamiltonian::OneBand(m) => m,
            AnyHamiltonian::TwoBand(m) => m,
            AnyHamiltonian::Graphene(m) => m,
            AnyHamiltonian::DressedGraphene(m) => m,
            AnyHamiltonian::TightBinding(m) => m,
        }
    }
}

impl Hamiltonian for AnyHamiltonian {
    fn name(&self) -> &'static str {
        self.inner().name()
    }
    fn number_of_bands(&self) -> usize {
        self.inner().number_of_bands()
    }
    fn hamiltonian_onek(&self, k: &ArrayView1<f64>) -> Array2<Complex<f64>> {
        self.inner().hamiltonian_onek(k)
    }
    fn hamiltonian_derivative_onek(
        &self,
        k: &ArrayView1<f64>,
        direction: Direction,
    ) -> Array2<Complex<f64>> {
        self.inner().hamiltonian_derivative_onek(k, direction)
    }
    fn mean_field(&self) -> &MeanFieldState {
        self.inner().mean_field()
    }
    fn mean_field_mut(&mut self) -> &mut MeanFieldState {
        self.inner_mut().mean_field_mut()
    }
    fn lattice(&self) -> Box<dyn BaseLattice> {
        self.inner().lattice()
    }
    fn parameters(&self) -> ModelParameters {
        self.inner().parameters()
    }
}
