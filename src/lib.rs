//! Rustbdg: self-consistent Bogoliubov-de Gennes mean-field theory for multi-band
//! tight-binding models.
//!
//! The crate covers
//!
//! 1: Normal-state and BdG Hamiltonians of lattice models and their per-k diagonalization
//!
//! 2: The gap equation and the self-consistency loop for the orbital order parameter $\Delta$
//!
//! 3: A bracketing + regression search for the critical temperature
//!
//! 4: Linear response on top of the mean-field solution: superfluid weight (conventional and
//!    geometric part), quantum metric, supercurrent, free energy
//!
//! The BdG matrix at momentum $\bm k$ with pairing momentum $\bm q$ is
//! $$H_{\text{BdG}}(\bm k)=\begin{pmatrix}H(\bm k)&\hat\Delta^\dagger\\\\ \hat\Delta&-H^*(\bm q-\bm k)\end{pmatrix},\qquad \hat\Delta=\mathrm{diag}(\Delta_1,\dots,\Delta_N).$$
pub mod crit_temp;
pub mod current;
pub mod error;
pub mod free_energy;
pub mod hamiltonian;
pub mod io;
pub mod kpoints;
pub mod lattice;
pub mod linalg;
pub mod math;
pub mod models;
pub mod parameters;
pub mod q_analysis;
pub mod q_loop;
pub mod quantum_metric;
pub mod routines;
pub mod self_consistency;
pub mod superfluid_weight;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::error::{BdgError, Result};
pub use crate::hamiltonian::{Hamiltonian, MeanFieldState};
pub use crate::lattice::{BaseLattice, GrapheneLattice, SquareLattice};
pub use crate::models::{AnyHamiltonian, DressedGraphene, Graphene, OneBand, TightBinding, TwoBand};
pub use crate::parameters::Parameters;

/// Cartesian direction of a momentum derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    X,
    Y,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::X, Direction::Y];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::X => write!(f, "x"),
            Direction::Y => write!(f, "y"),
        }
    }
}
