//! Gap as a function of the pairing momentum $\bm q=x\,\bm b_1$ at a few temperatures below
//! $T_C$.
use crate::current::calculate_current_density;
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::math::linspace;
use crate::self_consistency::self_consistent_state;
use log::{info, warn};
use ndarray::{Array1, Array2};
use num_complex::Complex;
use rayon::prelude::*;

/// Fractions of the largest critical temperature the sweep runs at.
pub const TEMPERATURE_FRACTIONS: [f64; 3] = [0.7, 0.8, 0.9];
/// Largest pairing momentum considered, in units of the first reciprocal vector.
pub const MAX_Q_FRACTION: f64 = 0.5;
/// A gap whose largest component is below this counts as vanished.
pub const ZERO_GAP: f64 = 1e-8;
/// Cap on the number of oracle calls in [`q_upper_bound`].
pub const MAX_BOUND_STEPS: usize = 100;

/// Converged state at one pairing momentum.
#[derive(Debug, Clone)]
pub struct QSample {
    /// `q` in units of the first reciprocal vector.
    pub q_fraction: f64,
    pub delta: Array1<Complex<f64>>,
    /// Supercurrent density `[j_x, j_y]` carried by the converged state.
    pub current: Array1<f64>,
}

impl QSample {
    pub fn current_abs(&self) -> f64 {
        self.current.dot(&self.current).sqrt()
    }
}

#[derive(Debug, Clone)]
pub struct DeltaVsQ {
    pub temperature: f64,
    /// Sorted by `q`; samples that did not converge are missing.
    pub samples: Vec<QSample>,
}

/// `[0.7, 0.8, 0.9]` times the largest entry of `crit_temps`.
pub fn sweep_temperatures(crit_temps: &[f64]) -> Result<Vec<f64>> {
    let tc = crit_temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(tc.is_finite() && tc > 0.0) {
        return Err(BdgError::invalid_parameter(
            "crit_temp",
            "needs at least one positive finite critical temperature",
        ));
    }
    Ok(TEMPERATURE_FRACTIONS.iter().map(|x| x * tc).collect())
}

/// Cartesian pairing momentum `fraction · b1`.
fn pairing_momentum<H: Hamiltonian + ?Sized>(h: &H, fraction: f64) -> Array1<f64> {
    h.lattice().reciprocal_basis().row(0).to_owned() * fraction
}

fn gap_for_q<H>(
    h: &H,
    k: &Array2<f64>,
    temp: f64,
    fraction: f64,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> Result<Array1<Complex<f64>>>
where
    H: Hamiltonian + Clone,
{
    let q = pairing_momentum(h, fraction);
    let model = self_consistent_state(h, k, temp, Some(q), epsilon, max_iter, seed)?;
    Ok(model.delta_orbital_basis().clone())
}

fn sample_q<H>(
    h: &H,
    k: &Array2<f64>,
    temp: f64,
    fraction: f64,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> Result<QSample>
where
    H: Hamiltonian + Clone,
{
    let q = pairing_momentum(h, fraction);
    let model = self_consistent_state(h, k, temp, Some(q), epsilon, max_iter, seed)?;
    Ok(QSample {
        q_fraction: fraction,
        current: calculate_current_density(&model, k)?,
        delta: model.delta_orbital_basis().clone(),
    })
}

/// Largest useful `q` fraction at temperature `temp`.
///
/// Starting from [`MAX_Q_FRACTION`] the fraction is halved until the gap survives, then grown by
/// 10 % as long as it does, never beyond [`MAX_Q_FRACTION`]. Non-converged points count as
/// "gap vanished" while shrinking and as "gap survives" while growing.
pub fn q_upper_bound<H>(
    h: &H,
    k: &Array2<f64>,
    temp: f64,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> f64
where
    H: Hamiltonian + Clone,
{
    let survives = |fraction: f64, step: usize| -> Option<bool> {
        match gap_for_q(h, k, temp, fraction, epsilon, max_iter, seed.wrapping_add(step as u64)) {
            Ok(delta) => Some(delta.iter().any(|d| d.norm() > ZERO_GAP)),
            Err(e) => {
                warn!("q = {} at T = {} failed: {}", fraction, temp, e);
                None
            }
        }
    };

    let mut bound = MAX_Q_FRACTION;
    let mut steps = 0;
    loop {
        if steps == MAX_BOUND_STEPS {
            warn!("No q with a finite gap found at T = {}", temp);
            return bound;
        }
        steps += 1;
        if survives(bound, steps) == Some(true) {
            break;
        }
        bound *= 0.5;
    }
    while steps < MAX_BOUND_STEPS {
        bound *= 1.1;
        if bound > MAX_Q_FRACTION {
            break;
        }
        steps += 1;
        if survives(bound, steps) == Some(false) {
            break;
        }
    }
    bound.min(MAX_Q_FRACTION)
}

/// Gap and current for `n_q_points` evenly spaced fractions in `[0, bound]` at temperature `temp`.
pub fn loop_over_q<H>(
    h: &H,
    k: &Array2<f64>,
    temp: f64,
    bound: f64,
    n_q_points: usize,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> DeltaVsQ
where
    H: Hamiltonian + Clone,
{
    let fractions = linspace(0.0, bound, n_q_points, true);
    let mut samples: Vec<QSample> = fractions
        .to_vec()
        .into_par_iter()
        .enumerate()
        .filter_map(|(i, x)| {
            match sample_q(h, k, temp, x, epsilon, max_iter, seed.wrapping_add(i as u64)) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!("Dropping q = {} at T = {}: {}", x, temp, e);
                    None
                }
            }
        })
        .collect();
    samples.sort_by(|a, b| a.q_fraction.total_cmp(&b.q_fraction));
    DeltaVsQ {
        temperature: temp,
        samples,
    }
}

/// Full sweep: for each of [`sweep_temperatures`] find [`q_upper_bound`] and run [`loop_over_q`].
pub fn q_loop<H>(
    h: &H,
    k: &Array2<f64>,
    crit_temps: &[f64],
    n_q_points: usize,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> Result<Vec<DeltaVsQ>>
where
    H: Hamiltonian + Clone,
{
    if n_q_points < 2 {
        return Err(BdgError::invalid_parameter("n_q_points", "must be at least 2"));
    }
    let temperatures = sweep_temperatures(crit_temps)?;
    Ok(temperatures
        .into_iter()
        .enumerate()
        .map(|(i, temp)| {
            let base = seed.wrapping_add(1000 * i as u64);
            info!("Start search for upper bound for q at T = {}", temp);
            let bound = q_upper_bound(h, k, temp, epsilon, max_iter, base);
            info!("q upper bound: {}", bound);
            let result = loop_over_q(h, k, temp, bound, n_q_points, epsilon, max_iter, base.wrapping_add(500));
            info!("{} of {} q points converged", result.samples.len(), n_q_points);
            result
        })
        .collect())
}
