//! Fixed-point iteration of the gap equation with linear mixing.
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use log::{debug, info};
use ndarray::{Array1, Array2, Zip};
use num_complex::Complex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Fraction of the freshly computed gap accepted per iteration.
pub const MIXING: f64 = 0.2;

/// Small random complex start value, every component drawn from `[-1, -0.8)` in both its real
/// and its imaginary part.
pub fn random_initial_gap<R: Rng + ?Sized>(number_of_bands: usize, rng: &mut R) -> Array1<Complex<f64>> {
    Array1::from_iter((0..number_of_bands).map(|_| {
        Complex::new(
            0.2 * rng.r#gen::<f64>() - 1.0,
            0.2 * rng.r#gen::<f64>() - 1.0,
        )
    }))
}

/// Iterates $\Delta\leftarrow\gamma\,\Delta_{\text{new}}+(1-\gamma)\Delta$ from a random start until
/// every component changes by less than `epsilon`, leaving the converged gap in `h`.
///
/// Returns the number of gap-equation evaluations. Running past `max_iter` is an error,
/// the model then holds the last mixed gap.
pub fn self_consistency_loop<H, R>(
    h: &mut H,
    k: &Array2<f64>,
    epsilon: f64,
    max_iter: usize,
    rng: &mut R,
) -> Result<usize>
where
    H: Hamiltonian + ?Sized,
    R: Rng + ?Sized,
{
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(BdgError::invalid_parameter(
            "conv_treshold",
            "must be a positive finite number",
        ));
    }
    let n = h.number_of_bands();
    h.set_delta_orbital_basis(random_initial_gap(n, rng))?;
    info!(
        "Starting self-consistency loop for {} (beta = {}, {} k-points)",
        h.name(),
        h.beta(),
        k.nrows()
    );

    let mut iteration = 0;
    loop {
        iteration += 1;
        if iteration > max_iter {
            return Err(BdgError::NotConverged {
                iterations: iteration - 1,
                max_iter,
            });
        }
        let new_gap = h.gap_equation(k)?;
        let current = h.delta_orbital_basis();
        let change = Zip::from(current)
            .and(&new_gap)
            .fold(0.0f64, |m, a, b| m.max((a - b).norm()));
        debug!(
            "Iteration {}: |delta| = {:?}, max change = {:e}",
            iteration,
            new_gap.mapv(|z| z.norm()).to_vec(),
            change
        );
        if change < epsilon {
            h.set_delta_orbital_basis(new_gap)?;
            info!("Converged after {} iterations", iteration);
            return Ok(iteration);
        }
        let mixed = &new_gap * MIXING + &(current * (1.0 - MIXING));
        h.set_delta_orbital_basis(mixed)?;
    }
}

/// Converged private copy of `h` at temperature `temp` (`0` meaning $\beta=\infty$) and, if
/// given, pairing momentum `q`, started from a generator seeded with `seed`.
pub fn self_consistent_state<H>(
    h: &H,
    k: &Array2<f64>,
    temp: f64,
    q: Option<Array1<f64>>,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> Result<H>
where
    H: Hamiltonian + Clone,
{
    let mut model = h.clone();
    model.set_beta(if temp == 0.0 { f64::INFINITY } else { 1.0 / temp })?;
    if let Some(q) = q {
        model.set_q(q)?;
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    self_consistency_loop(&mut model, k, epsilon, max_iter, &mut rng)?;
    Ok(model)
}

/// Gap of [`self_consistent_state`].
///
/// This is the oracle the temperature and momentum sweeps run in parallel; `h` itself is never
/// modified.
pub fn self_consistent_gap<H>(
    h: &H,
    k: &Array2<f64>,
    temp: f64,
    q: Option<Array1<f64>>,
    epsilon: f64,
    max_iter: usize,
    seed: u64,
) -> Result<Array1<Complex<f64>>>
where
    H: Hamiltonian + Clone,
{
    let model = self_consistent_state(h, k, temp, q, epsilon, max_iter, seed)?;
    Ok(model.delta_orbital_basis().clone())
}
