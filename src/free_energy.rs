//! Mean-field free energy of the BdG state and its minimisation over a uniform pairing amplitude.
//!
//! At zero temperature
//! $$F=-\frac1{N_k}\sum_{\bm k}\sum_{n<N}|E_n(\bm k)|+\sum_i\frac{|\Delta_i|^2}{U_i},$$
//! at finite $\beta$ the quasiparticle sum becomes
//! $-\frac1{\beta N_k}\sum_{\bm k}\sum_n\ln(1+e^{-\beta E_n})$, which reduces to the expression
//! above for $\beta\to\infty$.
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use log::debug;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use rayon::prelude::*;

/// Points of the coarse scan before the golden-section refinement.
pub const SCAN_POINTS: usize = 20;
const GOLDEN_TOLERANCE: f64 = 1e-8;
const GOLDEN_MAX_STEPS: usize = 200;

/// $-\frac1\beta\ln(1+e^{-\beta E})$ without overflow, $\min(E,0)$ at $\beta=\infty$.
#[inline(always)]
fn quasiparticle_free_energy(energy: f64, beta: f64) -> f64 {
    let ground = energy.min(0.0);
    if beta.is_infinite() {
        ground
    } else {
        ground - (-beta * energy.abs()).exp().ln_1p() / beta
    }
}

/// $\sum_i|\Delta_i|^2/U_i$; a channel without interaction costs nothing when its gap is zero and
/// is forbidden otherwise.
fn condensation_term(delta: &Array1<Complex<f64>>, hubbard: &Array1<f64>) -> f64 {
    delta
        .iter()
        .zip(hubbard.iter())
        .map(|(d, u)| {
            let d2 = d.norm_sqr();
            if *u == 0.0 {
                if d2 == 0.0 { 0.0 } else { f64::INFINITY }
            } else {
                d2 / u
            }
        })
        .sum()
}

/// Free energy per k-point of the current state of `h`.
pub fn free_energy<H>(h: &H, k: &Array2<f64>) -> Result<f64>
where
    H: Hamiltonian + ?Sized,
{
    let nk = k.nrows();
    if nk == 0 {
        return Err(BdgError::InvalidGrid("empty k-point grid".to_string()));
    }
    let beta = h.beta();
    let (energies, _) = h.diagonalize_bdg(k)?;
    let quasiparticles: f64 = energies
        .outer_iter()
        .into_par_iter()
        .map(|e| {
            e.iter()
                .map(|x| quasiparticle_free_energy(*x, beta))
                .sum::<f64>()
        })
        .sum();
    Ok(quasiparticles / nk as f64
        + condensation_term(h.delta_orbital_basis(), h.hubbard_int_orbital_basis()))
}

/// [`free_energy`] divided by the Brillouin-zone area of the model's lattice.
pub fn free_energy_per_area<H>(h: &H, k: &Array2<f64>) -> Result<f64>
where
    H: Hamiltonian + ?Sized,
{
    Ok(free_energy(h, k)? / h.lattice().bz_area())
}

/// Free energy with the same real gap `delta` on every orbital; `h` is left untouched.
pub fn free_energy_uniform_pairing<H>(h: &H, delta: f64, k: &Array2<f64>) -> Result<f64>
where
    H: Hamiltonian + Clone,
{
    let mut model = h.clone();
    model.set_delta_orbital_basis(Array1::from_elem(
        h.number_of_bands(),
        Complex::new(delta, 0.0),
    ))?;
    free_energy(&model, k)
}

/// Minimum of the uniform-pairing free energy for `delta` in `[lower, upper]`.
///
/// A scan over [`SCAN_POINTS`] evenly spaced values locates the lowest sample, golden-section
/// search then refines inside its neighbouring interval. Returns `(delta, free_energy)`.
pub fn minimize_uniform_pairing<H>(h: &H, k: &Array2<f64>, lower: f64, upper: f64) -> Result<(f64, f64)>
where
    H: Hamiltonian + Clone,
{
    if !(lower.is_finite() && upper.is_finite() && lower < upper) {
        return Err(BdgError::invalid_parameter(
            "delta bounds",
            "need finite lower < upper",
        ));
    }
    let f = |d: f64| free_energy_uniform_pairing(h, d, k);
    let step = (upper - lower) / (SCAN_POINTS - 1) as f64;
    let scan = (0..SCAN_POINTS)
        .map(|i| {
            let d = lower + step * i as f64;
            f(d).map(|v| (d, v))
        })
        .collect::<Result<Vec<_>>>()?;
    let best = scan
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.1.total_cmp(&b.1.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut a = scan[best.saturating_sub(1)].0;
    let mut b = scan[(best + 1).min(SCAN_POINTS - 1)].0;

    // 黄金分割
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = f(c)?;
    let mut fd = f(d)?;
    let mut steps = 0;
    while (b - a).abs() > GOLDEN_TOLERANCE && steps < GOLDEN_MAX_STEPS {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = f(c)?;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = f(d)?;
        }
        steps += 1;
    }
    let x = 0.5 * (a + b);
    let fx = f(x)?;
    debug!("Uniform pairing minimum at delta = {} (F = {}) after {} steps", x, fx, steps);
    // the scan edge can still be lower than the refined interior point
    let (edge, f_edge) = scan[best];
    Ok(if f_edge < fx { (edge, f_edge) } else { (x, fx) })
}
