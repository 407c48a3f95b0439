//! Critical-temperature search.
//!
//! The transition is bracketed with the self-consistency loop as an oracle (halve the
//! temperature when the gap vanished, double it when the gap still equals its zero-temperature
//! value), the bracket is sampled densely in parallel, and for every band $|\Delta|^2$ is
//! extrapolated linearly to zero.
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::math::{linear_regression, linspace};
use crate::self_consistency::self_consistent_gap;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, concatenate, s, Axis};
use num_complex::Complex;
use rayon::prelude::*;

/// Cap on the number of oracle calls while bracketing.
pub const MAX_BRACKETING_STEPS: usize = 100;
/// Fewest samples a linear fit is attempted with.
pub const MIN_FIT_POINTS: usize = 4;

/// Relative tolerance (w.r.t. $\max_i|\Delta_i(T=0)|$) for "zero gap" and "full gap".
const BRACKET_TOLERANCE: f64 = 0.1;
/// Samples within this fraction of the floor or ceiling of $|\Delta|^2$ are not fitted.
const FIT_NOISE: f64 = 1e-2;

#[derive(Debug, Clone)]
pub struct CritTempResult {
    /// `(T, Δ(T))` for every successful oracle call, sorted by `T`; the first row is `T = 0`.
    pub delta_vs_temp: Vec<(f64, Array1<Complex<f64>>)>,
    /// Extrapolated $T_C$ per band, `None` where no fit was possible.
    pub critical_temperatures: Vec<Option<f64>>,
    /// `(nonzero_gap_temp, zero_gap_temp)` found by the bracketing phase.
    pub bounds: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bracket {
    Zero,
    Full,
    Partial,
}

fn classify(delta: &Array1<Complex<f64>>, reference: &Array1<Complex<f64>>, tol: f64) -> Bracket {
    if delta.iter().all(|d| d.norm() <= tol) {
        Bracket::Zero
    } else if delta
        .iter()
        .zip(reference.iter())
        .all(|(d, r)| (d - r).norm() <= tol)
    {
        Bracket::Full
    } else {
        Bracket::Partial
    }
}

/// Temperatures sampled between the bracketing bounds: three below `nonzero_gap_temp`,
/// `n_temp_points` in `[nonzero_gap_temp, zero_gap_temp)` and three in
/// `[zero_gap_temp, 1.5 zero_gap_temp]`.
pub fn sample_temperatures(nonzero_gap_temp: f64, zero_gap_temp: f64, n_temp_points: usize) -> Array1<f64> {
    concatenate![
        Axis(0),
        linspace(0.5 * nonzero_gap_temp, nonzero_gap_temp, 3, false),
        linspace(nonzero_gap_temp, zero_gap_temp, n_temp_points, false),
        linspace(zero_gap_temp, 1.5 * zero_gap_temp, 3, true)
    ]
}

/// Extrapolates $|\Delta|^2(T)$ of one band to zero.
///
/// `samples` holds `(T, |Δ(T)|²)`. Points within noise of zero or of `zero_temperature_gap_sq`
/// are dropped, then every trailing window of at least [`MIN_FIT_POINTS`] points is fitted and
/// the fit with the smallest slope standard error wins.
pub fn fit_critical_temperature(samples: &[(f64, f64)], zero_temperature_gap_sq: f64) -> Option<f64> {
    if !(zero_temperature_gap_sq > 0.0) {
        return None;
    }
    let floor = FIT_NOISE * FIT_NOISE * zero_temperature_gap_sq;
    let ceiling_noise = FIT_NOISE * zero_temperature_gap_sq;
    let mut usable: Vec<(f64, f64)> = samples
        .iter()
        .copied()
        .filter(|(t, d2)| *t > 0.0 && *d2 > floor && (d2 - zero_temperature_gap_sq).abs() > ceiling_noise)
        .collect();
    if usable.len() < MIN_FIT_POINTS {
        return None;
    }
    usable.sort_by(|a, b| a.0.total_cmp(&b.0));
    let temps = Array1::from_iter(usable.iter().map(|(t, _)| *t));
    let gaps = Array1::from_iter(usable.iter().map(|(_, d)| *d));

    let best = (0..=usable.len() - MIN_FIT_POINTS)
        .filter_map(|start| {
            linear_regression(&temps.slice(s![start..]), &gaps.slice(s![start..]))
        })
        .filter(|fit| fit.stderr.is_finite())
        .min_by(|a, b| a.stderr.total_cmp(&b.stderr))?;
    debug!(
        "Best fit: slope = {}, intercept = {}, stderr = {}",
        best.slope, best.intercept, best.stderr
    );
    if best.slope >= 0.0 {
        return None;
    }
    let tc = best.root();
    tc.is_finite().then_some(tc)
}

/// Searches the critical temperature of every band of `h`.
///
/// `h` itself is not modified: every oracle call runs on a clone with its own `beta` and its own
/// generator seeded from `seed`. Bracketing samples that do not converge are skipped (the
/// temperature is halved), dense samples that do not converge are dropped.
pub fn search_crit_temp<H>(
    h: &H,
    k: &Array2<f64>,
    epsilon: f64,
    max_iter: usize,
    n_temp_points: usize,
    seed: u64,
) -> Result<CritTempResult>
where
    H: Hamiltonian + Clone,
{
    let n = h.number_of_bands();
    let mut temp = if h.beta().is_finite() {
        1.0 / h.beta()
    } else {
        0.25 * h.hubbard_int_orbital_basis().fold(0.0f64, |m, u| m.max(*u))
    };
    if !(temp > 0.0) {
        return Err(BdgError::invalid_parameter(
            "hubbard_int_orbital_basis",
            "needs a positive entry to estimate the starting temperature",
        ));
    }

    let zero_temperature_gap = self_consistent_gap(h, k, 0.0, None, epsilon, max_iter, seed)?;
    let mut delta_vs_temp = vec![(0.0, zero_temperature_gap.clone())];
    let reference = zero_temperature_gap.fold(0.0f64, |m, d| m.max(d.norm()));
    if reference == 0.0 {
        warn!("Zero-temperature gap vanishes, no critical temperature to search");
        return Ok(CritTempResult {
            delta_vs_temp,
            critical_temperatures: vec![None; n],
            bounds: None,
        });
    }
    let tol = BRACKET_TOLERANCE * reference;
    info!("Starting temperature {}", temp);

    let mut zero_gap_temp: Option<f64> = None;
    let mut nonzero_gap_temp: Option<f64> = None;
    let mut steps = 0;
    while zero_gap_temp.is_none() || nonzero_gap_temp.is_none() {
        if steps == MAX_BRACKETING_STEPS {
            warn!(
                "No temperature bounds after {} steps (zero gap: {:?}, full gap: {:?})",
                MAX_BRACKETING_STEPS, zero_gap_temp, nonzero_gap_temp
            );
            break;
        }
        steps += 1;
        let seed_step = seed.wrapping_add(steps as u64);
        match self_consistent_gap(h, k, temp, None, epsilon, max_iter, seed_step) {
            Ok(delta) => {
                let bracket = classify(&delta, &zero_temperature_gap, tol);
                delta_vs_temp.push((temp, delta));
                match bracket {
                    Bracket::Zero => {
                        info!("Found temperature with zero gap: {}", temp);
                        zero_gap_temp = Some(temp);
                        temp *= 0.5;
                    }
                    Bracket::Full => {
                        info!("Found temperature with nonzero gap: {}", temp);
                        nonzero_gap_temp = Some(temp);
                        temp *= 2.0;
                    }
                    Bracket::Partial => temp *= 0.5,
                }
            }
            Err(e) => {
                warn!("Skipping T = {} while bracketing: {}", temp, e);
                temp *= 0.5;
            }
        }
    }

    let bounds = match (nonzero_gap_temp, zero_gap_temp) {
        (Some(low), Some(high)) => (low, high),
        _ => {
            return Ok(CritTempResult {
                delta_vs_temp,
                critical_temperatures: vec![None; n],
                bounds: None,
            });
        }
    };
    info!("Temperature bounds: {} to {}", bounds.0, bounds.1);

    let temperatures = sample_temperatures(bounds.0, bounds.1, n_temp_points);
    let base = seed.wrapping_add(MAX_BRACKETING_STEPS as u64 + 1);
    let sampled: Vec<(f64, Array1<Complex<f64>>)> = temperatures
        .to_vec()
        .into_par_iter()
        .enumerate()
        .filter_map(|(i, t)| {
            match self_consistent_gap(h, k, t, None, epsilon, max_iter, base.wrapping_add(i as u64)) {
                Ok(delta) => Some((t, delta)),
                Err(e) => {
                    warn!("Dropping sample T = {}: {}", t, e);
                    None
                }
            }
        })
        .collect();
    info!("{} of {} temperature samples converged", sampled.len(), temperatures.len());
    delta_vs_temp.extend(sampled);
    delta_vs_temp.sort_by(|a, b| a.0.total_cmp(&b.0));

    let critical_temperatures: Vec<Option<f64>> = (0..n)
        .map(|band| {
            let samples: Vec<(f64, f64)> = delta_vs_temp
                .iter()
                .map(|(t, d)| (*t, d[band].norm_sqr()))
                .collect();
            let tc = fit_critical_temperature(&samples, zero_temperature_gap[band].norm_sqr());
            match tc {
                Some(t) => info!("Critical temperature of band {}: {}", band, t),
                None => warn!("Not enough samples to fit the critical temperature of band {}", band),
            }
            tc
        })
        .collect();

    Ok(CritTempResult {
        delta_vs_temp,
        critical_temperatures,
        bounds: Some(bounds),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OneBand;
    use crate::parameters::OneBandParameters;

    /// $T_C$ of the linearized gap equation $1=\frac{U}{N_k}\sum_k\tanh(\xi/2T)/(2\xi)$ by bisection.
    fn linearized_tc(xi: &[f64], u: f64) -> f64 {
        let kernel = |t: f64| -> f64 {
            let sum: f64 = xi
                .iter()
                .map(|x| {
                    if x.abs() < 1e-12 {
                        1.0 / (4.0 * t)
                    } else {
                        (x / (2.0 * t)).tanh() / (2.0 * x)
                    }
                })
                .sum();
            u * sum / xi.len() as f64 - 1.0
        };
        let (mut lo, mut hi) = (1e-3, 10.0);
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if kernel(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    #[test]
    fn test_sample_temperatures() {
        let t = sample_temperatures(1.0, 2.0, 4);
        let expected = [0.5, 2.0 / 3.0, 5.0 / 6.0, 1.0, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0];
        assert_eq!(t.len(), expected.len());
        for (a, b) in t.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fit_linear_data() {
        // |Δ|² = 2 (0.5 - T) below T_C = 0.5, plus filtered points at the floor and the ceiling
        let mut samples: Vec<(f64, f64)> = (1..10)
            .map(|i| {
                let t = 0.05 * i as f64;
                (t, 2.0 * (0.5 - t))
            })
            .collect();
        samples.push((0.6, 0.0));
        samples.push((0.7, 1e-9));
        samples.push((0.01, 1.0));
        let tc = fit_critical_temperature(&samples, 1.0).unwrap();
        assert!((tc - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_fit_needs_four_points() {
        let samples = vec![(0.3, 0.4), (0.4, 0.2), (0.45, 0.1)];
        assert!(fit_critical_temperature(&samples, 1.0).is_none());
        assert!(fit_critical_temperature(&samples, 0.0).is_none());
    }

    #[test]
    fn test_fit_prefers_linear_tail() {
        // curved far below T_C, linear close to it
        let mut samples: Vec<(f64, f64)> = vec![(0.05, 0.95), (0.1, 0.93), (0.15, 0.9)];
        samples.extend((0..6).map(|i| {
            let t = 0.3 + 0.03 * i as f64;
            (t, 1.5 * (0.5 - t))
        }));
        let tc = fit_critical_temperature(&samples, 1.0).unwrap();
        assert!((tc - 0.5).abs() < 1e-8);
    }

    #[test]
    fn test_search_matches_linearized_gap_equation() {
        let model = OneBand::new(OneBandParameters {
            hubbard_int_orbital_basis: vec![2.0],
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = model.lattice().generate_mp_grid(10, 10).unwrap();
        let xi: Vec<f64> = model
            .hamiltonian(&k)
            .unwrap()
            .outer_iter()
            .map(|h| h[[0, 0]].re)
            .collect();
        let reference = linearized_tc(&xi, 2.0);

        let result = search_crit_temp(&model, &k, 1e-6, 1000, 15, 1234).unwrap();
        let (low, high) = result.bounds.unwrap();
        assert!(low < reference && reference <= high * 1.5);
        let tc = result.critical_temperatures[0].unwrap();
        assert!(
            ((tc - reference) / reference).abs() < 0.1,
            "fitted {} vs linearized {}",
            tc,
            reference
        );
        assert_eq!(result.delta_vs_temp[0].0, 0.0);
        assert!(result.delta_vs_temp.windows(2).all(|w| w[0].0 <= w[1].0));
        // the input model is untouched
        assert!(model.beta().is_infinite());
    }

    #[test]
    fn test_search_without_interaction_reports_nothing() {
        let model = OneBand::new(OneBandParameters {
            hubbard_int_orbital_basis: vec![0.0],
            ..OneBandParameters::example()
        })
        .unwrap();
        let k = model.lattice().generate_mp_grid(4, 4).unwrap();
        assert!(search_crit_temp(&model, &k, 1e-4, 1000, 5, 0).is_err());
    }
}
