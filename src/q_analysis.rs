//! Characteristic lengths from the momentum sweep.
//!
//! At every temperature the depairing current $j_{dp}=\max_q|j(q)|$ is located, and for every
//! band the pairing momentum $Q$ at which $|\Delta(Q)|=|\Delta(0)|/\sqrt2$. From these
//! $$\xi=\frac1{\sqrt2\,Q},\qquad \lambda=\sqrt{\frac1{A_{\text{cell}}\,\xi\,j_{dp}}},$$
//! with $Q$ in absolute units and $A_{\text{cell}}$ the real-space unit-cell area. Both lengths
//! are finally fitted to the Ginzburg-Landau form $L(T)=L_0/\sqrt{1-T/T_C}$.
use crate::lattice::BaseLattice;
use crate::math::linear_regression;
use crate::q_loop::{DeltaVsQ, QSample};
use log::{debug, info, warn};
use ndarray::Array1;
use std::f64::consts::FRAC_1_SQRT_2;

/// Samples with $|j|/\max|j|$ at or below this are not used.
pub const CURRENT_CUTOFF: f64 = 0.01;
/// Fewest samples above [`CURRENT_CUTOFF`] a temperature is analysed with.
pub const MIN_SAMPLES: usize = 6;
/// Fewest temperatures a length is fitted with.
pub const MIN_FIT_TEMPERATURES: usize = 3;

/// Maximum of $|j(q)|$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepairingCurrent {
    pub q_fraction: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLengths {
    /// $Q$ in units of the first reciprocal vector.
    pub q_fraction: f64,
    /// $|\Delta(Q)|$.
    pub delta: f64,
    /// Coherence length.
    pub xi: f64,
    /// London penetration depth.
    pub lambda: f64,
}

#[derive(Debug, Clone)]
pub struct LengthsAtTemperature {
    pub temperature: f64,
    /// `None` when too few samples carry a current.
    pub depairing: Option<DepairingCurrent>,
    /// One entry per band, `None` where $|\Delta|$ never drops to $|\Delta(0)|/\sqrt2$.
    pub bands: Vec<Option<BandLengths>>,
}

/// Parameters of $L(T)=L_0/\sqrt{1-T/T_C}$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthFit {
    pub zero_temperature: f64,
    pub critical_temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZeroTemperatureLengths {
    pub xi: Option<LengthFit>,
    pub lambda: Option<LengthFit>,
}

#[derive(Debug, Clone)]
pub struct QAnalysis {
    /// Sorted by temperature.
    pub lengths_vs_temp: Vec<LengthsAtTemperature>,
    /// One entry per band.
    pub zero_temperature: Vec<ZeroTemperatureLengths>,
}

/// Vertex of the parabola through three points, `None` unless it opens downwards.
fn parabola_vertex(x: [f64; 3], y: [f64; 3]) -> Option<(f64, f64)> {
    let denom = (x[0] - x[1]) * (x[0] - x[2]) * (x[1] - x[2]);
    if denom == 0.0 {
        return None;
    }
    let a = (x[2] * (y[1] - y[0]) + x[1] * (y[0] - y[2]) + x[0] * (y[2] - y[1])) / denom;
    let b = (x[2] * x[2] * (y[0] - y[1]) + x[1] * x[1] * (y[2] - y[0]) + x[0] * x[0] * (y[1] - y[2]))
        / denom;
    let c = (x[1] * x[2] * (x[1] - x[2]) * y[0]
        + x[2] * x[0] * (x[2] - x[0]) * y[1]
        + x[0] * x[1] * (x[0] - x[1]) * y[2])
        / denom;
    if a >= 0.0 {
        return None;
    }
    let xv = -b / (2.0 * a);
    Some((xv, c - b * b / (4.0 * a)))
}

/// Maximum of $|j|$ over `samples`, refined by a parabola through the largest sample and its
/// neighbours when that vertex lies between them.
pub fn depairing_current(samples: &[QSample]) -> Option<DepairingCurrent> {
    let currents: Vec<f64> = samples.iter().map(QSample::current_abs).collect();
    let (imax, &jmax) = currents
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let best = DepairingCurrent {
        q_fraction: samples[imax].q_fraction,
        current: jmax,
    };
    if imax == 0 || imax + 1 == samples.len() {
        return Some(best);
    }
    let x = [
        samples[imax - 1].q_fraction,
        samples[imax].q_fraction,
        samples[imax + 1].q_fraction,
    ];
    let y = [currents[imax - 1], jmax, currents[imax + 1]];
    match parabola_vertex(x, y) {
        Some((xv, yv)) if xv >= x[0] && xv <= x[2] => Some(DepairingCurrent {
            q_fraction: xv,
            current: yv,
        }),
        _ => Some(best),
    }
}

/// First `q` where `ratio` falls to $1/\sqrt2$, linearly interpolated between neighbouring
/// samples.
pub fn half_pairing_crossing(q: &[f64], ratio: &[f64]) -> Option<f64> {
    q.windows(2).zip(ratio.windows(2)).find_map(|(q, r)| {
        if r[0] >= FRAC_1_SQRT_2 && r[1] < FRAC_1_SQRT_2 {
            Some(q[0] + (r[0] - FRAC_1_SQRT_2) / (r[0] - r[1]) * (q[1] - q[0]))
        } else {
            None
        }
    })
}

/// Lengths at one temperature. `samples` must be sorted by `q` and start at `q = 0`.
pub fn lengths_at_temperature(
    data: &DeltaVsQ,
    number_of_bands: usize,
    lattice: &dyn BaseLattice,
) -> LengthsAtTemperature {
    let mut result = LengthsAtTemperature {
        temperature: data.temperature,
        depairing: None,
        bands: vec![None; number_of_bands],
    };
    let Some(first) = data.samples.first() else {
        warn!("No q samples at T = {}", data.temperature);
        return result;
    };
    let jmax = data
        .samples
        .iter()
        .map(QSample::current_abs)
        .fold(0.0f64, f64::max);
    let usable: Vec<QSample> = data
        .samples
        .iter()
        .filter(|s| jmax > 0.0 && s.current_abs() / jmax > CURRENT_CUTOFF)
        .cloned()
        .collect();
    if usable.len() < MIN_SAMPLES {
        warn!(
            "Only {} q samples carry a current at T = {}, skipping",
            usable.len(),
            data.temperature
        );
        return result;
    }
    let Some(depairing) = depairing_current(&usable) else {
        return result;
    };
    debug!(
        "T = {}: j_dp = {} at q = {}",
        data.temperature, depairing.current, depairing.q_fraction
    );
    result.depairing = Some(depairing);

    let b1 = lattice.reciprocal_basis().row(0).to_owned();
    let b1_norm = b1.dot(&b1).sqrt();
    let cell_area = lattice.cell_area();
    for (band, slot) in result.bands.iter_mut().enumerate() {
        let delta0 = first.delta.get(band).map_or(0.0, |d| d.norm());
        if delta0 == 0.0 {
            continue;
        }
        let mut q = Vec::with_capacity(usable.len() + 1);
        let mut ratio = Vec::with_capacity(usable.len() + 1);
        if usable[0].q_fraction > 0.0 {
            q.push(0.0);
            ratio.push(1.0);
        }
        for s in &usable {
            q.push(s.q_fraction);
            ratio.push(s.delta[band].norm() / delta0);
        }
        let Some(q_half) = half_pairing_crossing(&q, &ratio) else {
            info!("Gap of band {} stays above 1/sqrt(2) at T = {}", band, data.temperature);
            continue;
        };
        let xi = 1.0 / (2f64.sqrt() * q_half * b1_norm);
        *slot = Some(BandLengths {
            q_fraction: q_half,
            delta: delta0 * FRAC_1_SQRT_2,
            xi,
            lambda: (1.0 / (cell_area * xi * depairing.current)).sqrt(),
        });
    }
    result
}

/// Fits $L(T)=L_0/\sqrt{1-T/T_C}$ through the linear relation $1/L^2=(1-T/T_C)/L_0^2$.
///
/// `None` for fewer than [`MIN_FIT_TEMPERATURES`] points or when the lengths do not grow
/// towards $T_C$.
pub fn fit_length_vs_temperature(points: &[(f64, f64)]) -> Option<LengthFit> {
    if points.len() < MIN_FIT_TEMPERATURES {
        return None;
    }
    let temps = Array1::from_iter(points.iter().map(|(t, _)| *t));
    let inverse_sq = Array1::from_iter(points.iter().map(|(_, l)| l.powi(-2)));
    let fit = linear_regression(&temps, &inverse_sq)?;
    if fit.intercept <= 0.0 || fit.slope >= 0.0 {
        return None;
    }
    let fit = LengthFit {
        zero_temperature: fit.intercept.sqrt().recip(),
        critical_temperature: fit.root(),
    };
    (fit.zero_temperature.is_finite() && fit.critical_temperature.is_finite()).then_some(fit)
}

/// Lengths at every swept temperature and their zero-temperature extrapolation.
pub fn analyse_q_data(
    results: &[DeltaVsQ],
    number_of_bands: usize,
    lattice: &dyn BaseLattice,
) -> QAnalysis {
    let mut lengths_vs_temp: Vec<LengthsAtTemperature> = results
        .iter()
        .map(|data| lengths_at_temperature(data, number_of_bands, lattice))
        .collect();
    lengths_vs_temp.sort_by(|a, b| a.temperature.total_cmp(&b.temperature));

    let zero_temperature = (0..number_of_bands)
        .map(|band| {
            let collect = |length: fn(&BandLengths) -> f64| -> Vec<(f64, f64)> {
                lengths_vs_temp
                    .iter()
                    .filter_map(|row| row.bands[band].as_ref().map(|b| (row.temperature, length(b))))
                    .collect()
            };
            ZeroTemperatureLengths {
                xi: fit_length_vs_temperature(&collect(|b| b.xi)),
                lambda: fit_length_vs_temperature(&collect(|b| b.lambda)),
            }
        })
        .collect();
    QAnalysis {
        lengths_vs_temp,
        zero_temperature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::SquareLattice;
    use crate::math::linspace;
    use ndarray::array;
    use num_complex::Complex;
    use std::f64::consts::PI;

    /// Current $x(0.62-x)$ along x, band 0 decaying as $1-x/s$, band 1 flat.
    fn synthetic(temperature: f64, s: f64) -> DeltaVsQ {
        let samples = linspace(0.0, 0.5, 21, true)
            .iter()
            .map(|&x| QSample {
                q_fraction: x,
                delta: array![Complex::new(0.0, 0.4 * (1.0 - x / s)), Complex::new(0.3, 0.0)],
                current: array![x * (0.62 - x), 0.0],
            })
            .collect();
        DeltaVsQ {
            temperature,
            samples,
        }
    }

    #[test]
    fn test_parabola_vertex() {
        let (x, y) = parabola_vertex([0.0, 1.0, 3.0], [-2.0, 0.0, -8.0]).unwrap();
        assert!((x - 1.0).abs() < 1e-12);
        assert!(y.abs() < 1e-12);
        assert!(parabola_vertex([0.0, 1.0, 2.0], [0.0, 1.0, 4.0]).is_none());
    }

    #[test]
    fn test_half_pairing_crossing() {
        let q = [0.0, 0.1, 0.2, 0.3];
        let ratio = [1.0, 0.9, 0.6, 0.5];
        let x = half_pairing_crossing(&q, &ratio).unwrap();
        let expected = 0.1 + (0.9 - FRAC_1_SQRT_2) / 0.3 * 0.1;
        assert!((x - expected).abs() < 1e-14);
        assert!(half_pairing_crossing(&q, &[1.0, 0.95, 0.9, 0.8]).is_none());
    }

    #[test]
    fn test_lengths_from_synthetic_sweep() {
        let lattice = SquareLattice::new(1.0).unwrap();
        let lengths = lengths_at_temperature(&synthetic(0.1, 1.0), 2, &lattice);
        assert_eq!(lengths.temperature, 0.1);

        let dp = lengths.depairing.unwrap();
        assert!((dp.q_fraction - 0.31).abs() < 1e-10);
        assert!((dp.current - 0.0961).abs() < 1e-10);

        let band = lengths.bands[0].unwrap();
        let q_half = 1.0 - FRAC_1_SQRT_2;
        assert!((band.q_fraction - q_half).abs() < 1e-10);
        assert!((band.delta - 0.4 * FRAC_1_SQRT_2).abs() < 1e-12);
        let xi = 1.0 / (2f64.sqrt() * q_half * 2.0 * PI);
        assert!((band.xi - xi).abs() < 1e-8);
        // unit cell of area 1
        assert!((band.lambda - (1.0 / (xi * 0.0961)).sqrt()).abs() < 1e-8);

        assert!(lengths.bands[1].is_none());
    }

    #[test]
    fn test_too_few_current_samples() {
        let lattice = SquareLattice::new(1.0).unwrap();
        let mut data = synthetic(0.2, 1.0);
        for s in data.samples.iter_mut().skip(5) {
            s.current = array![0.0, 0.0];
        }
        let lengths = lengths_at_temperature(&data, 2, &lattice);
        assert!(lengths.depairing.is_none());
        assert_eq!(lengths.bands, vec![None, None]);

        let empty = DeltaVsQ {
            temperature: 0.3,
            samples: vec![],
        };
        assert!(lengths_at_temperature(&empty, 2, &lattice).depairing.is_none());
    }

    #[test]
    fn test_fit_recovers_ginzburg_landau_form() {
        let (l0, tc): (f64, f64) = (2.0, 0.5);
        let points: Vec<(f64, f64)> = [0.3, 0.35, 0.4, 0.45]
            .iter()
            .map(|&t| (t, l0 / (1.0 - t / tc).sqrt()))
            .collect();
        let fit = fit_length_vs_temperature(&points).unwrap();
        assert!((fit.zero_temperature - l0).abs() < 1e-10);
        assert!((fit.critical_temperature - tc).abs() < 1e-10);

        assert!(fit_length_vs_temperature(&points[..2]).is_none());
        // shrinking towards T_C is not Ginzburg-Landau like
        let shrinking: Vec<(f64, f64)> = points.iter().map(|&(t, l)| (t, 1.0 / l)).collect();
        assert!(fit_length_vs_temperature(&shrinking).is_none());
    }

    #[test]
    fn test_analyse_sorts_and_fits() {
        let lattice = SquareLattice::new(1.0).unwrap();
        let tc = 0.5;
        let results: Vec<DeltaVsQ> = [0.3, 0.1, 0.2]
            .iter()
            .map(|&t| synthetic(t, (1.0 - t / tc).sqrt()))
            .collect();
        let analysis = analyse_q_data(&results, 2, &lattice);
        let temps: Vec<f64> = analysis.lengths_vs_temp.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.1, 0.2, 0.3]);
        assert_eq!(analysis.zero_temperature.len(), 2);

        let xi = analysis.zero_temperature[0].xi.unwrap();
        let xi0 = 1.0 / (2f64.sqrt() * (1.0 - FRAC_1_SQRT_2) * 2.0 * PI);
        assert!((xi.zero_temperature - xi0).abs() < 1e-8);
        assert!((xi.critical_temperature - tc).abs() < 1e-8);
        // j_dp is the same at every T, so lambda shrinks with xi^(-1/2)
        assert!(analysis.zero_temperature[0].lambda.is_none());
        assert_eq!(analysis.zero_temperature[1], ZeroTemperatureLengths::default());
    }
}
