//! Small numerical helpers: occupation functions, broadening kernels and the least-squares line
//! fit used to extrapolate critical temperatures.
use ndarray::{Array1, ArrayBase, Data, Ix1};
use std::f64::consts::PI;

pub fn gauss(x: f64, eta: f64) -> f64 {
    //高斯函数
    let a = x / eta;
    let g = (-a * a / 2.0).exp();
    1.0 / (2.0 * PI).sqrt() / eta * g
}

/// Fermi-Dirac occupation $f(E)=1/(e^{\beta E}+1)$.
///
/// For $\beta=\infty$ the step function is returned directly, `exp` is never evaluated.
#[inline(always)]
pub fn fermi_dirac(energy: f64, beta: f64) -> f64 {
    if beta.is_infinite() {
        if energy < 0.0 { 1.0 } else { 0.0 }
    } else {
        ((beta * energy).exp() + 1.0).recip()
    }
}

/// $\partial f/\partial E=-\beta f(1-f)$, zero in the $\beta=\infty$ limit.
#[inline(always)]
pub fn fermi_dirac_derivative(energy: f64, beta: f64) -> f64 {
    if beta.is_infinite() {
        0.0
    } else {
        let f = fermi_dirac(energy, beta);
        -beta * f * (1.0 - f)
    }
}

/// `num` evenly spaced samples over `[start, stop)` or `[start, stop]`.
pub fn linspace(start: f64, stop: f64, num: usize, endpoint: bool) -> Array1<f64> {
    if num == 0 {
        return Array1::zeros(0);
    }
    if endpoint {
        Array1::linspace(start, stop, num)
    } else {
        let step = (stop - start) / num as f64;
        Array1::from_iter((0..num).map(|i| start + step * i as f64))
    }
}

/// Result of an ordinary least-squares fit $y=\text{slope}\,x+\text{intercept}$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Standard error of the slope.
    pub stderr: f64,
}

impl LinearFit {
    /// Zero crossing $-\text{intercept}/\text{slope}$.
    pub fn root(&self) -> f64 {
        -self.intercept / self.slope
    }
}

/// Least-squares regression of `y` on `x`.
///
/// Returns `None` for fewer than two points or when all `x` coincide. The slope standard error is
/// $\sqrt{\sum_i r_i^2/(n-2)/\sum_i(x_i-\bar x)^2}$, zero for exactly two points.
pub fn linear_regression<S, T>(x: &ArrayBase<S, Ix1>, y: &ArrayBase<T, Ix1>) -> Option<LinearFit>
where
    S: Data<Elem = f64>,
    T: Data<Elem = f64>,
{
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let x_mean = x.sum() / n as f64;
    let y_mean = y.sum() / n as f64;
    let mut ssxx = 0.0;
    let mut ssxy = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        ssxx += (xi - x_mean).powi(2);
        ssxy += (xi - x_mean) * (yi - y_mean);
    }
    if ssxx == 0.0 {
        return None;
    }
    let slope = ssxy / ssxx;
    let intercept = y_mean - slope * x_mean;
    let stderr = if n > 2 {
        let ssr: f64 = x
            .iter()
            .zip(y.iter())
            .map(|(xi, yi)| (yi - (slope * xi + intercept)).powi(2))
            .sum();
        (ssr / (n - 2) as f64 / ssxx).sqrt()
    } else {
        0.0
    };
    Some(LinearFit {
        slope,
        intercept,
        stderr,
    })
}
