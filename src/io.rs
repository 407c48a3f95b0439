//! Save/restore of models and the CSV tables the calculations produce.
//!
//! A saved model is the JSON form of its [`ModelParameters`]: a flat object with `name`, the
//! scalar parameters, `beta` (the string `"inf"` at zero temperature), `q`,
//! `hubbard_int_orbital_basis` and the order parameter `delta` as `[re, im]` pairs.
use crate::Direction;
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::models::AnyHamiltonian;
use crate::parameters::{MODEL_NAMES, ModelParameters};
use crate::q_analysis::{QAnalysis, ZeroTemperatureLengths};
use crate::q_loop::DeltaVsQ;
use crate::superfluid_weight::SuperfluidWeight;
use csv::Writer;
use log::info;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use std::fs;
use std::path::Path;

/// Observables computed after an scf run with `calculate_additional`.
#[derive(Debug, Clone)]
pub struct AdditionalProperties {
    /// `None` for a finite pairing momentum.
    pub superfluid_weight: Option<SuperfluidWeight>,
    /// Quantum metric of every band, in band order.
    pub quantum_metric: Vec<Array2<f64>>,
    pub current: Array1<f64>,
}

pub fn save<H, P>(h: &H, path: P) -> Result<()>
where
    H: Hamiltonian + ?Sized,
    P: AsRef<Path>,
{
    let record = serde_json::to_string_pretty(&h.parameters())?;
    fs::write(path.as_ref(), record)?;
    info!("Saved {} to {}", h.name(), path.as_ref().display());
    Ok(())
}

/// Rebuilds a model written by [`save`] through the validated constructors.
pub fn load<P: AsRef<Path>>(path: P) -> Result<AnyHamiltonian> {
    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(path.as_ref())?)?;
    let name = record.get("name").and_then(|n| n.as_str()).unwrap_or_default();
    if !MODEL_NAMES.contains(&name) {
        return Err(BdgError::UnknownModel(name.to_string()));
    }
    let parameters: ModelParameters = serde_json::from_value(record)?;
    parameters.validate()?;
    AnyHamiltonian::from_parameters(&parameters)
}

fn delta_header(first: &str, number_of_bands: usize) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain((0..number_of_bands).map(|i| format!("delta_{}", i)))
        .collect()
}

/// Rows of `(x, Δ)` as `x, |Δ_0|, …, |Δ_{N-1}|` under the header `first, delta_0, …`.
fn write_gap_table<P: AsRef<Path>>(
    path: P,
    first: &str,
    rows: &[(f64, Array1<Complex<f64>>)],
) -> Result<()> {
    let n = rows.first().map(|(_, d)| d.len()).unwrap_or(0);
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(delta_header(first, n))?;
    for (x, delta) in rows {
        let record: Vec<String> = std::iter::once(x.to_string())
            .chain(delta.iter().map(|d| d.norm().to_string()))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!("Wrote {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

pub fn write_delta_vs_temp<P: AsRef<Path>>(
    path: P,
    rows: &[(f64, Array1<Complex<f64>>)],
) -> Result<()> {
    write_gap_table(path, "T", rows)
}

/// `q, delta_0, …, current_x, current_y, current_abs`, one row per converged sample.
pub fn write_delta_vs_q<P: AsRef<Path>>(path: P, data: &DeltaVsQ) -> Result<()> {
    let n = data.samples.first().map(|s| s.delta.len()).unwrap_or(0);
    let mut header = delta_header("q", n);
    header.extend(["current_x", "current_y", "current_abs"].map(String::from));
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(&header)?;
    for sample in &data.samples {
        let record: Vec<String> = std::iter::once(sample.q_fraction)
            .chain(sample.delta.iter().map(|d| d.norm()))
            .chain(sample.current.iter().copied())
            .chain(std::iter::once(sample.current_abs()))
            .map(|x| x.to_string())
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!(
        "Wrote {} q samples at T = {} to {}",
        data.samples.len(),
        data.temperature,
        path.as_ref().display()
    );
    Ok(())
}

fn cell(x: Option<f64>) -> String {
    x.map(|x| x.to_string()).unwrap_or_default()
}

/// `T, q_j_max, j_dp, Q_i, delta_i, xi_i, lambda_i` per band; missing values stay empty.
pub fn write_lengths_vs_temp<P: AsRef<Path>>(path: P, analysis: &QAnalysis) -> Result<()> {
    let n = analysis.zero_temperature.len();
    let mut header: Vec<String> = ["T", "q_j_max", "j_dp"].map(String::from).to_vec();
    for band in 0..n {
        for name in ["Q", "delta", "xi", "lambda"] {
            header.push(format!("{}_{}", name, band));
        }
    }
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(&header)?;
    for row in &analysis.lengths_vs_temp {
        let mut record = vec![
            row.temperature.to_string(),
            cell(row.depairing.map(|d| d.q_fraction)),
            cell(row.depairing.map(|d| d.current)),
        ];
        for band in &row.bands {
            record.push(cell(band.map(|b| b.q_fraction)));
            record.push(cell(band.map(|b| b.delta)));
            record.push(cell(band.map(|b| b.xi)));
            record.push(cell(band.map(|b| b.lambda)));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!("Wrote lengths vs. temperature to {}", path.as_ref().display());
    Ok(())
}

/// `band, xi_0, T_C_xi, lambda_0, T_C_lambda`; bands without a fit get empty cells.
pub fn write_zero_temperature_lengths<P: AsRef<Path>>(
    path: P,
    lengths: &[ZeroTemperatureLengths],
) -> Result<()> {
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(["band", "xi_0", "T_C_xi", "lambda_0", "T_C_lambda"])?;
    for (band, l) in lengths.iter().enumerate() {
        wtr.write_record([
            band.to_string(),
            cell(l.xi.map(|f| f.zero_temperature)),
            cell(l.xi.map(|f| f.critical_temperature)),
            cell(l.lambda.map(|f| f.zero_temperature)),
            cell(l.lambda.map(|f| f.critical_temperature)),
        ])?;
    }
    wtr.flush()?;
    info!("Wrote zero-temperature lengths to {}", path.as_ref().display());
    Ok(())
}

/// `band, T_C`; bands without a fit get an empty `T_C`.
pub fn write_critical_temperatures<P: AsRef<Path>>(
    path: P,
    critical_temperatures: &[Option<f64>],
) -> Result<()> {
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(["band", "T_C"])?;
    for (band, tc) in critical_temperatures.iter().enumerate() {
        wtr.write_record([band.to_string(), cell(*tc)])?;
    }
    wtr.flush()?;
    info!("Wrote critical temperatures to {}", path.as_ref().display());
    Ok(())
}

/// Long format `quantity, band, direction_1, direction_2, value`; `band` and the second
/// direction are empty where they do not apply.
pub fn write_additional<P: AsRef<Path>>(path: P, props: &AdditionalProperties) -> Result<()> {
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(["quantity", "band", "direction_1", "direction_2", "value"])?;
    let mut tensor = |name: &str, band: String, m: &Array2<f64>| -> Result<()> {
        for d1 in Direction::ALL {
            for d2 in Direction::ALL {
                wtr.write_record([
                    name.to_string(),
                    band.clone(),
                    d1.to_string(),
                    d2.to_string(),
                    m[[d1.index(), d2.index()]].to_string(),
                ])?;
            }
        }
        Ok(())
    };
    if let Some(d) = &props.superfluid_weight {
        tensor("superfluid_weight_conventional", String::new(), &d.conventional.mapv(|z| z.re))?;
        tensor("superfluid_weight_geometric", String::new(), &d.geometric.mapv(|z| z.re))?;
    }
    for (band, g) in props.quantum_metric.iter().enumerate() {
        tensor("quantum_metric", band.to_string(), g)?;
    }
    for dir in Direction::ALL {
        wtr.write_record([
            "current".to_string(),
            String::new(),
            dir.to_string(),
            String::new(),
            props.current[dir.index()].to_string(),
        ])?;
    }
    wtr.flush()?;
    info!("Wrote additional properties to {}", path.as_ref().display());
    Ok(())
}
