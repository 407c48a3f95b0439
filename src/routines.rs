//! The calculations a run can ask for, wired from validated [`Parameters`] to output files.
use crate::error::{BdgError, Result};
use crate::hamiltonian::Hamiltonian;
use crate::io::{self, AdditionalProperties};
use crate::models::AnyHamiltonian;
use crate::parameters::Parameters;
use crate::{
    crit_temp, current, q_analysis, q_loop, quantum_metric, self_consistency, superfluid_weight,
};
use log::{debug, info, warn};
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calculation {
    Scf,
    CritTemp,
    QLoop,
}

impl FromStr for Calculation {
    type Err = BdgError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scf" => Ok(Calculation::Scf),
            "crit-temp" => Ok(Calculation::CritTemp),
            "q-loop" => Ok(Calculation::QLoop),
            other => Err(BdgError::UnknownCalculation(other.to_string())),
        }
    }
}

fn output_path(parameters: &Parameters, suffix: &str) -> PathBuf {
    parameters
        .control
        .outdir
        .join(format!("{}_{}", parameters.control.prefix, suffix))
}

/// Runs the calculation selected in `[control]`.
pub fn run(parameters: &Parameters) -> Result<()> {
    let calculation: Calculation = parameters.control.calculation.parse()?;
    fs::create_dir_all(&parameters.control.outdir)?;
    let h = AnyHamiltonian::from_parameters(&parameters.model)?;
    let k = h
        .lattice()
        .generate_mp_grid(parameters.k_points.nk1, parameters.k_points.nk2)?;
    let seed = match parameters.control.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            info!("No seed given, using {}", seed);
            seed
        }
    };
    info!(
        "Running {:?} for {} on {} k-points",
        calculation,
        h.name(),
        k.nrows()
    );
    match calculation {
        Calculation::Scf => scf(parameters, h, &k, seed).map(|_| ()),
        Calculation::CritTemp => crit_temp(parameters, &h, &k, seed).map(|_| ()),
        Calculation::QLoop => q_loop(parameters, &h, &k, seed),
    }
}

/// Superfluid weight (zero pairing momentum only), quantum metric of every band and current.
pub fn additional_properties<H>(h: &H, k: &Array2<f64>) -> Result<AdditionalProperties>
where
    H: Hamiltonian + ?Sized,
{
    let superfluid_weight = if h.has_pairing_momentum() {
        warn!("Skipping the superfluid weight for finite pairing momentum");
        None
    } else {
        let d = superfluid_weight::calculate_superfluid_weight(h, k)?;
        info!("Superfluid weight (conventional): {}", d.conventional);
        info!("Superfluid weight (geometric): {}", d.geometric);
        Some(d)
    };
    let quantum_metric = (0..h.number_of_bands())
        .map(|band| quantum_metric::calculate_quantum_metric(h, k, &[band]))
        .collect::<Result<Vec<_>>>()?;
    for (band, g) in quantum_metric.iter().enumerate() {
        debug!("Quantum metric of band {}: {}", band, g);
    }
    let current = current::calculate_current_density(h, k)?;
    info!("Current density: {}", current);
    Ok(AdditionalProperties {
        superfluid_weight,
        quantum_metric,
        current,
    })
}

/// Self-consistent gap at the configured temperature, saved as `<prefix>_sc.json`.
pub fn scf(
    parameters: &Parameters,
    mut h: AnyHamiltonian,
    k: &Array2<f64>,
    seed: u64,
) -> Result<AnyHamiltonian> {
    let control = &parameters.control;
    let mut rng = SmallRng::seed_from_u64(seed);
    self_consistency::self_consistency_loop(&mut h, k, control.conv_treshold, control.max_iter, &mut rng)?;
    info!("Delta: {}", h.delta_orbital_basis());
    info!("Spectral gap: {}", h.spectral_gap(k)?);
    io::save(&h, output_path(parameters, "sc.json"))?;
    if control.calculate_additional {
        let props = additional_properties(&h, k)?;
        io::write_additional(output_path(parameters, "sc_additional.csv"), &props)?;
    }
    Ok(h)
}

/// Critical temperatures per band; writes the gap-vs-temperature and `T_C` tables.
pub fn crit_temp(
    parameters: &Parameters,
    h: &AnyHamiltonian,
    k: &Array2<f64>,
    seed: u64,
) -> Result<Vec<Option<f64>>> {
    let control = &parameters.control;
    let result = crit_temp::search_crit_temp(
        h,
        k,
        control.conv_treshold,
        control.max_iter,
        control.n_temp_points,
        seed,
    )?;
    info!("Search for T_C completed");
    debug!("Obtained T_Cs: {:?}", result.critical_temperatures);
    io::write_delta_vs_temp(output_path(parameters, "delta_vs_temp.csv"), &result.delta_vs_temp)?;
    io::write_critical_temperatures(
        output_path(parameters, "critical_temperatures.csv"),
        &result.critical_temperatures,
    )?;
    Ok(result.critical_temperatures)
}

/// Gap and current vs. pairing momentum, one `<prefix>_q_<T>.csv` per temperature, followed by
/// the coherence length and penetration depth tables `<prefix>_lengths_vs_temp.csv` and
/// `<prefix>_zero_temp_lengths.csv`. Critical temperatures come from `[control] crit_temp` or are
/// searched first.
pub fn q_loop(
    parameters: &Parameters,
    h: &AnyHamiltonian,
    k: &Array2<f64>,
    seed: u64,
) -> Result<()> {
    let control = &parameters.control;
    let crit_temps: Vec<f64> = match &control.crit_temp {
        Some(list) => list.clone(),
        None => {
            info!("No critical temperatures given, searching them first");
            crit_temp(parameters, h, k, seed)?.into_iter().flatten().collect()
        }
    };
    let results = q_loop::q_loop(
        h,
        k,
        &crit_temps,
        control.n_q_points,
        control.conv_treshold,
        control.max_iter,
        seed,
    )?;
    for data in results.iter() {
        io::write_delta_vs_q(output_path(parameters, &format!("q_{}.csv", data.temperature)), data)?;
    }
    let analysis = q_analysis::analyse_q_data(&results, h.number_of_bands(), h.lattice().as_ref());
    io::write_lengths_vs_temp(output_path(parameters, "lengths_vs_temp.csv"), &analysis)?;
    io::write_zero_temperature_lengths(
        output_path(parameters, "zero_temp_lengths.csv"),
        &analysis.zero_temperature,
    )?;
    Ok(())
}
