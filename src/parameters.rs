//! Input file schema.
//!
//! A run is described by one TOML file with three tables:
//!
//! ```toml
//! [control]
//! calculation = "scf"          # "scf" | "crit-temp" | "q-loop"
//! prefix = "one_band"
//! outdir = "out"
//! conv_treshold = 1e-4
//!
//! [model]
//! name = "OneBand"
//! hopping = 1.0
//! lattice_constant = 1.0
//! chemical_potential = 0.0
//! hubbard_int_orbital_basis = [1.0]
//!
//! [k_points]
//! nk1 = 30
//! nk2 = 30
//! ```
//!
//! Every float is checked to be finite and hoppings/lattice constants non-negative before any
//! model is built; errors name the offending field.
use crate::error::{BdgError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    pub control: Control,
    pub model: ModelParameters,
    pub k_points: KPoints,
}

impl Parameters {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn validate(&self) -> Result<()> {
        self.control.validate()?;
        self.model.validate()?;
        self.k_points.validate()
    }
}

impl FromStr for Parameters {
    type Err = BdgError;
    fn from_str(s: &str) -> Result<Self> {
        let parameters: Parameters = toml::from_str(s)?;
        parameters.validate()?;
        Ok(parameters)
    }
}

/// `[control]`: what to run and where to put the results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Control {
    /// `"scf"`, `"crit-temp"` or `"q-loop"`; checked when the run is dispatched.
    pub calculation: String,
    pub prefix: String,
    pub outdir: PathBuf,
    pub conv_treshold: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_n_points")]
    pub n_temp_points: usize,
    #[serde(default = "default_n_points")]
    pub n_q_points: usize,
    #[serde(default)]
    pub calculate_additional: bool,
    /// Seed of the initial-gap generator, fresh entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Critical temperatures for a q-loop; computed first when absent.
    #[serde(default)]
    pub crit_temp: Option<Vec<f64>>,
}

fn default_max_iter() -> usize {
    1000
}

fn default_n_points() -> usize {
    50
}

impl Control {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(BdgError::invalid_parameter("prefix", "must not be empty"));
        }
        if !self.conv_treshold.is_finite() || self.conv_treshold <= 0.0 {
            return Err(BdgError::invalid_parameter(
                "conv_treshold",
                "must be a positive finite number",
            ));
        }
        if self.max_iter == 0 {
            return Err(BdgError::invalid_parameter("max_iter", "must be at least 1"));
        }
        if self.n_temp_points == 0 {
            return Err(BdgError::invalid_parameter("n_temp_points", "must be at least 1"));
        }
        if self.n_q_points < 2 {
            return Err(BdgError::invalid_parameter("n_q_points", "must be at least 2"));
        }
        if let Some(tc) = &self.crit_temp {
            if tc.is_empty() || tc.iter().any(|t| !t.is_finite() || *t <= 0.0) {
                return Err(BdgError::invalid_parameter(
                    "crit_temp",
                    "must be a non-empty list of positive temperatures",
                ));
            }
        }
        Ok(())
    }
}

/// `[k_points]`: size of the Brillouin-zone grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct KPoints {
    pub nk1: usize,
    pub nk2: usize,
}

impl KPoints {
    pub fn validate(&self) -> Result<()> {
        if self.nk1 < 2 {
            return Err(BdgError::invalid_parameter("nk1", "must be at least 2"));
        }
        if self.nk2 < 2 {
            return Err(BdgError::invalid_parameter("nk2", "must be at least 2"));
        }
        Ok(())
    }
}

/// Every accepted value of the `name` tag.
pub const MODEL_NAMES: [&str; 5] = ["OneBand", "TwoBand", "Graphene", "DressedGraphene", "TightBinding"];

/// `[model]`, tagged by `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name")]
pub enum ModelParameters {
    OneBand(OneBandParameters),
    TwoBand(TwoBandParameters),
    Graphene(GrapheneParameters),
    DressedGraphene(DressedGrapheneParameters),
    TightBinding(TightBindingParameters),
}

impl ModelParameters {
    pub fn name(&self) -> &'static str {
        match self {
            ModelParameters::OneBand(_) => "OneBand",
            ModelParameters::TwoBand(_) => "TwoBand",
            ModelParameters::Graphene(_) => "Graphene",
            ModelParameters::DressedGraphene(_) => "DressedGraphene",
            ModelParameters::TightBinding(_) => "TightBinding",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ModelParameters::OneBand(p) => p.validate(),
            ModelParameters::TwoBand(p) => p.validate(),
            ModelParameters::Graphene(p) => p.validate(),
            ModelParameters::DressedGraphene(p) => p.validate(),
            ModelParameters::TightBinding(p) => p.validate(),
        }
    }
}

fn default_beta() -> f64 {
    f64::INFINITY
}

/// `beta` is written as a string when infinite, JSON has no literal for it.
mod beta_format {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(beta: &f64, s: S) -> Result<S::Ok, S::Error> {
        if beta.is_finite() {
            s.serialize_f64(*beta)
        } else if *beta > 0.0 {
            s.serialize_str("inf")
        } else {
            s.serialize_str(&beta.to_string())
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(x) => Ok(x),
            Repr::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                other => other.parse::<f64>().map_err(D::Error::custom),
            },
        }
    }
}

pub(crate) fn check_finite(field: &str, value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(BdgError::invalid_parameter(field, "must not be NaN"));
    }
    if value.is_infinite() {
        return Err(BdgError::invalid_parameter(field, "must not be Infinity"));
    }
    Ok(())
}

pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<()> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(BdgError::invalid_parameter(field, "must be positive"));
    }
    Ok(())
}

fn check_mean_field(
    number_of_bands: usize,
    hubbard_int_orbital_basis: &[f64],
    q: &Option<[f64; 2]>,
    delta: &Option<Vec<[f64; 2]>>,
) -> Result<()> {
    if hubbard_int_orbital_basis.len() != number_of_bands {
        return Err(BdgError::invalid_parameter(
            "hubbard_int_orbital_basis",
            format!("expected {} entries, got {}", number_of_bands, hubbard_int_orbital_basis.len()),
        ));
    }
    for u in hubbard_int_orbital_basis {
        check_finite("hubbard_int_orbital_basis", *u)?;
    }
    if let Some(q) = q {
        check_finite("q", q[0])?;
        check_finite("q", q[1])?;
    }
    if let Some(delta) = delta {
        if delta.len() != number_of_bands {
            return Err(BdgError::invalid_parameter(
                "delta",
                format!("expected {} entries, got {}", number_of_bands, delta.len()),
            ));
        }
        for [re, im] in delta {
            check_finite("delta", *re)?;
            check_finite("delta", *im)?;
        }
    }
    Ok(())
}

/// Single band on the square lattice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneBandParameters {
    pub hopping: f64,
    pub lattice_constant: f64,
    pub chemical_potential: f64,
    pub hubbard_int_orbital_basis: Vec<f64>,
    #[serde(default = "default_beta", with = "beta_format")]
    pub beta: f64,
    #[serde(default)]
    pub q: Option<[f64; 2]>,
    #[serde(default)]
    pub delta: Option<Vec<[f64; 2]>>,
}

impl OneBandParameters {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("hopping", self.hopping)?;
        check_non_negative("lattice_constant", self.lattice_constant)?;
        check_finite("chemical_potential", self.chemical_potential)?;
        check_mean_field(1, &self.hubbard_int_orbital_basis, &self.q, &self.delta)
    }

    #[cfg(test)]
    pub(crate) fn example() -> Self {
        OneBandParameters {
            hopping: 1.0,
            lattice_constant: 1.0,
            chemical_potential: 0.0,
            hubbard_int_orbital_basis: vec![1.0],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        }
    }
}

/// Two uncoupled square-lattice bands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwoBandParameters {
    pub hopping: f64,
    pub lattice_constant: f64,
    pub chemical_potential: f64,
    pub hubbard_int_orbital_basis: Vec<f64>,
    #[serde(default = "default_beta", with = "beta_format")]
    pub beta: f64,
    #[serde(default)]
    pub q: Option<[f64; 2]>,
    #[serde(default)]
    pub delta: Option<Vec<[f64; 2]>>,
}

impl TwoBandParameters {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("hopping", self.hopping)?;
        check_non_negative("lattice_constant", self.lattice_constant)?;
        check_finite("chemical_potential", self.chemical_potential)?;
        check_mean_field(2, &self.hubbard_int_orbital_basis, &self.q, &self.delta)
    }

    #[cfg(test)]
    pub(crate) fn example() -> Self {
        TwoBandParameters {
            hopping: 1.0,
            lattice_constant: 1.0,
            chemical_potential: -0.5,
            hubbard_int_orbital_basis: vec![1.0, 0.5],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        }
    }
}

/// Nearest-neighbour graphene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrapheneParameters {
    pub hopping: f64,
    pub lattice_constant: f64,
    pub chemical_potential: f64,
    pub hubbard_int_orbital_basis: Vec<f64>,
    #[serde(default = "default_beta", with = "beta_format")]
    pub beta: f64,
    #[serde(default)]
    pub q: Option<[f64; 2]>,
    #[serde(default)]
    pub delta: Option<Vec<[f64; 2]>>,
}

impl GrapheneParameters {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("hopping", self.hopping)?;
        check_non_negative("lattice_constant", self.lattice_constant)?;
        check_finite("chemical_potential", self.chemical_potential)?;
        check_mean_field(2, &self.hubbard_int_orbital_basis, &self.q, &self.delta)
    }

    #[cfg(test)]
    pub(crate) fn example() -> Self {
        GrapheneParameters {
            hopping: 1.0,
            lattice_constant: 3f64.sqrt(),
            chemical_potential: 0.5,
            hubbard_int_orbital_basis: vec![1.0, 1.0],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        }
    }
}

/// Graphene with an additional orbital X hybridized to sublattice A.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DressedGrapheneParameters {
    /// Hopping in graphene.
    pub hopping_gr: f64,
    /// Hopping between X orbitals.
    pub hopping_x: f64,
    /// Hybridization between X and sublattice A.
    pub hopping_x_gr_a: f64,
    pub lattice_constant: f64,
    pub chemical_potential: f64,
    pub hubbard_int_orbital_basis: Vec<f64>,
    #[serde(default = "default_beta", with = "beta_format")]
    pub beta: f64,
    #[serde(default)]
    pub q: Option<[f64; 2]>,
    #[serde(default)]
    pub delta: Option<Vec<[f64; 2]>>,
}

impl DressedGrapheneParameters {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("hopping_gr", self.hopping_gr)?;
        check_non_negative("hopping_x", self.hopping_x)?;
        check_non_negative("hopping_x_gr_a", self.hopping_x_gr_a)?;
        check_non_negative("lattice_constant", self.lattice_constant)?;
        check_finite("chemical_potential", self.chemical_potential)?;
        check_mean_field(3, &self.hubbard_int_orbital_basis, &self.q, &self.delta)
    }

    #[cfg(test)]
    pub(crate) fn example() -> Self {
        DressedGrapheneParameters {
            hopping_gr: 1.0,
            hopping_x: 0.01,
            hopping_x_gr_a: 1.0,
            lattice_constant: 3f64.sqrt(),
            chemical_potential: 0.0,
            hubbard_int_orbital_basis: vec![1.0, 1.0, 1.0],
            beta: f64::INFINITY,
            q: None,
            delta: None,
        }
    }
}

/// One entry of a hopping table: amplitude `t` from orbital `j` in cell `R` to orbital `i` in
/// the home cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HoppingTerm {
    pub i: usize,
    pub j: usize,
    /// Lattice vector in units of `lattice_vectors`.
    pub r: [i32; 2],
    /// `[re, im]`.
    pub t: [f64; 2],
}

/// Generic N-orbital tight-binding model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TightBindingParameters {
    /// Real-space lattice vectors as rows.
    pub lattice_vectors: [[f64; 2]; 2],
    /// Orbital positions in fractional coordinates, all at the origin when absent.
    #[serde(default)]
    pub orbital_positions: Option<Vec<[f64; 2]>>,
    /// On-site energies, one per orbital.
    pub onsite: Vec<f64>,
    #[serde(default)]
    pub hoppings: Vec<HoppingTerm>,
    pub chemical_potential: f64,
    pub hubbard_int_orbital_basis: Vec<f64>,
    #[serde(default = "default_beta", with = "beta_format")]
    pub beta: f64,
    #[serde(default)]
    pub q: Option<[f64; 2]>,
    #[serde(default)]
    pub delta: Option<Vec<[f64; 2]>>,
}

impl TightBindingParameters {
    pub fn number_of_bands(&self) -> usize {
        self.onsite.len()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.number_of_bands();
        if n == 0 {
            return Err(BdgError::invalid_parameter("onsite", "needs at least one orbital"));
        }
        for row in self.lattice_vectors.iter() {
            for x in row {
                check_finite("lattice_vectors", *x)?;
            }
        }
        let [a1, a2] = self.lattice_vectors;
        if (a1[0] * a2[1] - a1[1] * a2[0]).abs() < 1e-12 {
            return Err(BdgError::invalid_parameter(
                "lattice_vectors",
                "must be linearly independent",
            ));
        }
        if let Some(pos) = &self.orbital_positions {
            if pos.len() != n {
                return Err(BdgError::invalid_parameter(
                    "orbital_positions",
                    format!("expected {} entries, got {}", n, pos.len()),
                ));
            }
            for p in pos.iter().flatten() {
                check_finite("orbital_positions", *p)?;
            }
        }
        for e in self.onsite.iter() {
            check_finite("onsite", *e)?;
        }
        for hop in self.hoppings.iter() {
            if hop.i >= n || hop.j >= n {
                return Err(BdgError::invalid_parameter(
                    "hoppings",
                    format!("orbital index ({}, {}) out of range for {} orbitals", hop.i, hop.j, n),
                ));
            }
            if hop.i == hop.j && hop.r == [0, 0] {
                return Err(BdgError::invalid_parameter(
                    "hoppings",
                    "on-site terms belong into 'onsite'",
                ));
            }
            check_finite("hoppings", hop.t[0])?;
            check_finite("hoppings", hop.t[1])?;
        }
        check_finite("chemical_potential", self.chemical_potential)?;
        check_mean_field(n, &self.hubbard_int_orbital_basis, &self.q, &self.delta)
    }
}
