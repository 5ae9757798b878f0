#![deny(warnings)]

//! Core domain models and invariants for the delta risk cascade.
//!
//! This crate defines the serializable types shared by the engine, the
//! validation scorer and the store, together with the numeric primitives
//! every cascade stage is built from.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Label used when the caller does not name a scenario.
pub const DEFAULT_SCENARIO: &str = "baseline";

/// Free-form scenario label partitioning stored results into named runs.
///
/// The label is opaque: no formula currently reads it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario(pub String);

impl Scenario {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self(DEFAULT_SCENARIO.to_string())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scenario {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One year of climate observations for the delta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClimateObservation {
    /// Calendar year, unique across the timeline.
    pub year: i32,
    /// Mean temperature in °C.
    pub temperature_celsius: f64,
    /// Annual rainfall in mm.
    pub rainfall_mm: f64,
    /// Glacier melt contribution in cm.
    #[serde(default)]
    pub glacier_contribution_cm: Option<f64>,
    /// Sea-level rise in mm. Informational only.
    #[serde(default)]
    pub sea_level_rise_mm: Option<f64>,
    /// Salinity proxy in [0,1].
    #[serde(default)]
    pub salinity_proxy: Option<f64>,
    /// Vegetation proxy in [0,1].
    #[serde(default)]
    pub vegetation_proxy: Option<f64>,
    /// Whether the row is synthetic rather than observed.
    #[serde(default)]
    pub is_synthetic: bool,
    /// Provenance label.
    #[serde(default)]
    pub data_source: Option<String>,
}

/// Output of one cascade evaluation. All indices are percentages in [0,100]
/// rounded to two decimal places.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub year: i32,
    pub flood_risk: f64,
    pub glacier_amplification: f64,
    pub prey_stress_index: f64,
    pub prey_migration_probability: f64,
    pub tiger_migration_probability: f64,
    pub zoonotic_risk_index: f64,
    /// Scenario-wide constant echoed per row.
    pub human_density_factor: f64,
    /// Prey migration as a unit interval.
    pub wildlife_displacement_score: f64,
    pub is_projection: bool,
    pub scenario: Scenario,
}

/// Slice of stored results that a batch run replaces wholesale.
///
/// `end_year == None` means open-ended (`year >= start_year`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultWindow {
    pub scenario: Scenario,
    pub start_year: i32,
    pub end_year: Option<i32>,
    pub is_projection: bool,
}

impl ResultWindow {
    /// Historical reconstruction over a closed year range.
    pub fn historical(scenario: Scenario, start_year: i32, end_year: i32) -> Self {
        Self {
            scenario,
            start_year,
            end_year: Some(end_year),
            is_projection: false,
        }
    }

    /// Forward projection from `start_year` onwards.
    pub fn projection(scenario: Scenario, start_year: i32) -> Self {
        Self {
            scenario,
            start_year,
            end_year: None,
            is_projection: true,
        }
    }

    pub fn contains_year(&self, year: i32) -> bool {
        year >= self.start_year && self.end_year.map_or(true, |end| year <= end)
    }

    /// Whether a result row belongs to this window.
    pub fn contains(&self, r: &SimulationResult) -> bool {
        self.contains_year(r.year) && r.is_projection == self.is_projection && r.scenario == self.scenario
    }
}

/// Validation errors for observations entering through intake paths.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Year outside supported range [1900, 2200].
    #[error("year {0} is out of supported range [1900, 2200]")]
    YearOutOfRange(i32),
    /// Temperature must lie within [-10, 60] °C.
    #[error("temperature {0} °C is outside [-10, 60]")]
    TemperatureOutOfRange(f64),
    /// Rainfall must lie within [0, 5000] mm.
    #[error("rainfall {0} mm is outside [0, 5000]")]
    RainfallOutOfRange(f64),
    /// A unit-interval proxy fell outside [0, 1].
    #[error("{field} proxy {value} is outside [0, 1]")]
    ProxyOutOfRange { field: &'static str, value: f64 },
    /// Numeric field must be finite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
}

fn check_finite(field: &'static str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite(field))
    }
}

fn check_proxy(field: &'static str, v: Option<f64>) -> Result<(), ValidationError> {
    if let Some(value) = v {
        check_finite(field, value)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::ProxyOutOfRange { field, value });
        }
    }
    Ok(())
}

/// Validate an observation before it is stored.
///
/// The cascade itself never calls this; out-of-range inputs there produce
/// clamped output instead of an error.
pub fn validate_observation(obs: &ClimateObservation) -> Result<(), ValidationError> {
    if !(1900..=2200).contains(&obs.year) {
        return Err(ValidationError::YearOutOfRange(obs.year));
    }
    check_finite("temperature", obs.temperature_celsius)?;
    if !(-10.0..=60.0).contains(&obs.temperature_celsius) {
        return Err(ValidationError::TemperatureOutOfRange(obs.temperature_celsius));
    }
    check_finite("rainfall", obs.rainfall_mm)?;
    if !(0.0..=5000.0).contains(&obs.rainfall_mm) {
        return Err(ValidationError::RainfallOutOfRange(obs.rainfall_mm));
    }
    if let Some(g) = obs.glacier_contribution_cm {
        check_finite("glacier contribution", g)?;
    }
    if let Some(s) = obs.sea_level_rise_mm {
        check_finite("sea-level rise", s)?;
    }
    check_proxy("salinity", obs.salinity_proxy)?;
    check_proxy("vegetation", obs.vegetation_proxy)?;
    Ok(())
}

/// Constrain `x` to the percentage range [0, 100].
pub fn clamp(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Min-max normalization of `x` over `[lo, hi]`.
///
/// Returns 0 for a degenerate range. The result is unbounded when `x` lies
/// outside the range.
pub fn normalize(x: f64, lo: f64, hi: f64) -> f64 {
    if hi == lo {
        return 0.0;
    }
    (x - lo) / (hi - lo)
}

/// Round to two decimal places, ties to even. Rounding starts from the exact
/// binary value of `x`, so `2.675` (stored just below the tie) gives `2.67`.
pub fn round2(x: f64) -> f64 {
    match Decimal::from_f64_retain(x) {
        Some(d) => d
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
            .to_f64()
            .unwrap_or(x),
        None => x,
    }
}
