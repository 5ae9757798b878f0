#![deny(warnings)]

//! Accuracy scoring of historical cascade output against observed benchmarks.

use cascade_core::{round2, SimulationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Returned by the error metrics when inputs are empty or misaligned.
pub const METRIC_SENTINEL: f64 = -1.0;

/// Fixed note attached to every validation summary.
pub const VALIDATION_NOTE: &str = "Observed values are synthetic reference benchmarks aligned to Sundarbans historical event frequency.";

const FLOOD_V1: [(i32, f64); 10] = [
    (2014, 28.0),
    (2015, 31.0),
    (2016, 45.0),
    (2017, 42.0),
    (2018, 55.0),
    (2019, 60.0),
    (2020, 68.0),
    (2021, 72.0),
    (2022, 78.0),
    (2023, 82.0),
];

const ZOONOTIC_V1: [(i32, f64); 10] = [
    (2014, 22.0),
    (2015, 25.0),
    (2016, 33.0),
    (2017, 31.0),
    (2018, 40.0),
    (2019, 44.0),
    (2020, 51.0),
    (2021, 55.0),
    (2022, 60.0),
    (2023, 65.0),
];

/// Immutable year-keyed observed series for flood severity and zoonotic exposure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTable {
    pub version: String,
    pub flood: BTreeMap<i32, f64>,
    pub zoonotic: BTreeMap<i32, f64>,
}

impl BenchmarkTable {
    pub fn new(
        version: impl Into<String>,
        flood: BTreeMap<i32, f64>,
        zoonotic: BTreeMap<i32, f64>,
    ) -> Self {
        Self {
            version: version.into(),
            flood,
            zoonotic,
        }
    }

    /// Reference series for the Sundarbans delta, 2014–2023.
    pub fn sundarbans_v1() -> Self {
        Self::new(
            "sundarbans-v1",
            FLOOD_V1.into_iter().collect(),
            ZOONOTIC_V1.into_iter().collect(),
        )
    }

    pub fn get_flood(&self, year: i32) -> Option<f64> {
        self.flood.get(&year).copied()
    }

    pub fn get_zoonotic(&self, year: i32) -> Option<f64> {
        self.zoonotic.get(&year).copied()
    }

    /// First and last year covered by either series.
    pub fn year_span(&self) -> Option<(i32, i32)> {
        let first = self.flood.keys().chain(self.zoonotic.keys()).min()?;
        let last = self.flood.keys().chain(self.zoonotic.keys()).max()?;
        Some((*first, *last))
    }
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::sundarbans_v1()
    }
}

/// Mean absolute error rounded to two places.
///
/// Returns [`METRIC_SENTINEL`] when the inputs are empty or of different
/// lengths.
pub fn compute_mae(predicted: &[f64], observed: &[f64]) -> f64 {
    if predicted.is_empty() || predicted.len() != observed.len() {
        return METRIC_SENTINEL;
    }
    let total: f64 = predicted
        .iter()
        .zip(observed)
        .map(|(p, o)| (p - o).abs())
        .sum();
    round2(total / predicted.len() as f64)
}

/// Mean of `|p - o| / o * 100` over pairs with a non-zero observation.
///
/// Returns 0.0 when no pair qualifies and [`METRIC_SENTINEL`] for empty or
/// misaligned inputs.
pub fn compute_error_pct(predicted: &[f64], observed: &[f64]) -> f64 {
    if predicted.is_empty() || predicted.len() != observed.len() {
        return METRIC_SENTINEL;
    }
    let pct: Vec<f64> = predicted
        .iter()
        .zip(observed)
        .filter(|(_, o)| **o != 0.0)
        .map(|(p, o)| (p - o).abs() / o * 100.0)
        .collect();
    if pct.is_empty() {
        return 0.0;
    }
    round2(pct.iter().sum::<f64>() / pct.len() as f64)
}

/// One scored year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerYearValidation {
    pub year: i32,
    pub predicted_flood_risk: f64,
    pub observed_flood_risk: f64,
    pub flood_abs_error: f64,
    pub predicted_zoonotic_risk: f64,
    pub observed_zoonotic_risk: f64,
    pub zoonotic_abs_error: f64,
    /// No flood benchmark for this year; 0.0 was substituted.
    pub flood_benchmark_missing: bool,
    /// No zoonotic benchmark for this year; 0.0 was substituted.
    pub zoonotic_benchmark_missing: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub flood_risk_mae: f64,
    pub flood_risk_mean_error_pct: f64,
    pub zoonotic_risk_mae: f64,
    pub zoonotic_risk_mean_error_pct: f64,
    pub validation_note: String,
    pub benchmark_version: String,
    /// Years scored against a substituted 0.0 in either series.
    pub missing_benchmark_years: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub summary: ValidationSummary,
    pub per_year: Vec<PerYearValidation>,
}

/// Score historical results against `table`.
///
/// Rows are scored in the order given. Returns `None` for an empty input so
/// the caller can report that the simulation has not been run yet.
pub fn score(results: &[SimulationResult], table: &BenchmarkTable) -> Option<ValidationReport> {
    if results.is_empty() {
        return None;
    }

    let flood_obs: Vec<Option<f64>> = results.iter().map(|r| table.get_flood(r.year)).collect();
    let zoo_obs: Vec<Option<f64>> = results
        .iter()
        .map(|r| table.get_zoonotic(r.year))
        .collect();

    let predicted_flood: Vec<f64> = results.iter().map(|r| r.flood_risk).collect();
    let observed_flood: Vec<f64> = flood_obs.iter().map(|o| o.unwrap_or(0.0)).collect();
    let predicted_zoo: Vec<f64> = results.iter().map(|r| r.zoonotic_risk_index).collect();
    let observed_zoo: Vec<f64> = zoo_obs.iter().map(|o| o.unwrap_or(0.0)).collect();

    let mut per_year = Vec::with_capacity(results.len());
    let mut missing_years = Vec::new();
    for (i, r) in results.iter().enumerate() {
        let flood_missing = flood_obs[i].is_none();
        let zoo_missing = zoo_obs[i].is_none();
        if flood_missing || zoo_missing {
            warn!(
                year = r.year,
                version = %table.version,
                "no benchmark for year, scoring against 0.0"
            );
            missing_years.push(r.year);
        }
        per_year.push(PerYearValidation {
            year: r.year,
            predicted_flood_risk: r.flood_risk,
            observed_flood_risk: observed_flood[i],
            flood_abs_error: round2((r.flood_risk - observed_flood[i]).abs()),
            predicted_zoonotic_risk: r.zoonotic_risk_index,
            observed_zoonotic_risk: observed_zoo[i],
            zoonotic_abs_error: round2((r.zoonotic_risk_index - observed_zoo[i]).abs()),
            flood_benchmark_missing: flood_missing,
            zoonotic_benchmark_missing: zoo_missing,
        });
    }

    Some(ValidationReport {
        summary: ValidationSummary {
            flood_risk_mae: compute_mae(&predicted_flood, &observed_flood),
            flood_risk_mean_error_pct: compute_error_pct(&predicted_flood, &observed_flood),
            zoonotic_risk_mae: compute_mae(&predicted_zoo, &observed_zoo),
            zoonotic_risk_mean_error_pct: compute_error_pct(&predicted_zoo, &observed_zoo),
            validation_note: VALIDATION_NOTE.to_string(),
            benchmark_version: table.version.clone(),
            missing_benchmark_years: missing_years,
        },
        per_year,
    })
}
