//! Command-line surface: global `--config`/`--db` plus one subcommand.

use cascade_core::ClimateObservation;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cascade")]
#[command(about = "Delta risk cascade: seed climate data, run the cascade, score it")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overrides the environment and the config file
    #[arg(long, global = true)]
    pub db: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the synthetic baseline into empty windows
    Seed,
    /// Validate and store one climate observation
    AddClimate(ObservationArgs),
    /// Import a JSON array of observations
    Import {
        file: PathBuf,
    },
    /// List stored observations
    Climate {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Recompute historical results over a year range
    Run {
        #[arg(long)]
        start: Option<i32>,
        #[arg(long)]
        end: Option<i32>,
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Recompute projections
    Project {
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Score stored historical results against the benchmarks
    Validate {
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Historical run, projection run and validation in one go
    RunAll {
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Query stored results
    Results(ResultQuery),
    /// Rule-based mitigation advice for stored results
    Mitigations(ResultQuery),
    /// Print version and build metadata
    Version,
}

#[derive(Args, Debug)]
pub struct ObservationArgs {
    #[arg(long)]
    pub year: i32,
    /// Mean temperature in °C
    #[arg(long)]
    pub temperature: f64,
    /// Annual rainfall in mm
    #[arg(long)]
    pub rainfall: f64,
    /// Glacier contribution in cm
    #[arg(long)]
    pub glacier: Option<f64>,
    /// Sea-level rise in mm
    #[arg(long)]
    pub sea_level: Option<f64>,
    #[arg(long)]
    pub salinity: Option<f64>,
    #[arg(long)]
    pub vegetation: Option<f64>,
    /// Provenance label
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub synthetic: bool,
}

impl From<ObservationArgs> for ClimateObservation {
    fn from(a: ObservationArgs) -> Self {
        ClimateObservation {
            year: a.year,
            temperature_celsius: a.temperature,
            rainfall_mm: a.rainfall,
            glacier_contribution_cm: a.glacier,
            sea_level_rise_mm: a.sea_level,
            salinity_proxy: a.salinity,
            vegetation_proxy: a.vegetation,
            is_synthetic: a.synthetic,
            data_source: a.source,
        }
    }
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct ResultQuery {
    #[arg(long)]
    pub scenario: Option<String>,
    #[arg(long)]
    pub year: Option<i32>,
    /// Only projected rows
    #[arg(long, conflicts_with = "historical")]
    pub projection: bool,
    /// Only historical rows
    #[arg(long)]
    pub historical: bool,
}

impl ResultQuery {
    /// `Some(true)` for `--projection`, `Some(false)` for `--historical`.
    pub fn projection_filter(&self) -> Option<bool> {
        match (self.projection, self.historical) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}
