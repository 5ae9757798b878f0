#![deny(warnings)]

//! Batch orchestration of the cascade against the store.
//!
//! Each operation is one request-scoped unit of work: fetch observations,
//! run the engine in ascending year order, then replace the matching result
//! window in a single transaction. Concurrent callers replacing the same
//! window are not coordinated here beyond what the store's transaction gives.

use cascade_core::{validate_observation, ClimateObservation, ResultWindow, Scenario, SimulationResult, ValidationError};
use cascade_engine::{CascadeEngine, ConfigError};
use cascade_validation::{BenchmarkTable, ValidationReport, ValidationSummary};
use persistence::{ReplaceOutcome, ResultFilter, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Year windows and default scenario used by the batch operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub historical_start: i32,
    pub historical_end: i32,
    pub projection_start: i32,
    pub projection_end: i32,
    pub default_scenario: Scenario,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            historical_start: 2014,
            historical_end: 2023,
            projection_start: 2024,
            projection_end: 2033,
            default_scenario: Scenario::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.historical_start > self.historical_end {
            return Err(PipelineError::Config(format!(
                "historical window {}..={} is empty",
                self.historical_start, self.historical_end
            )));
        }
        if self.projection_start > self.projection_end {
            return Err(PipelineError::Config(format!(
                "projection window {}..={} is empty",
                self.projection_start, self.projection_end
            )));
        }
        if self.projection_start <= self.historical_end {
            return Err(PipelineError::Config(format!(
                "projection start {} overlaps the historical window ending {}",
                self.projection_start, self.historical_end
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Nothing to compute or score for the requested slice.
    #[error("{what}. {hint}")]
    NoData { what: String, hint: &'static str },
    #[error("invalid observation: {0}")]
    InvalidObservation(#[from] ValidationError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Config(e.to_string())
    }
}

/// Outcome of one replace-window batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchRun {
    pub window: ResultWindow,
    pub outcome: ReplaceOutcome,
    pub results: Vec<SimulationResult>,
}

/// Validation either scores existing rows or explains why it could not.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationOutcome {
    Report(ValidationReport),
    Missing { error: String },
}

impl ValidationOutcome {
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ValidationOutcome::Report(r) => Some(r),
            ValidationOutcome::Missing { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunAllSummary {
    pub message: String,
    pub historical_years: usize,
    pub projection_years: usize,
    pub validation_summary: Option<ValidationSummary>,
    pub total_records: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub historical_inserted: usize,
    pub projection_inserted: usize,
}

/// Orchestrates cascade runs and validation over one store.
pub struct Pipeline {
    pool: SqlitePool,
    engine: CascadeEngine,
    benchmarks: BenchmarkTable,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            engine: CascadeEngine::default(),
            benchmarks: BenchmarkTable::default(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_engine(mut self, engine: CascadeEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_benchmarks(mut self, benchmarks: BenchmarkTable) -> Self {
        self.benchmarks = benchmarks;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn replace(
        &self,
        window: ResultWindow,
        observations: &[ClimateObservation],
    ) -> Result<BatchRun, PipelineError> {
        let results =
            self.engine
                .compute_all(observations, &window.scenario, window.is_projection);
        let outcome = persistence::replace_window(&self.pool, &window, &results).await?;
        Ok(BatchRun {
            window,
            outcome,
            results,
        })
    }

    /// Recompute historical results for `scenario` over `[start, end]`.
    ///
    /// Fails with `NoData` and writes nothing when the window holds no
    /// observations.
    pub async fn run_historical(
        &self,
        scenario: &Scenario,
        start: i32,
        end: i32,
    ) -> Result<BatchRun, PipelineError> {
        let observations = persistence::fetch_observations(&self.pool, start, Some(end)).await?;
        if observations.is_empty() {
            warn!(%scenario, start, end, "historical run skipped, no climate data");
            return Err(PipelineError::NoData {
                what: format!("no climate data found for {start}..={end}"),
                hint: "Seed or import climate observations first.",
            });
        }
        info!(%scenario, start, end, years = observations.len(), "historical run");
        self.replace(
            ResultWindow::historical(scenario.clone(), start, end),
            &observations,
        )
        .await
    }

    /// Historical run over the configured window.
    pub async fn run_default_historical(&self, scenario: &Scenario) -> Result<BatchRun, PipelineError> {
        self.run_historical(scenario, self.config.historical_start, self.config.historical_end)
            .await
    }

    /// Recompute projections for `scenario`.
    ///
    /// Reads observations in the configured projection window and replaces
    /// every projection row from the projection start onwards.
    pub async fn run_projection(&self, scenario: &Scenario) -> Result<BatchRun, PipelineError> {
        let start = self.config.projection_start;
        let end = self.config.projection_end;
        let observations = persistence::fetch_observations(&self.pool, start, Some(end)).await?;
        if observations.is_empty() {
            warn!(%scenario, start, end, "projection run skipped, no climate data");
            return Err(PipelineError::NoData {
                what: format!("no projected climate data found for {start}..={end}"),
                hint: "Seed or import projected climate observations first.",
            });
        }
        info!(%scenario, start, end, years = observations.len(), "projection run");
        self.replace(ResultWindow::projection(scenario.clone(), start), &observations)
            .await
    }

    /// Score stored historical results against the benchmark table.
    ///
    /// `None` scores every scenario together.
    pub async fn validate(&self, scenario: Option<&Scenario>) -> Result<ValidationOutcome, PipelineError> {
        let filter = ResultFilter::historical(self.config.historical_start, self.config.historical_end)
            .with_scenario(scenario.cloned());
        let results = persistence::fetch_results(&self.pool, &filter).await?;
        match cascade_validation::score(&results, &self.benchmarks) {
            Some(report) => {
                info!(
                    years = report.per_year.len(),
                    flood_mae = report.summary.flood_risk_mae,
                    zoonotic_mae = report.summary.zoonotic_risk_mae,
                    "validation scored"
                );
                Ok(ValidationOutcome::Report(report))
            }
            None => {
                warn!(scenario = ?scenario.map(Scenario::as_str), "validation found no historical results");
                Ok(ValidationOutcome::Missing {
                    error: "No historical simulation results found. Run the simulation first."
                        .to_string(),
                })
            }
        }
    }

    /// Historical run, projection run, validation and a total row count.
    ///
    /// A projection window without climate data counts as zero projected
    /// years; validation and the count still run.
    pub async fn run_all(&self, scenario: &Scenario) -> Result<RunAllSummary, PipelineError> {
        let historical = self.run_default_historical(scenario).await?;
        let projection_years = match self.run_projection(scenario).await {
            Ok(run) => run.results.len(),
            Err(PipelineError::NoData { what, .. }) => {
                warn!(%scenario, %what, "run-all continuing without projections");
                0
            }
            Err(e) => return Err(e),
        };
        let validation = self.validate(Some(scenario)).await?;
        let total_records = persistence::count_results(&self.pool).await?;
        info!(%scenario, total_records, "full simulation complete");
        Ok(RunAllSummary {
            message: "Full simulation complete".to_string(),
            historical_years: historical.results.len(),
            projection_years,
            validation_summary: validation.report().map(|r| r.summary.clone()),
            total_records,
        })
    }

    /// Load the synthetic baseline series into empty windows.
    ///
    /// Each series is only written when its window holds no observations.
    pub async fn seed_baseline(&self) -> Result<SeedSummary, PipelineError> {
        let mut summary = SeedSummary::default();
        let c = &self.config;
        if persistence::count_observations(&self.pool, c.historical_start, Some(c.historical_end)).await? == 0 {
            summary.historical_inserted =
                persistence::upsert_observations(&self.pool, &data_pipeline::historical_baseline()).await?;
        }
        if persistence::count_observations(&self.pool, c.projection_start, None).await? == 0 {
            summary.projection_inserted =
                persistence::upsert_observations(&self.pool, &data_pipeline::projection_baseline()).await?;
        }
        info!(
            historical = summary.historical_inserted,
            projection = summary.projection_inserted,
            "baseline seeded"
        );
        Ok(summary)
    }

    /// Validate and store one observation.
    pub async fn add_observation(&self, obs: &ClimateObservation) -> Result<(), PipelineError> {
        validate_observation(obs)?;
        persistence::upsert_observation(&self.pool, obs).await?;
        Ok(())
    }

    /// Validate and store a batch of observations atomically.
    pub async fn import_observations(&self, rows: &[ClimateObservation]) -> Result<usize, PipelineError> {
        for o in rows {
            validate_observation(o)?;
        }
        Ok(persistence::upsert_observations(&self.pool, rows).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pipeline() -> Pipeline {
        let pool = persistence::init_db("sqlite::memory:").await.unwrap();
        Pipeline::new(pool)
    }

    async fn seeded() -> Pipeline {
        let p = pipeline().await;
        p.seed_baseline().await.unwrap();
        p
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let p = pipeline().await;
        let first = p.seed_baseline().await.unwrap();
        assert_eq!(
            first,
            SeedSummary {
                historical_inserted: 10,
                projection_inserted: 10
            }
        );
        let second = p.seed_baseline().await.unwrap();
        assert_eq!(second, SeedSummary::default());
    }

    #[tokio::test]
    async fn historical_run_is_ascending_and_matches_fixture() {
        let p = seeded().await;
        let run = p.run_default_historical(&Scenario::default()).await.unwrap();
        let years: Vec<i32> = run.results.iter().map(|r| r.year).collect();
        assert_eq!(years, (2014..=2023).collect::<Vec<_>>());
        assert_eq!(run.results[0].flood_risk, 29.53);
        assert_eq!(run.results[9].flood_risk, 59.33);
        assert_eq!(run.results[9].zoonotic_risk_index, 41.65);
        assert!(run.results.iter().all(|r| !r.is_projection));
        assert_eq!(run.outcome.inserted, 10);
    }

    #[tokio::test]
    async fn rerun_replaces_without_duplicates() {
        let p = seeded().await;
        let s = Scenario::default();
        let first = p.run_historical(&s, 2014, 2023).await.unwrap();
        let second = p.run_historical(&s, 2014, 2023).await.unwrap();
        assert_eq!(second.outcome.deleted, 10);
        assert_eq!(first.results, second.results);
        let stored = persistence::fetch_results(p.pool(), &ResultFilter::historical(2014, 2023))
            .await
            .unwrap();
        assert_eq!(stored, second.results);
        assert_eq!(persistence::count_results(p.pool()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn empty_window_reports_no_data_and_writes_nothing() {
        let p = seeded().await;
        let err = p
            .run_historical(&Scenario::default(), 1990, 1999)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoData { .. }));
        assert_eq!(persistence::count_results(p.pool()).await.unwrap(), 0);

        let bare = pipeline().await;
        assert!(matches!(
            bare.run_projection(&Scenario::default()).await,
            Err(PipelineError::NoData { .. })
        ));
    }

    #[tokio::test]
    async fn scenarios_are_independent_and_numerically_identical() {
        let p = seeded().await;
        let base = p.run_default_historical(&Scenario::default()).await.unwrap();
        let alt = p
            .run_default_historical(&Scenario::from("high-emissions"))
            .await
            .unwrap();
        assert_eq!(alt.outcome.deleted, 0);
        for (a, b) in base.results.iter().zip(&alt.results) {
            assert_eq!(a.flood_risk, b.flood_risk);
            assert_eq!(a.zoonotic_risk_index, b.zoonotic_risk_index);
            assert_eq!(b.scenario.as_str(), "high-emissions");
        }
        assert_eq!(persistence::count_results(p.pool()).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn projection_run_flags_rows() {
        let p = seeded().await;
        let run = p.run_projection(&Scenario::default()).await.unwrap();
        assert_eq!(run.results.len(), 10);
        assert!(run.results.iter().all(|r| r.is_projection));
        assert_eq!(run.results[0].year, 2024);
        assert_eq!(run.results[0].flood_risk, 62.67);
        assert_eq!(run.results[9].tiger_migration_probability, 42.82);
        assert_eq!(run.window.end_year, None);
    }

    #[tokio::test]
    async fn validation_before_run_is_reported_not_raised() {
        let p = seeded().await;
        let outcome = p.validate(None).await.unwrap();
        assert!(matches!(outcome, ValidationOutcome::Missing { .. }));
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Run the simulation"));
    }

    #[tokio::test]
    async fn run_all_chains_every_step() {
        let p = seeded().await;
        let summary = p.run_all(&Scenario::default()).await.unwrap();
        assert_eq!(summary.historical_years, 10);
        assert_eq!(summary.projection_years, 10);
        assert_eq!(summary.total_records, 20);
        let v = summary.validation_summary.unwrap();
        assert_eq!(v.flood_risk_mae, 13.17);
        assert_eq!(v.flood_risk_mean_error_pct, 20.87);
        assert_eq!(v.zoonotic_risk_mae, 11.24);
        assert_eq!(v.zoonotic_risk_mean_error_pct, 25.02);
        assert!(v.missing_benchmark_years.is_empty());

        let again = p.run_all(&Scenario::default()).await.unwrap();
        assert_eq!(again.total_records, 20);
    }

    #[tokio::test]
    async fn run_all_without_projection_data_still_validates() {
        let p = pipeline().await;
        p.import_observations(&data_pipeline::historical_baseline())
            .await
            .unwrap();
        let summary = p.run_all(&Scenario::default()).await.unwrap();
        assert_eq!(summary.historical_years, 10);
        assert_eq!(summary.projection_years, 0);
        assert_eq!(summary.total_records, 10);
        let v = summary.validation_summary.unwrap();
        assert_eq!(v.flood_risk_mae, 13.17);
        assert_eq!(v.zoonotic_risk_mae, 11.24);
    }

    #[tokio::test]
    async fn intake_rejects_invalid_observation() {
        let p = pipeline().await;
        let obs = ClimateObservation {
            year: 2020,
            temperature_celsius: 29.7,
            rainfall_mm: 9000.0,
            glacier_contribution_cm: None,
            sea_level_rise_mm: None,
            salinity_proxy: None,
            vegetation_proxy: None,
            is_synthetic: false,
            data_source: None,
        };
        assert!(matches!(
            p.add_observation(&obs).await,
            Err(PipelineError::InvalidObservation(ValidationError::RainfallOutOfRange(_)))
        ));
        assert_eq!(
            persistence::count_observations(p.pool(), i32::MIN, None).await.unwrap(),
            0
        );
    }

    #[test]
    fn config_rejects_overlapping_windows() {
        let cfg = PipelineConfig {
            projection_start: 2020,
            ..PipelineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));
        let parsed: PipelineConfig = serde_yaml::from_str("projection_end: 2050\n").unwrap();
        assert_eq!(parsed.projection_end, 2050);
        assert_eq!(parsed.historical_start, 2014);
        parsed.validate().unwrap();
    }
}
