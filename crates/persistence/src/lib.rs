#![deny(warnings)]

//! Persistence layer: SQLite store for climate observations and cascade results.

use cascade_core::{ClimateObservation, ResultWindow, Scenario, SimulationResult};
use serde::{Deserialize, Serialize};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

static MIGRATOR: Migrator = sqlx::migrate!();

/// Returns the default SQLite URL used for the local store.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./data/cascade.db"
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Create the parent directory of a file-backed SQLite URL.
pub fn ensure_parent_dir(url: &str) -> std::io::Result<()> {
    if is_memory_url(url) {
        return Ok(());
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .map(|p| p.split('?').next().unwrap_or(p));
    if let Some(path) = path {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

/// Open (creating if needed) the database at `url` and run migrations.
///
/// In-memory URLs get a single long-lived connection so every query sees
/// the same database.
pub async fn init_db(url: &str) -> anyhow::Result<SqlitePool> {
    ensure_parent_dir(url)?;
    let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = if is_memory_url(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?
    };
    MIGRATOR.run(&pool).await?;
    info!(url, "database ready");
    Ok(pool)
}

/// Errors produced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    /// A row handed to `replace_window` does not belong to the window.
    #[error("result for year {year} (scenario {scenario}, projection {is_projection}) is outside the replace window")]
    OutsideWindow {
        year: i32,
        scenario: String,
        is_projection: bool,
    },
}

#[derive(Debug, sqlx::FromRow)]
struct ObservationRow {
    year: i32,
    temperature_celsius: f64,
    rainfall_mm: f64,
    glacier_contribution_cm: Option<f64>,
    sea_level_rise_mm: Option<f64>,
    salinity_proxy: Option<f64>,
    vegetation_proxy: Option<f64>,
    is_synthetic: bool,
    data_source: Option<String>,
}

impl From<ObservationRow> for ClimateObservation {
    fn from(r: ObservationRow) -> Self {
        ClimateObservation {
            year: r.year,
            temperature_celsius: r.temperature_celsius,
            rainfall_mm: r.rainfall_mm,
            glacier_contribution_cm: r.glacier_contribution_cm,
            sea_level_rise_mm: r.sea_level_rise_mm,
            salinity_proxy: r.salinity_proxy,
            vegetation_proxy: r.vegetation_proxy,
            is_synthetic: r.is_synthetic,
            data_source: r.data_source,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResultRow {
    year: i32,
    flood_risk: f64,
    glacier_amplification: f64,
    prey_stress_index: f64,
    prey_migration_probability: f64,
    tiger_migration_probability: f64,
    zoonotic_risk_index: f64,
    human_density_factor: f64,
    wildlife_displacement_score: f64,
    is_projection: bool,
    scenario: String,
}

impl From<ResultRow> for SimulationResult {
    fn from(r: ResultRow) -> Self {
        SimulationResult {
            year: r.year,
            flood_risk: r.flood_risk,
            glacier_amplification: r.glacier_amplification,
            prey_stress_index: r.prey_stress_index,
            prey_migration_probability: r.prey_migration_probability,
            tiger_migration_probability: r.tiger_migration_probability,
            zoonotic_risk_index: r.zoonotic_risk_index,
            human_density_factor: r.human_density_factor,
            wildlife_displacement_score: r.wildlife_displacement_score,
            is_projection: r.is_projection,
            scenario: Scenario(r.scenario),
        }
    }
}

const OBSERVATION_COLUMNS: &str = "year, temperature_celsius, rainfall_mm, glacier_contribution_cm, \
     sea_level_rise_mm, salinity_proxy, vegetation_proxy, is_synthetic, data_source";

const RESULT_COLUMNS: &str = "year, flood_risk, glacier_amplification, prey_stress_index, \
     prey_migration_probability, tiger_migration_probability, zoonotic_risk_index, \
     human_density_factor, wildlife_displacement_score, is_projection, scenario";

const UPSERT_OBSERVATION: &str = "INSERT INTO climate_observations
        (year, temperature_celsius, rainfall_mm, glacier_contribution_cm,
         sea_level_rise_mm, salinity_proxy, vegetation_proxy, is_synthetic, data_source)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
     ON CONFLICT(year) DO UPDATE SET
        temperature_celsius = excluded.temperature_celsius,
        rainfall_mm = excluded.rainfall_mm,
        glacier_contribution_cm = excluded.glacier_contribution_cm,
        sea_level_rise_mm = excluded.sea_level_rise_mm,
        salinity_proxy = excluded.salinity_proxy,
        vegetation_proxy = excluded.vegetation_proxy,
        is_synthetic = excluded.is_synthetic,
        data_source = excluded.data_source";

async fn upsert_one<'e, E>(executor: E, o: &ClimateObservation) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(UPSERT_OBSERVATION)
        .bind(o.year)
        .bind(o.temperature_celsius)
        .bind(o.rainfall_mm)
        .bind(o.glacier_contribution_cm)
        .bind(o.sea_level_rise_mm)
        .bind(o.salinity_proxy)
        .bind(o.vegetation_proxy)
        .bind(o.is_synthetic)
        .bind(o.data_source.as_deref())
        .execute(executor)
        .await?;
    Ok(())
}

/// Insert an observation, replacing any existing row for the same year.
pub async fn upsert_observation(pool: &SqlitePool, o: &ClimateObservation) -> Result<(), StoreError> {
    upsert_one(pool, o).await?;
    debug!(year = o.year, "observation stored");
    Ok(())
}

/// Upsert a batch of observations in one transaction. Returns the row count.
pub async fn upsert_observations(
    pool: &SqlitePool,
    rows: &[ClimateObservation],
) -> Result<usize, StoreError> {
    let mut tx = pool.begin().await?;
    for o in rows {
        upsert_one(&mut *tx, o).await?;
    }
    tx.commit().await?;
    info!(rows = rows.len(), "observations stored");
    Ok(rows.len())
}

/// Observations with `year >= start` (and `<= end` when given), ascending.
pub async fn fetch_observations(
    pool: &SqlitePool,
    start: i32,
    end: Option<i32>,
) -> Result<Vec<ClimateObservation>, StoreError> {
    let sql = format!(
        "SELECT {OBSERVATION_COLUMNS} FROM climate_observations
         WHERE year >= ?1 AND (?2 IS NULL OR year <= ?2)
         ORDER BY year ASC"
    );
    let rows: Vec<ObservationRow> = sqlx::query_as(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Every stored observation, ascending by year.
pub async fn fetch_all_observations(pool: &SqlitePool) -> Result<Vec<ClimateObservation>, StoreError> {
    fetch_observations(pool, i32::MIN, None).await
}

pub async fn fetch_observation(
    pool: &SqlitePool,
    year: i32,
) -> Result<Option<ClimateObservation>, StoreError> {
    let sql = format!("SELECT {OBSERVATION_COLUMNS} FROM climate_observations WHERE year = ?1");
    let row: Option<ObservationRow> = sqlx::query_as(&sql).bind(year).fetch_optional(pool).await?;
    Ok(row.map(Into::into))
}

pub async fn count_observations(
    pool: &SqlitePool,
    start: i32,
    end: Option<i32>,
) -> Result<i64, StoreError> {
    let n: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM climate_observations WHERE year >= ?1 AND (?2 IS NULL OR year <= ?2)",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;
    Ok(n)
}

/// Row counts from a replace-window operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: u64,
}

/// Delete every stored result in `window` and insert `rows`, atomically.
///
/// Every row must belong to the window; otherwise nothing is written.
pub async fn replace_window(
    pool: &SqlitePool,
    window: &ResultWindow,
    rows: &[SimulationResult],
) -> Result<ReplaceOutcome, StoreError> {
    if let Some(r) = rows.iter().find(|r| !window.contains(r)) {
        return Err(StoreError::OutsideWindow {
            year: r.year,
            scenario: r.scenario.0.clone(),
            is_projection: r.is_projection,
        });
    }

    let created_at = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;
    let deleted = sqlx::query(
        "DELETE FROM simulation_results
         WHERE year >= ?1 AND (?2 IS NULL OR year <= ?2)
           AND scenario = ?3 AND is_projection = ?4",
    )
    .bind(window.start_year)
    .bind(window.end_year)
    .bind(window.scenario.as_str())
    .bind(window.is_projection)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let mut inserted = 0u64;
    for r in rows {
        inserted += sqlx::query(
            "INSERT INTO simulation_results
                (year, flood_risk, glacier_amplification, prey_stress_index,
                 prey_migration_probability, tiger_migration_probability, zoonotic_risk_index,
                 human_density_factor, wildlife_displacement_score, is_projection, scenario,
                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(r.year)
        .bind(r.flood_risk)
        .bind(r.glacier_amplification)
        .bind(r.prey_stress_index)
        .bind(r.prey_migration_probability)
        .bind(r.tiger_migration_probability)
        .bind(r.zoonotic_risk_index)
        .bind(r.human_density_factor)
        .bind(r.wildlife_displacement_score)
        .bind(r.is_projection)
        .bind(r.scenario.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;

    info!(
        scenario = %window.scenario,
        start = window.start_year,
        end = ?window.end_year,
        is_projection = window.is_projection,
        deleted,
        inserted,
        "result window replaced"
    );
    Ok(ReplaceOutcome { deleted, inserted })
}

/// Optional constraints on a result query. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFilter {
    pub scenario: Option<Scenario>,
    pub is_projection: Option<bool>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl ResultFilter {
    /// Historical rows in `[start, end]`, any scenario unless narrowed.
    pub fn historical(start: i32, end: i32) -> Self {
        Self {
            is_projection: Some(false),
            start_year: Some(start),
            end_year: Some(end),
            ..Self::default()
        }
    }

    pub fn with_scenario(mut self, scenario: Option<Scenario>) -> Self {
        self.scenario = scenario;
        self
    }
}

/// Results matching `filter`, ascending by year.
pub async fn fetch_results(
    pool: &SqlitePool,
    filter: &ResultFilter,
) -> Result<Vec<SimulationResult>, StoreError> {
    let sql = format!(
        "SELECT {RESULT_COLUMNS} FROM simulation_results
         WHERE (?1 IS NULL OR scenario = ?1)
           AND (?2 IS NULL OR is_projection = ?2)
           AND (?3 IS NULL OR year >= ?3)
           AND (?4 IS NULL OR year <= ?4)
         ORDER BY year ASC, scenario ASC, is_projection ASC"
    );
    let rows: Vec<ResultRow> = sqlx::query_as(&sql)
        .bind(filter.scenario.as_ref().map(|s| s.as_str()))
        .bind(filter.is_projection)
        .bind(filter.start_year)
        .bind(filter.end_year)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// First result for `year`, optionally narrowed to one scenario and to
/// projected (`Some(true)`) or historical (`Some(false)`) rows.
pub async fn fetch_result(
    pool: &SqlitePool,
    year: i32,
    scenario: Option<&Scenario>,
    is_projection: Option<bool>,
) -> Result<Option<SimulationResult>, StoreError> {
    let sql = format!(
        "SELECT {RESULT_COLUMNS} FROM simulation_results
         WHERE year = ?1 AND (?2 IS NULL OR scenario = ?2)
           AND (?3 IS NULL OR is_projection = ?3)
         ORDER BY id ASC LIMIT 1"
    );
    let row: Option<ResultRow> = sqlx::query_as(&sql)
        .bind(year)
        .bind(scenario.map(|s| s.as_str()))
        .bind(is_projection)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Into::into))
}

/// Total number of stored results across all years and scenarios.
pub async fn count_results(pool: &SqlitePool) -> Result<i64, StoreError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM simulation_results")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        init_db("sqlite::memory:").await.unwrap()
    }

    fn obs(year: i32, temperature: f64) -> ClimateObservation {
        ClimateObservation {
            year,
            temperature_celsius: temperature,
            rainfall_mm: 2000.0,
            glacier_contribution_cm: Some(3.0),
            sea_level_rise_mm: None,
            salinity_proxy: Some(0.4),
            vegetation_proxy: None,
            is_synthetic: true,
            data_source: Some("test".to_string()),
        }
    }

    fn result(year: i32, scenario: &str, is_projection: bool, flood: f64) -> SimulationResult {
        SimulationResult {
            year,
            flood_risk: flood,
            glacier_amplification: 30.0,
            prey_stress_index: 40.0,
            prey_migration_probability: 0.0,
            tiger_migration_probability: 10.0,
            zoonotic_risk_index: 35.0,
            human_density_factor: 0.65,
            wildlife_displacement_score: 0.0,
            is_projection,
            scenario: Scenario::from(scenario),
        }
    }

    #[test]
    fn url_is_sqlite() {
        assert!(default_sqlite_url().starts_with("sqlite://"));
        assert!(is_memory_url("sqlite::memory:"));
        assert!(!is_memory_url(default_sqlite_url()));
    }

    #[tokio::test]
    async fn observations_upsert_and_range_fetch() {
        let pool = memory_pool().await;
        upsert_observations(&pool, &[obs(2016, 28.0), obs(2014, 27.0), obs(2015, 27.5)])
            .await
            .unwrap();
        upsert_observation(&pool, &obs(2015, 29.0)).await.unwrap();

        let rows = fetch_observations(&pool, 2014, Some(2015)).await.unwrap();
        assert_eq!(rows.iter().map(|o| o.year).collect::<Vec<_>>(), vec![2014, 2015]);
        assert_eq!(rows[1].temperature_celsius, 29.0);
        assert_eq!(rows[0].vegetation_proxy, None);
        assert_eq!(rows[0].data_source.as_deref(), Some("test"));

        assert_eq!(count_observations(&pool, 2015, None).await.unwrap(), 2);
        assert_eq!(fetch_all_observations(&pool).await.unwrap().len(), 3);
        assert!(fetch_observation(&pool, 2030).await.unwrap().is_none());
        assert_eq!(
            fetch_observation(&pool, 2016).await.unwrap().map(|o| o.year),
            Some(2016)
        );
    }

    #[tokio::test]
    async fn replace_window_is_idempotent_and_scoped() {
        let pool = memory_pool().await;
        let window = ResultWindow::historical(Scenario::default(), 2014, 2015);
        let rows = vec![
            result(2014, "baseline", false, 20.0),
            result(2015, "baseline", false, 25.0),
        ];
        let other = ResultWindow::historical(Scenario::from("alt"), 2014, 2015);
        replace_window(&pool, &other, &[result(2014, "alt", false, 99.0)])
            .await
            .unwrap();

        let first = replace_window(&pool, &window, &rows).await.unwrap();
        assert_eq!(first, ReplaceOutcome { deleted: 0, inserted: 2 });
        let second = replace_window(&pool, &window, &rows).await.unwrap();
        assert_eq!(second, ReplaceOutcome { deleted: 2, inserted: 2 });

        let baseline = fetch_results(
            &pool,
            &ResultFilter::default().with_scenario(Some(Scenario::default())),
        )
        .await
        .unwrap();
        assert_eq!(baseline, rows);
        assert_eq!(count_results(&pool).await.unwrap(), 3);
        let alt = fetch_result(&pool, 2014, Some(&Scenario::from("alt")), None)
            .await
            .unwrap();
        assert_eq!(alt.map(|r| r.flood_risk), Some(99.0));
    }

    #[tokio::test]
    async fn fetch_result_honours_projection_filter() {
        let pool = memory_pool().await;
        let hist = ResultWindow::historical(Scenario::default(), 2024, 2024);
        replace_window(&pool, &hist, &[result(2024, "baseline", false, 40.0)])
            .await
            .unwrap();
        let proj = ResultWindow::projection(Scenario::default(), 2024);
        replace_window(&pool, &proj, &[result(2024, "baseline", true, 62.0)])
            .await
            .unwrap();

        let any = fetch_result(&pool, 2024, None, None).await.unwrap();
        assert_eq!(any.map(|r| r.is_projection), Some(false));
        let projected = fetch_result(&pool, 2024, None, Some(true)).await.unwrap().unwrap();
        assert!(projected.is_projection);
        assert_eq!(projected.flood_risk, 62.0);
        let historical = fetch_result(&pool, 2024, Some(&Scenario::default()), Some(false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(historical.flood_risk, 40.0);
        assert_eq!(fetch_result(&pool, 2025, None, Some(true)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn projection_window_is_open_ended() {
        let pool = memory_pool().await;
        let hist = ResultWindow::historical(Scenario::default(), 2023, 2023);
        replace_window(&pool, &hist, &[result(2023, "baseline", false, 50.0)])
            .await
            .unwrap();
        let proj = ResultWindow::projection(Scenario::default(), 2024);
        replace_window(
            &pool,
            &proj,
            &[result(2024, "baseline", true, 60.0), result(2040, "baseline", true, 70.0)],
        )
        .await
        .unwrap();
        let out = replace_window(&pool, &proj, &[result(2025, "baseline", true, 61.0)])
            .await
            .unwrap();
        assert_eq!(out.deleted, 2);

        let projections = fetch_results(
            &pool,
            &ResultFilter {
                is_projection: Some(true),
                ..ResultFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(projections.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2025]);
        let hist_rows = fetch_results(&pool, &ResultFilter::historical(2014, 2023))
            .await
            .unwrap();
        assert_eq!(hist_rows.len(), 1);
    }

    #[tokio::test]
    async fn rows_outside_window_write_nothing() {
        let pool = memory_pool().await;
        let window = ResultWindow::historical(Scenario::default(), 2014, 2015);
        replace_window(&pool, &window, &[result(2014, "baseline", false, 20.0)])
            .await
            .unwrap();
        let err = replace_window(
            &pool,
            &window,
            &[result(2015, "baseline", false, 21.0), result(2016, "baseline", false, 22.0)],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::OutsideWindow { year: 2016, .. }));
        assert_eq!(count_results(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_delete() {
        let pool = memory_pool().await;
        let window = ResultWindow::historical(Scenario::default(), 2014, 2015);
        replace_window(&pool, &window, &[result(2014, "baseline", false, 20.0)])
            .await
            .unwrap();
        // Duplicate year violates the unique key midway through the insert phase.
        let dup = vec![
            result(2015, "baseline", false, 21.0),
            result(2015, "baseline", false, 22.0),
        ];
        assert!(matches!(
            replace_window(&pool, &window, &dup).await,
            Err(StoreError::Sqlite(_))
        ));
        let rows = fetch_results(&pool, &ResultFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].flood_risk, 20.0);
    }
}
