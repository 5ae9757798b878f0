#![deny(warnings)]

//! Headless CLI for seeding climate data, running the cascade and scoring it.

mod args;
mod config;

use anyhow::{bail, Context, Result};
use args::{Cli, Command, ResultQuery};
use cascade_core::{ClimateObservation, Scenario, SimulationResult};
use cascade_engine::CascadeEngine;
use cascade_mitigation::Mitigation;
use cascade_runtime::Pipeline;
use clap::Parser;
use config::{AppConfig, DATABASE_URL_ENV};
use persistence::ResultFilter;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_version() {
    println!(
        "cascade {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHA"),
        env!("BUILD_DATE")
    );
}

fn scenario_or_default(label: Option<&str>, cfg: &AppConfig) -> Scenario {
    label
        .map(Scenario::from)
        .unwrap_or_else(|| cfg.pipeline.default_scenario.clone())
}

#[derive(Serialize)]
struct YearAdvice {
    year: i32,
    scenario: Scenario,
    is_projection: bool,
    mitigations: Vec<Mitigation>,
}

/// Stored results matching `q`: one row with `--year`, otherwise every row.
async fn query_results(pipeline: &Pipeline, q: &ResultQuery) -> Result<Vec<SimulationResult>> {
    let pool = pipeline.pool();
    let scenario = q.scenario.as_deref().map(Scenario::from);
    match q.year {
        Some(year) => {
            match persistence::fetch_result(pool, year, scenario.as_ref(), q.projection_filter()).await? {
                Some(r) => Ok(vec![r]),
                None => bail!("no simulation result for {year}"),
            }
        }
        None => {
            let filter = ResultFilter {
                scenario,
                is_projection: q.projection_filter(),
                ..ResultFilter::default()
            };
            Ok(persistence::fetch_results(pool, &filter).await?)
        }
    }
}

async fn dispatch(cmd: Command, cfg: &AppConfig, pipeline: &Pipeline) -> Result<()> {
    let pool = pipeline.pool();
    match cmd {
        Command::Seed => print_json(&pipeline.seed_baseline().await?),
        Command::AddClimate(a) => {
            let obs = ClimateObservation::from(a);
            pipeline.add_observation(&obs).await?;
            print_json(&obs)
        }
        Command::Import { file } => {
            let rows = data_pipeline::load_observations_json(&file)?;
            let n = pipeline.import_observations(&rows).await?;
            print_json(&serde_json::json!({ "imported": n }))
        }
        Command::Climate { year } => match year {
            Some(year) => match persistence::fetch_observation(pool, year).await? {
                Some(obs) => print_json(&obs),
                None => bail!("no climate observation for {year}"),
            },
            None => print_json(&persistence::fetch_all_observations(pool).await?),
        },
        Command::Run { start, end, scenario } => {
            let start = start.unwrap_or(cfg.pipeline.historical_start);
            let end = end.unwrap_or(cfg.pipeline.historical_end);
            let run = pipeline
                .run_historical(&scenario_or_default(scenario.as_deref(), cfg), start, end)
                .await?;
            print_json(&run.results)
        }
        Command::Project { scenario } => {
            let run = pipeline
                .run_projection(&scenario_or_default(scenario.as_deref(), cfg))
                .await?;
            print_json(&run.results)
        }
        Command::Validate { scenario } => {
            let scenario = scenario.as_deref().map(Scenario::from);
            print_json(&pipeline.validate(scenario.as_ref()).await?)
        }
        Command::RunAll { scenario } => {
            print_json(&pipeline.run_all(&scenario_or_default(scenario.as_deref(), cfg)).await?)
        }
        Command::Results(q) => {
            let rows = query_results(pipeline, &q).await?;
            match (q.year, rows.as_slice()) {
                (Some(_), [row]) => print_json(row),
                _ => print_json(&rows),
            }
        }
        Command::Mitigations(q) => {
            let advice: Vec<YearAdvice> = query_results(pipeline, &q)
                .await?
                .into_iter()
                .map(|r| YearAdvice {
                    mitigations: cascade_mitigation::mitigations_with(&r, &cfg.mitigation),
                    year: r.year,
                    is_projection: r.is_projection,
                    scenario: r.scenario,
                })
                .collect();
            print_json(&advice)
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    // Version needs no store
    if let Command::Version = cli.command {
        print_version();
        return Ok(());
    }

    let cfg = AppConfig::load(cli.config.as_deref())?;
    let url = cfg.resolve_url(cli.db.as_deref(), std::env::var(DATABASE_URL_ENV).ok());
    info!(command = ?cli.command, url = %url, "starting CLI");

    let engine = CascadeEngine::new(cfg.cascade.clone()).context("invalid cascade configuration")?;
    let pool = persistence::init_db(&url).await?;
    let pipeline = Pipeline::new(pool)
        .with_engine(engine)
        .with_config(cfg.pipeline.clone())?;

    dispatch(cli.command, &cfg, &pipeline).await
}
