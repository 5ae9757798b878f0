//! CLI configuration: optional YAML file, environment override for the URL.
//!
//! Sections: `database_url`, `cascade`, `pipeline`, `mitigation`.

use anyhow::{Context, Result};
use cascade_engine::CascadeConfig;
use cascade_mitigation::MitigationThresholds;
use cascade_runtime::PipelineConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DATABASE_URL_ENV: &str = "CASCADE_DATABASE_URL";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub cascade: CascadeConfig,
    pub pipeline: PipelineConfig,
    pub mitigation: MitigationThresholds,
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("malformed configuration")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_yaml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolve the database URL: `--db`, then the environment, then the
    /// config file, then the built-in default.
    pub fn resolve_url(&self, cli: Option<&str>, env: Option<String>) -> String {
        cli.map(str::to_string)
            .or(env)
            .or_else(|| self.database_url.clone())
            .unwrap_or_else(|| persistence::default_sqlite_url().to_string())
    }
}
