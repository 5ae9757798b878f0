#![deny(warnings)]

//! Cascade engine: climate observation to chained ecological risk indices.
//!
//! The chain runs in a fixed order, each stage a weighted linear composite
//! of normalized sub-factors clamped to [0,100]:
//! - flood risk from temperature, rainfall and glacier melt
//! - glacier amplification from glacier melt alone
//! - prey stress from vegetation loss, flood risk and salinity
//! - prey migration as a ramp above the prey-stress threshold
//! - tiger migration as a baseline plus a share of prey migration
//! - zoonotic exposure from human density, wildlife displacement and flood risk
//!
//! Every constant lives in [`CascadeConfig`] so scenario-specific tuning can
//! be injected without touching the formulas.

use cascade_core::{clamp, normalize, round2, ClimateObservation, Scenario, SimulationResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Prey stress (as a unit fraction) at or below which no migration occurs.
pub const PREY_STRESS_THRESHOLD: f64 = 0.5;
/// Baseline tiger migration propensity in percent.
pub const BASE_TIGER_MIGRATION: f64 = 10.0;
/// Fixed human density factor shared by every scenario.
pub const HUMAN_DENSITY_FACTOR: f64 = 0.65;

/// Errors produced when validating a cascade configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Configured value must be finite.
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    /// Weight or unit-interval value must lie within [0,1].
    #[error("{0} must be within [0,1], got {1}")]
    OutOfUnitRange(&'static str, f64),
    /// Threshold must lie within [0,1) so the ramp above it is well defined.
    #[error("prey stress threshold must be within [0,1), got {0}")]
    InvalidThreshold(f64),
}

/// Min-max range used to normalize a raw climate variable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormRange {
    pub min: f64,
    pub max: f64,
}

impl NormRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn apply(&self, x: f64) -> f64 {
        normalize(x, self.min, self.max)
    }
}

/// Flood-risk weights and normalization ranges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    pub temperature_weight: f64,
    pub rainfall_weight: f64,
    pub glacier_weight: f64,
    /// Temperature range in °C.
    pub temperature_range: NormRange,
    /// Rainfall range in mm.
    pub rainfall_range: NormRange,
    /// Glacier contribution range in cm; also drives glacier amplification.
    pub glacier_range: NormRange,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            temperature_weight: 0.4,
            rainfall_weight: 0.4,
            glacier_weight: 0.2,
            temperature_range: NormRange::new(20.0, 40.0),
            rainfall_range: NormRange::new(1000.0, 4000.0),
            glacier_range: NormRange::new(0.0, 10.0),
        }
    }
}

/// Prey-stress weights and the migration threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreyConfig {
    pub vegetation_loss_weight: f64,
    pub flood_weight: f64,
    pub salinity_weight: f64,
    pub migration_threshold: f64,
}

impl Default for PreyConfig {
    fn default() -> Self {
        Self {
            vegetation_loss_weight: 0.4,
            flood_weight: 0.4,
            salinity_weight: 0.2,
            migration_threshold: PREY_STRESS_THRESHOLD,
        }
    }
}

/// Tiger migration as `baseline + pass_through * prey_migration`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TigerConfig {
    pub baseline: f64,
    pub pass_through: f64,
}

impl Default for TigerConfig {
    fn default() -> Self {
        Self {
            baseline: BASE_TIGER_MIGRATION,
            pass_through: 0.6,
        }
    }
}

/// Zoonotic-exposure weights and the human density constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoonoticConfig {
    pub human_density_weight: f64,
    pub displacement_weight: f64,
    pub flood_weight: f64,
    pub human_density_factor: f64,
}

impl Default for ZoonoticConfig {
    fn default() -> Self {
        Self {
            human_density_weight: 0.4,
            displacement_weight: 0.4,
            flood_weight: 0.2,
            human_density_factor: HUMAN_DENSITY_FACTOR,
        }
    }
}

/// Values substituted for optional observation fields that are absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFallbacks {
    pub glacier_contribution_cm: f64,
    pub vegetation_proxy: f64,
    pub salinity_proxy: f64,
}

impl Default for FieldFallbacks {
    fn default() -> Self {
        Self {
            glacier_contribution_cm: 0.0,
            vegetation_proxy: 0.5,
            salinity_proxy: 0.3,
        }
    }
}

/// Full set of constants consumed by the cascade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub flood: FloodConfig,
    pub prey: PreyConfig,
    pub tiger: TigerConfig,
    pub zoonotic: ZoonoticConfig,
    pub fallbacks: FieldFallbacks,
}

fn unit(name: &'static str, v: f64) -> Result<(), ConfigError> {
    if !v.is_finite() {
        return Err(ConfigError::NonFinite(name));
    }
    if !(0.0..=1.0).contains(&v) {
        return Err(ConfigError::OutOfUnitRange(name, v));
    }
    Ok(())
}

fn finite(name: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite(name))
    }
}

impl CascadeConfig {
    /// Check every configured constant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.flood;
        unit("flood.temperature_weight", f.temperature_weight)?;
        unit("flood.rainfall_weight", f.rainfall_weight)?;
        unit("flood.glacier_weight", f.glacier_weight)?;
        for (name, r) in [
            ("flood.temperature_range", f.temperature_range),
            ("flood.rainfall_range", f.rainfall_range),
            ("flood.glacier_range", f.glacier_range),
        ] {
            finite(name, r.min)?;
            finite(name, r.max)?;
        }
        let p = &self.prey;
        unit("prey.vegetation_loss_weight", p.vegetation_loss_weight)?;
        unit("prey.flood_weight", p.flood_weight)?;
        unit("prey.salinity_weight", p.salinity_weight)?;
        if !(p.migration_threshold.is_finite() && (0.0..1.0).contains(&p.migration_threshold)) {
            return Err(ConfigError::InvalidThreshold(p.migration_threshold));
        }
        finite("tiger.baseline", self.tiger.baseline)?;
        unit("tiger.pass_through", self.tiger.pass_through)?;
        let z = &self.zoonotic;
        unit("zoonotic.human_density_weight", z.human_density_weight)?;
        unit("zoonotic.displacement_weight", z.displacement_weight)?;
        unit("zoonotic.flood_weight", z.flood_weight)?;
        unit("zoonotic.human_density_factor", z.human_density_factor)?;
        finite(
            "fallbacks.glacier_contribution_cm",
            self.fallbacks.glacier_contribution_cm,
        )?;
        unit("fallbacks.vegetation_proxy", self.fallbacks.vegetation_proxy)?;
        unit("fallbacks.salinity_proxy", self.fallbacks.salinity_proxy)?;
        Ok(())
    }
}

/// Flood risk in percent.
pub fn flood_risk(cfg: &FloodConfig, temperature: f64, rainfall: f64, glacier: f64) -> f64 {
    let raw = cfg.temperature_weight * cfg.temperature_range.apply(temperature)
        + cfg.rainfall_weight * cfg.rainfall_range.apply(rainfall)
        + cfg.glacier_weight * cfg.glacier_range.apply(glacier);
    clamp(raw * 100.0)
}

/// Glacier amplification in percent.
pub fn glacier_amplification(range: &NormRange, glacier: f64) -> f64 {
    clamp(range.apply(glacier) * 100.0)
}

/// Prey stress in percent. Vegetation and salinity are already unit proxies.
pub fn prey_stress(cfg: &PreyConfig, vegetation: f64, flood_risk: f64, salinity: f64) -> f64 {
    let raw = cfg.vegetation_loss_weight * (1.0 - vegetation)
        + cfg.flood_weight * (flood_risk / 100.0)
        + cfg.salinity_weight * salinity;
    clamp(raw * 100.0)
}

/// Prey migration probability in percent: zero at or below the threshold,
/// then a linear ramp reaching 100 at full stress.
pub fn prey_migration(threshold: f64, prey_stress: f64) -> f64 {
    let s = prey_stress / 100.0;
    if s <= threshold {
        return 0.0;
    }
    clamp((s - threshold) / (1.0 - threshold) * 100.0)
}

/// Tiger migration probability in percent.
pub fn tiger_migration(cfg: &TigerConfig, prey_migration: f64) -> f64 {
    clamp(cfg.baseline + cfg.pass_through * prey_migration)
}

/// Zoonotic risk index in percent.
pub fn zoonotic_risk(cfg: &ZoonoticConfig, wildlife_displacement: f64, flood_risk: f64) -> f64 {
    let raw = cfg.human_density_weight * cfg.human_density_factor
        + cfg.displacement_weight * wildlife_displacement
        + cfg.flood_weight * (flood_risk / 100.0);
    clamp(raw * 100.0)
}

/// Optional observation fields after fallback substitution.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ResolvedInputs {
    temperature: f64,
    rainfall: f64,
    glacier: f64,
    vegetation: f64,
    salinity: f64,
}

impl ResolvedInputs {
    fn resolve(obs: &ClimateObservation, fb: &FieldFallbacks) -> Self {
        Self {
            temperature: obs.temperature_celsius,
            rainfall: obs.rainfall_mm,
            glacier: obs.glacier_contribution_cm.unwrap_or(fb.glacier_contribution_cm),
            vegetation: obs.vegetation_proxy.unwrap_or(fb.vegetation_proxy),
            salinity: obs.salinity_proxy.unwrap_or(fb.salinity_proxy),
        }
    }
}

/// Cascade engine bound to one configuration.
#[derive(Clone, Debug, Default)]
pub struct CascadeEngine {
    config: CascadeConfig,
}

impl CascadeEngine {
    /// Build an engine after validating the configuration.
    pub fn new(config: CascadeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Run the full cascade for one observation.
    ///
    /// `scenario` and `is_projection` are carried into the result untouched.
    pub fn compute(
        &self,
        obs: &ClimateObservation,
        scenario: &Scenario,
        is_projection: bool,
    ) -> SimulationResult {
        let c = &self.config;
        let input = ResolvedInputs::resolve(obs, &c.fallbacks);

        let flood = flood_risk(&c.flood, input.temperature, input.rainfall, input.glacier);
        let glacier_amp = glacier_amplification(&c.flood.glacier_range, input.glacier);
        let stress = prey_stress(&c.prey, input.vegetation, flood, input.salinity);
        let prey_mig = prey_migration(c.prey.migration_threshold, stress);
        let tiger_mig = tiger_migration(&c.tiger, prey_mig);
        let displacement = prey_mig / 100.0;
        let zoonotic = zoonotic_risk(&c.zoonotic, displacement, flood);

        debug!(
            year = obs.year,
            %scenario,
            is_projection,
            flood,
            stress,
            prey_mig,
            zoonotic,
            "cascade computed"
        );

        SimulationResult {
            year: obs.year,
            flood_risk: round2(flood),
            glacier_amplification: round2(glacier_amp),
            prey_stress_index: round2(stress),
            prey_migration_probability: round2(prey_mig),
            tiger_migration_probability: round2(tiger_mig),
            zoonotic_risk_index: round2(zoonotic),
            human_density_factor: round2(c.zoonotic.human_density_factor),
            wildlife_displacement_score: round2(displacement),
            is_projection,
            scenario: scenario.clone(),
        }
    }

    /// Run the cascade over a batch, preserving input order.
    pub fn compute_all(
        &self,
        observations: &[ClimateObservation],
        scenario: &Scenario,
        is_projection: bool,
    ) -> Vec<SimulationResult> {
        observations
            .iter()
            .map(|o| self.compute(o, scenario, is_projection))
            .collect()
    }
}

/// Run the cascade with the default constants.
pub fn compute_cascade(
    obs: &ClimateObservation,
    scenario: &Scenario,
    is_projection: bool,
) -> SimulationResult {
    CascadeEngine::default().compute(obs, scenario, is_projection)
}
