#![deny(warnings)]

//! Rule-based mitigation advice for one year of cascade output.
//!
//! Each index is checked against a ladder of thresholds and the first tier
//! it reaches contributes one suggestion. The rules are deterministic and
//! read nothing but the result row.

use cascade_core::SimulationResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Moderate,
    Low,
    Info,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Moderate => "Moderate",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "Flood Management")]
    FloodManagement,
    #[serde(rename = "Tiger Conservation")]
    TigerConservation,
    #[serde(rename = "Ecosystem Balance")]
    EcosystemBalance,
    #[serde(rename = "Public Health")]
    PublicHealth,
    #[serde(rename = "Climate Upstream")]
    ClimateUpstream,
    #[serde(rename = "Projection Note")]
    ProjectionNote,
    #[serde(rename = "System Status")]
    SystemStatus,
}

/// One suggestion: what fired, how bad it is, and what to do about it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mitigation {
    pub severity: Severity,
    pub category: Category,
    pub title: &'static str,
    pub actions: &'static [&'static str],
}

/// Inclusive lower bounds for each severity of one index. `None` skips the
/// tier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tiers {
    pub critical: Option<f64>,
    pub high: Option<f64>,
    pub moderate: Option<f64>,
}

impl Tiers {
    pub fn new(critical: Option<f64>, high: Option<f64>, moderate: Option<f64>) -> Self {
        Self {
            critical,
            high,
            moderate,
        }
    }

    /// Highest tier whose bound `value` reaches.
    pub fn classify(&self, value: f64) -> Option<Severity> {
        [
            (self.critical, Severity::Critical),
            (self.high, Severity::High),
            (self.moderate, Severity::Moderate),
        ]
        .into_iter()
        .find_map(|(bound, sev)| bound.filter(|b| value >= *b).map(|_| sev))
    }
}

/// Threshold ladders for every rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MitigationThresholds {
    pub flood: Tiers,
    pub tiger: Tiers,
    /// Prey migration at or above this is a high-severity displacement.
    pub prey_migration_high: f64,
    /// Prey stress at or above this is a moderate habitat warning, checked
    /// only when prey migration stays below its bound.
    pub prey_stress_moderate: f64,
    pub zoonotic: Tiers,
    pub glacier: Tiers,
    /// Projection rows strictly above either bound get an extra note.
    pub projection_flood_above: f64,
    pub projection_tiger_above: f64,
}

impl Default for MitigationThresholds {
    fn default() -> Self {
        Self {
            flood: Tiers::new(Some(75.0), Some(50.0), Some(25.0)),
            tiger: Tiers::new(Some(65.0), Some(35.0), Some(15.0)),
            prey_migration_high: 60.0,
            prey_stress_moderate: 55.0,
            zoonotic: Tiers::new(Some(65.0), Some(40.0), None),
            glacier: Tiers::new(None, Some(60.0), None),
            projection_flood_above: 60.0,
            projection_tiger_above: 50.0,
        }
    }
}

fn advice(severity: Severity, category: Category, title: &'static str, actions: &'static [&'static str]) -> Mitigation {
    Mitigation {
        severity,
        category,
        title,
        actions,
    }
}

fn flood(sev: Severity) -> Option<Mitigation> {
    let cat = Category::FloodManagement;
    match sev {
        Severity::Critical => Some(advice(sev, cat, "Critical flood threshold exceeded", &[
            "Activate emergency embankment reinforcement along tidal channels",
            "Relocate low-lying village populations to pre-designated safe zones",
            "Deploy mobile flood barriers at delta entry points",
            "Accelerate mangrove reforestation to absorb storm surge energy",
        ])),
        Severity::High => Some(advice(sev, cat, "Elevated flood risk, early intervention needed", &[
            "Construct raised earthen embankments along river deltas",
            "Establish inland ecological buffer zones covering 20km radius",
            "Restore degraded mangrove marshland to reduce salinity intrusion",
        ])),
        Severity::Moderate => Some(advice(sev, cat, "Moderate flood risk, monitoring advised", &[
            "Install early-warning water level sensors at delta mouths",
            "Begin mangrove nursery programs for long-term coastal resilience",
        ])),
        Severity::Low | Severity::Info => None,
    }
}

fn tiger(sev: Severity) -> Option<Mitigation> {
    let cat = Category::TigerConservation;
    match sev {
        Severity::Critical => Some(advice(sev, cat, "Major Bengal tiger displacement underway", &[
            "Deploy smart perimeter fencing with camera traps along forest edge",
            "Establish emergency wildlife corridors connecting fragmented habitat patches",
            "Activate community conflict-mitigation rapid response teams in villages",
            "Create temporary refuge zones with supplementary prey in protected areas",
        ])),
        Severity::High => Some(advice(sev, cat, "Tiger population shifting inland, action required", &[
            "Expand protected habitat corridors northward by minimum 15km",
            "Install non-lethal deterrent lighting in human settlement boundaries",
            "Fund community-based tiger guardianship programs in buffer villages",
        ])),
        Severity::Moderate => Some(advice(sev, cat, "Early signs of tiger territory shift", &[
            "Increase camera trap density in core migration corridors",
            "Survey habitat quality of adjacent forest areas for future refuge capacity",
        ])),
        Severity::Low | Severity::Info => None,
    }
}

fn zoonotic(sev: Severity) -> Option<Mitigation> {
    let cat = Category::PublicHealth;
    match sev {
        Severity::Critical => Some(advice(sev, cat, "High human-wildlife interface exposure risk", &[
            "Deploy rapid-response veterinary surveillance teams to forest-edge communities",
            "Increase wildlife health monitoring for pathogen spillover indicators",
            "Establish sanitation and hand-hygiene infrastructure in conflict zones",
            "Train village health workers in zoonotic exposure recognition protocols",
        ])),
        Severity::High | Severity::Moderate => Some(advice(sev, cat, "Elevated human-wildlife contact exposure", &[
            "Increase wildlife health surveillance in forest-adjacent settlements",
            "Educate communities on reducing direct animal contact during flood events",
        ])),
        Severity::Low | Severity::Info => None,
    }
}

const PREY_DISPLACEMENT: &[&str] = &[
    "Restore inland grassland and secondary forest for displaced ungulate populations",
    "Implement controlled habitat corridors to allow safe prey movement",
    "Reduce poaching pressure through ranger deployment in displacement zones",
];

const HABITAT_STRESS: &[&str] = &[
    "Implement freshwater supplementation at key inland grazing areas",
    "Control invasive salt-tolerant species replacing native vegetation",
    "Establish community-managed eco-buffers around core forest areas",
];

const GLACIER_MELT: &[&str] = &[
    "Advocate for upstream watershed conservation in Himalayan headwaters",
    "Model and plan for sea-level rise exceeding current delta infrastructure limits",
    "Engage with national climate adaptation policy for long-term delta management",
];

const PROJECTION_NOTE: &[&str] = &[
    "Interventions taken before the projection window can materially reduce these projected values",
    "Each 10% reduction in flood risk today correlates with delayed onset of animal displacement",
    "Policy action is most effective early in the projection window based on the cascade trajectory",
];

const ALL_CLEAR: &[&str] = &[
    "Continue routine wildlife monitoring and habitat quality surveys",
    "Maintain existing mangrove conservation programs",
    "Monitor seasonal rainfall and upstream glacier reports for early warning",
];

/// Suggestions for `r` under the default thresholds.
pub fn mitigations(r: &SimulationResult) -> Vec<Mitigation> {
    mitigations_with(r, &MitigationThresholds::default())
}

/// Suggestions for `r` under custom thresholds.
///
/// Order is fixed: flood, tiger, ecosystem, public health, glacier,
/// projection note. A row that triggers nothing gets one low-severity
/// all-clear entry, so the result is never empty.
pub fn mitigations_with(r: &SimulationResult, t: &MitigationThresholds) -> Vec<Mitigation> {
    let mut out = Vec::new();
    out.extend(t.flood.classify(r.flood_risk).and_then(flood));
    out.extend(t.tiger.classify(r.tiger_migration_probability).and_then(tiger));

    if r.prey_migration_probability >= t.prey_migration_high {
        out.push(advice(
            Severity::High,
            Category::EcosystemBalance,
            "Prey species mass displacement, ecosystem destabilising",
            PREY_DISPLACEMENT,
        ));
    } else if r.prey_stress_index >= t.prey_stress_moderate {
        out.push(advice(
            Severity::Moderate,
            Category::EcosystemBalance,
            "High prey habitat stress, vegetation degrading",
            HABITAT_STRESS,
        ));
    }

    out.extend(t.zoonotic.classify(r.zoonotic_risk_index).and_then(zoonotic));

    if t.glacier.classify(r.glacier_amplification).is_some() {
        out.push(advice(
            Severity::High,
            Category::ClimateUpstream,
            "Accelerated glacier melt amplifying downstream risk",
            GLACIER_MELT,
        ));
    }

    if r.is_projection
        && (r.flood_risk > t.projection_flood_above
            || r.tiger_migration_probability > t.projection_tiger_above)
    {
        out.push(advice(
            Severity::Info,
            Category::ProjectionNote,
            "This is a future projection year",
            PROJECTION_NOTE,
        ));
    }

    if out.is_empty() {
        out.push(advice(
            Severity::Low,
            Category::SystemStatus,
            "All indices within manageable range",
            ALL_CLEAR,
        ));
    }
    debug!(year = r.year, scenario = %r.scenario, count = out.len(), "mitigations");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::Scenario;
    use proptest::prelude::*;

    fn row() -> SimulationResult {
        SimulationResult {
            year: 2023,
            flood_risk: 0.0,
            glacier_amplification: 0.0,
            prey_stress_index: 0.0,
            prey_migration_probability: 0.0,
            tiger_migration_probability: 0.0,
            zoonotic_risk_index: 0.0,
            human_density_factor: 0.65,
            wildlife_displacement_score: 0.0,
            is_projection: false,
            scenario: Scenario::default(),
        }
    }

    fn severities(r: &SimulationResult, cat: Category) -> Vec<Severity> {
        mitigations(r)
            .into_iter()
            .filter(|m| m.category == cat)
            .map(|m| m.severity)
            .collect()
    }

    #[test]
    fn quiet_row_gets_all_clear() {
        let m = mitigations(&row());
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].severity, Severity::Low);
        assert_eq!(m[0].category, Category::SystemStatus);
    }

    #[test]
    fn flood_tier_boundaries() {
        let at = |v: f64| severities(&SimulationResult { flood_risk: v, ..row() }, Category::FloodManagement);
        assert_eq!(at(24.99), Vec::<Severity>::new());
        assert_eq!(at(25.0), vec![Severity::Moderate]);
        assert_eq!(at(49.99), vec![Severity::Moderate]);
        assert_eq!(at(50.0), vec![Severity::High]);
        assert_eq!(at(74.99), vec![Severity::High]);
        assert_eq!(at(75.0), vec![Severity::Critical]);
    }

    #[test]
    fn tiger_tier_boundaries() {
        let at = |v: f64| {
            severities(
                &SimulationResult {
                    tiger_migration_probability: v,
                    ..row()
                },
                Category::TigerConservation,
            )
        };
        assert_eq!(at(14.99), Vec::<Severity>::new());
        assert_eq!(at(15.0), vec![Severity::Moderate]);
        assert_eq!(at(35.0), vec![Severity::High]);
        assert_eq!(at(64.99), vec![Severity::High]);
        assert_eq!(at(65.0), vec![Severity::Critical]);
    }

    #[test]
    fn prey_migration_shadows_prey_stress() {
        let stressed = SimulationResult {
            prey_stress_index: 55.0,
            ..row()
        };
        assert_eq!(severities(&stressed, Category::EcosystemBalance), vec![Severity::Moderate]);
        let below = SimulationResult {
            prey_stress_index: 54.99,
            ..row()
        };
        assert!(severities(&below, Category::EcosystemBalance).is_empty());
        let displaced = SimulationResult {
            prey_migration_probability: 60.0,
            ..stressed
        };
        assert_eq!(severities(&displaced, Category::EcosystemBalance), vec![Severity::High]);
    }

    #[test]
    fn zoonotic_and_glacier_boundaries() {
        let z = |v: f64| severities(&SimulationResult { zoonotic_risk_index: v, ..row() }, Category::PublicHealth);
        assert_eq!(z(39.99), Vec::<Severity>::new());
        assert_eq!(z(40.0), vec![Severity::High]);
        assert_eq!(z(65.0), vec![Severity::Critical]);

        let g = |v: f64| severities(&SimulationResult { glacier_amplification: v, ..row() }, Category::ClimateUpstream);
        assert_eq!(g(59.99), Vec::<Severity>::new());
        assert_eq!(g(60.0), vec![Severity::High]);
    }

    #[test]
    fn projection_note_needs_strict_excess() {
        let proj = SimulationResult {
            is_projection: true,
            flood_risk: 60.0,
            tiger_migration_probability: 50.0,
            ..row()
        };
        assert!(severities(&proj, Category::ProjectionNote).is_empty());
        let flood = SimulationResult {
            flood_risk: 60.01,
            ..proj.clone()
        };
        assert_eq!(severities(&flood, Category::ProjectionNote), vec![Severity::Info]);
        let tiger = SimulationResult {
            tiger_migration_probability: 50.01,
            ..proj.clone()
        };
        assert_eq!(severities(&tiger, Category::ProjectionNote), vec![Severity::Info]);
        let historical = SimulationResult {
            is_projection: false,
            ..flood
        };
        assert!(severities(&historical, Category::ProjectionNote).is_empty());
    }

    #[test]
    fn golden_2023_row() {
        let r = SimulationResult {
            flood_risk: 59.33,
            glacier_amplification: 51.0,
            prey_stress_index: 54.73,
            prey_migration_probability: 9.47,
            tiger_migration_probability: 15.68,
            zoonotic_risk_index: 41.65,
            wildlife_displacement_score: 0.09,
            ..row()
        };
        let cats: Vec<(Category, Severity)> = mitigations(&r).iter().map(|m| (m.category, m.severity)).collect();
        assert_eq!(
            cats,
            vec![
                (Category::FloodManagement, Severity::High),
                (Category::TigerConservation, Severity::Moderate),
                (Category::PublicHealth, Severity::High),
            ]
        );
    }

    #[test]
    fn custom_thresholds_from_yaml() {
        let t: MitigationThresholds = serde_yaml::from_str("flood:\n  critical: 90\n").unwrap();
        assert_eq!(t.flood.critical, Some(90.0));
        assert_eq!(t.flood.high, None);
        assert_eq!(t.tiger, MitigationThresholds::default().tiger);
        let r = SimulationResult { flood_risk: 80.0, ..row() };
        assert_eq!(mitigations_with(&r, &t)[0].category, Category::SystemStatus);
    }

    #[test]
    fn serializes_lowercase_severity_and_display_category() {
        let m = mitigations(&row());
        let json = serde_json::to_value(&m[0]).unwrap();
        assert_eq!(json["severity"], "low");
        assert_eq!(json["category"], "System Status");
        assert_eq!(json["actions"].as_array().unwrap().len(), 3);
        assert_eq!(Severity::Critical.label(), "Critical");
    }

    proptest! {
        #[test]
        fn never_empty_and_one_entry_per_category(
            flood in 0.0f64..=100.0,
            tiger in 0.0f64..=100.0,
            prey in 0.0f64..=100.0,
            stress in 0.0f64..=100.0,
            zoo in 0.0f64..=100.0,
            glacier in 0.0f64..=100.0,
            proj in any::<bool>(),
        ) {
            let r = SimulationResult {
                flood_risk: flood,
                tiger_migration_probability: tiger,
                prey_migration_probability: prey,
                prey_stress_index: stress,
                zoonotic_risk_index: zoo,
                glacier_amplification: glacier,
                is_projection: proj,
                ..row()
            };
            let m = mitigations(&r);
            prop_assert!(!m.is_empty());
            let mut cats: Vec<Category> = m.iter().map(|x| x.category).collect();
            let n = cats.len();
            cats.dedup();
            prop_assert_eq!(cats.len(), n);
        }
    }
}
