//! Run configuration.
//!
//! Loaded once from an optional JSON file and passed by reference into every
//! tool. Every section has built-in defaults, so a config file only needs to
//! name the values it overrides:
//!
//! ```json
//! {
//!   "datasets": { "permits": { "id": "c2es-76ed", "limit": 10000 } },
//!   "scoring": { "min_permits": 5 }
//! }
//! ```

use crate::analyzers::geo::{DistanceBand, DistanceBands};
use crate::analyzers::grade::Classifier;
use crate::errors::BandError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub source: SourceConfig,
    pub datasets: DatasetsConfig,
    pub scoring: ScoringConfig,
    pub classifiers: ClassifierConfig,
    pub transit: TransitConfig,
}

impl AnalyticsConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalyticsConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .transit
            .distance_bands()
            .with_context(|| format!("invalid transit bands in {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Socrata resource root; datasets live at `{base_url}/{id}.json`.
    pub base_url: String,
    /// Environment variable holding the optional Socrata app token.
    pub app_token_env: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.calgary.ca/resource".to_string(),
            app_token_env: "SOCRATA_APP_TOKEN".to_string(),
            timeout_secs: 60,
        }
    }
}

/// The four open datasets every tool draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    Permits,
    Assessments,
    Crime,
    Demographics,
}

impl Dataset {
    pub fn name(self) -> &'static str {
        match self {
            Dataset::Permits => "permits",
            Dataset::Assessments => "assessments",
            Dataset::Crime => "crime",
            Dataset::Demographics => "demographics",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub id: String,
    /// Row cap passed to the portal as `$limit`.
    pub limit: usize,
}

impl DatasetSpec {
    fn new(id: &str, limit: usize) -> Self {
        Self {
            id: id.to_string(),
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetsConfig {
    pub permits: DatasetSpec,
    pub assessments: DatasetSpec,
    pub crime: DatasetSpec,
    pub demographics: DatasetSpec,
}

impl DatasetsConfig {
    pub fn get(&self, dataset: Dataset) -> &DatasetSpec {
        match dataset {
            Dataset::Permits => &self.permits,
            Dataset::Assessments => &self.assessments,
            Dataset::Crime => &self.crime,
            Dataset::Demographics => &self.demographics,
        }
    }
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            permits: DatasetSpec::new("c2es-76ed", 50_000),
            assessments: DatasetSpec::new("4bsw-nn7w", 50_000),
            crime: DatasetSpec::new("78gh-n26t", 20_000),
            demographics: DatasetSpec::new("rkfr-buzb", 5_000),
        }
    }
}

/// Gates, weights, and normalising constants for the scoring tools. The
/// normalisers have no derivation beyond matching past reports; tune them
/// here rather than in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_permits: usize,
    pub min_properties: usize,
    pub min_population: f64,
    pub min_combined_records: usize,

    pub permit_density_weight: f64,
    pub investment_ratio_weight: f64,

    pub crime_rate_normalizer: f64,
    pub value_normalizer: f64,
    pub crime_year_floor: i32,

    pub gentrification_value_normalizer: f64,

    pub cross_permit_weight: f64,
    pub cross_assessment_weight: f64,
    pub cross_crime_weight: f64,
    pub cross_demographic_weight: f64,

    /// Trailing window for construction velocity, in months.
    pub velocity_window: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_permits: 3,
            min_properties: 10,
            min_population: 500.0,
            min_combined_records: 10,
            permit_density_weight: 100.0,
            investment_ratio_weight: 50.0,
            crime_rate_normalizer: 5.0,
            value_normalizer: 500_000.0,
            crime_year_floor: 2020,
            gentrification_value_normalizer: 1_000_000.0,
            cross_permit_weight: 2.0,
            cross_assessment_weight: 0.01,
            cross_crime_weight: -0.5,
            cross_demographic_weight: 0.1,
            velocity_window: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub market_signal: Classifier,
    pub construction_trend: Classifier,
    pub investment_tier: Classifier,
    pub desert_tier: Classifier,
    pub transit_tier: Classifier,
    pub gentrification_tier: Classifier,
    pub composite_tier: Classifier,
    pub crime_tier: Classifier,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            market_signal: Classifier::market_signal(),
            construction_trend: Classifier::construction_trend(),
            investment_tier: Classifier::rank_tier(10, "TOP_PICK"),
            desert_tier: Classifier::rank_tier(5, "HIGH_OPPORTUNITY"),
            transit_tier: Classifier::rank_tier(5, "HIGH_TOD"),
            gentrification_tier: Classifier::rank_tier(15, "WATCH"),
            composite_tier: Classifier::rank_tier(10, "HOT"),
            crime_tier: Classifier::rank_tier(10, "TOP_10"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub bands: Vec<DistanceBand>,
    pub lat_field: String,
    pub lon_field: String,
    pub value_field: String,
}

impl TransitConfig {
    pub fn distance_bands(&self) -> Result<DistanceBands, BandError> {
        DistanceBands::new(self.bands.clone())
    }
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            bands: vec![
                DistanceBand::new("500m", 500.0, 2.0),
                DistanceBand::new("1km", 1000.0, 1.0),
            ],
            lat_field: "latitude".to_string(),
            lon_field: "longitude".to_string(),
            value_field: "estprojectcost".to_string(),
        }
    }
}
