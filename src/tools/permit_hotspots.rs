//! Permit hotspots: communities where building activity is high relative to
//! the size and value of the existing housing stock.

use super::{ASSESSED_VALUE, PERMIT_COST, as_count};
use crate::analyzers::aggregate::Aggregator;
use crate::analyzers::keys::{KeyFields, KeyResolver};
use crate::analyzers::rank::{Order, Ranked, rank};
use crate::analyzers::score::{Gate, Join, Metric, ScoreFormula};
use crate::analyzers::types::ScoredEntity;
use crate::analyzers::utility::presentable;
use crate::config::{AnalyticsConfig, Dataset, ScoringConfig};
use crate::fetch::{DatasetLoader, FetchPolicy};
use crate::output::ReportFile;
use crate::record::Record;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

const PERMITS: usize = 0;
const ASSESSMENTS: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermitHotspot {
    pub community: String,
    pub score: f64,
    pub permit_count: u64,
    pub total_permit_value: f64,
    pub avg_permit_value: f64,
    pub property_count: u64,
    pub avg_property_value: f64,
    /// Permits per 100 properties.
    pub permit_density: f64,
    /// Permit value as a percentage of total assessed value.
    pub investment_ratio: f64,
    pub tier: String,
}

impl PermitHotspot {
    fn from_entity(e: &ScoredEntity) -> Self {
        Self {
            community: e.key().to_string(),
            score: presentable(e.score(), 2),
            permit_count: as_count(e.metric("permit_count")),
            total_permit_value: presentable(e.metric("total_permit_value"), 2),
            avg_permit_value: presentable(e.metric("avg_permit_value"), 2),
            property_count: as_count(e.metric("property_count")),
            avg_property_value: presentable(e.metric("avg_property_value"), 2),
            permit_density: presentable(e.metric("permit_density") * 100.0, 2),
            investment_ratio: presentable(e.metric("investment_ratio") * 100.0, 2),
            tier: e.label("tier").unwrap_or_default().to_string(),
        }
    }
}

/// `density_weight × permits/properties + ratio_weight × permit value/assessed value`,
/// over communities with enough permits and properties.
pub fn formula(scoring: &ScoringConfig) -> ScoreFormula {
    ScoreFormula::new(Join::Inner)
        .gate(Gate::MinCount {
            input: PERMITS,
            min: scoring.min_permits,
        })
        .gate(Gate::MinCount {
            input: ASSESSMENTS,
            min: scoring.min_properties,
        })
        .report("permit_count", Metric::count(PERMITS))
        .report("total_permit_value", Metric::sum(PERMITS, PERMIT_COST))
        .report("avg_permit_value", Metric::avg(PERMITS, PERMIT_COST))
        .report("property_count", Metric::count(ASSESSMENTS))
        .report("avg_property_value", Metric::avg(ASSESSMENTS, ASSESSED_VALUE))
        .term(
            "permit_density",
            scoring.permit_density_weight,
            Metric::count(PERMITS).per(Metric::count(ASSESSMENTS)),
        )
        .term(
            "investment_ratio",
            scoring.investment_ratio_weight,
            Metric::sum(PERMITS, PERMIT_COST).per(Metric::sum(ASSESSMENTS, ASSESSED_VALUE)),
        )
}

pub fn analyze(
    permits: &[Record],
    assessments: &[Record],
    config: &AnalyticsConfig,
) -> Ranked<PermitHotspot> {
    let permit_aggs = Aggregator::new(KeyResolver::new(KeyFields::PERMITS))
        .sum(PERMIT_COST)
        .run(permits);
    let assessment_aggs = Aggregator::new(KeyResolver::new(KeyFields::ASSESSMENTS))
        .sum(ASSESSED_VALUE)
        .run(assessments);

    let scored = formula(&config.scoring).score(&[&permit_aggs, &assessment_aggs]);
    rank(scored, Order::Descending)
        .label_ranks("tier", &config.classifiers.investment_tier)
        .map(|_, e| PermitHotspot::from_entity(&e))
}

#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let permits = loader.load(Dataset::Permits, FetchPolicy::Abort).await?;
    let assessments = loader.load(Dataset::Assessments, FetchPolicy::Abort).await?;

    let ranked = analyze(&permits, &assessments, config);
    info!(communities = ranked.len(), "Permit hotspots ranked");

    Ok(vec![
        ReportFile::json("permit_hotspots.json", ranked.top(50))?,
        ReportFile::csv("investment_targets.csv", ranked.top(50))?,
        ReportFile::html(
            "permit_analysis.html",
            "Calgary Permit Profit Predictor",
            ranked.top(30),
        )?,
    ])
}
