//! Gentrification index: permit activity per property weighted by how
//! expensive the community already is.

use super::{ASSESSED_VALUE, as_count};
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

const ASSESSMENTS: usize = 0;
const PERMITS: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GentrificationScore {
    pub community: String,
    pub score: f64,
    pub avg_property_value: f64,
    /// Permits per 100 properties.
    pub permit_rate: f64,
    pub permits: u64,
    pub tier: String,
}

impl GentrificationScore {
    fn from_entity(e: &ScoredEntity) -> Self {
        Self {
            community: e.key().to_string(),
            score: presentable(e.score(), 2),
            avg_property_value: presentable(e.metric("avg_property_value"), 0),
            permit_rate: presentable(e.metric("permit_rate"), 2),
            permits: as_count(e.metric("permits")),
            tier: e.label("tier").unwrap_or_default().to_string(),
        }
    }
}

/// `permit_rate × avg_value / normalizer` over communities with enough
/// assessed properties.
pub fn formula(scoring: &ScoringConfig) -> ScoreFormula {
    let permit_rate = Metric::count(PERMITS)
        .per(Metric::count(ASSESSMENTS))
        .scaled(100.0);
    let avg_value = Metric::avg(ASSESSMENTS, ASSESSED_VALUE);

    ScoreFormula::new(Join::Left)
        .gate(Gate::MinCount {
            input: ASSESSMENTS,
            min: scoring.min_properties,
        })
        .report("avg_property_value", avg_value.clone())
        .report("permit_rate", permit_rate.clone())
        .report("permits", Metric::count(PERMITS))
        .term(
            "gentrification",
            1.0,
            permit_rate.times(avg_value.per(Metric::Const(scoring.gentrification_value_normalizer))),
        )
}

pub fn analyze(
    assessments: &[Record],
    permits: &[Record],
    config: &AnalyticsConfig,
) -> Ranked<GentrificationScore> {
    let assessment_aggs = Aggregator::new(KeyResolver::new(KeyFields::ASSESSMENTS))
        .sum(ASSESSED_VALUE)
        .run(assessments);
    let permit_aggs = Aggregator::new(KeyResolver::new(KeyFields::PERMITS)).run(permits);

    let scored = formula(&config.scoring).score(&[&assessment_aggs, &permit_aggs]);
    rank(scored, Order::Descending)
        .label_ranks("tier", &config.classifiers.gentrification_tier)
        .map(|_, e| GentrificationScore::from_entity(&e))
}

/// Either dataset may be unavailable; the index is then built from what
/// remains.
#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let assessments = loader.load(Dataset::Assessments, FetchPolicy::Degrade).await?;
    let permits = loader.load(Dataset::Permits, FetchPolicy::Degrade).await?;

    let ranked = analyze(&assessments, &permits, config);
    info!(communities = ranked.len(), "Gentrification index ranked");

    Ok(vec![
        ReportFile::json("gentrification_scores.json", ranked.top(50))?,
        ReportFile::html(
            "gentrification_map.html",
            "Calgary Gentrification Index",
            ranked.top(40),
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(community: &str, n: usize, value: &str) -> Vec<Record> {
        (0..n)
            .map(|_| {
                Record::new()
                    .with("comm_name", community)
                    .with("assessed_value", value)
            })
            .collect()
    }

    fn permits(community: &str, n: usize) -> Vec<Record> {
        (0..n)
            .map(|_| Record::new().with("communityname", community))
            .collect()
    }

    #[test]
    fn test_index() {
        let mut assessments = properties("Bridgeland", 20, "800000");
        assessments.extend(properties("Sage Hill", 10, "400000"));
        assessments.extend(properties("Thin", 9, "900000"));
        let mut permit_rows = permits("Bridgeland", 5);
        permit_rows.extend(permits("Thin", 50));

        let ranked = analyze(&assessments, &permit_rows, &AnalyticsConfig::default());
        let rows = ranked.all();
        assert_eq!(rows.len(), 2);

        // 25 per 100 properties * 0.8
        assert_eq!(rows[0].community, "Bridgeland");
        assert_eq!(rows[0].permit_rate, 25.0);
        assert_eq!(rows[0].avg_property_value, 800000.0);
        assert_eq!(rows[0].score, 20.0);
        assert_eq!(rows[0].tier, "WATCH");

        assert_eq!(rows[1].community, "Sage Hill");
        assert_eq!(rows[1].permits, 0);
        assert_eq!(rows[1].score, 0.0);
    }

    #[test]
    fn test_no_assessments_means_no_rows() {
        let ranked = analyze(&[], &permits("Bridgeland", 5), &AnalyticsConfig::default());
        assert!(ranked.is_empty());
    }
}
