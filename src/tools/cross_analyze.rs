//! Cross-dataset composite: record counts from every dataset, combined into
//! one investment and livability score per community.

use super::as_count;
use crate::analyzers::aggregate::{Aggregates, Aggregator};
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
use std::fmt::Write as _;
use tracing::info;

const PERMITS: usize = 0;
const ASSESSMENTS: usize = 1;
const CRIME: usize = 2;
const DEMOGRAPHICS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub community: String,
    pub score: f64,
    pub permits: u64,
    pub crime: u64,
    pub assessments: u64,
    pub demographics: u64,
    pub tier: String,
}

impl CompositeScore {
    fn from_entity(e: &ScoredEntity) -> Self {
        Self {
            community: e.key().to_string(),
            score: presentable(e.score(), 2),
            permits: as_count(e.metric("permits")),
            crime: as_count(e.metric("crime")),
            assessments: as_count(e.metric("assessments")),
            demographics: as_count(e.metric("demographics")),
            tier: e.label("tier").unwrap_or_default().to_string(),
        }
    }
}

/// Weighted record counts over communities seen often enough across all
/// datasets. Inputs are permits, assessments, crime, demographics.
pub fn formula(scoring: &ScoringConfig) -> ScoreFormula {
    ScoreFormula::new(Join::Outer)
        .gate(Gate::MinTotalCount(scoring.min_combined_records))
        .term("permits", scoring.cross_permit_weight, Metric::count(PERMITS))
        .term(
            "assessments",
            scoring.cross_assessment_weight,
            Metric::count(ASSESSMENTS),
        )
        .term("crime", scoring.cross_crime_weight, Metric::count(CRIME))
        .term(
            "demographics",
            scoring.cross_demographic_weight,
            Metric::count(DEMOGRAPHICS),
        )
}

fn counts(records: &[Record]) -> Aggregates {
    Aggregator::new(KeyResolver::new(KeyFields::ANY)).run(records)
}

pub fn analyze(
    permits: &[Record],
    assessments: &[Record],
    crime: &[Record],
    demographics: &[Record],
    config: &AnalyticsConfig,
) -> Ranked<CompositeScore> {
    let inputs = [
        counts(permits),
        counts(assessments),
        counts(crime),
        counts(demographics),
    ];
    let scored = formula(&config.scoring).score(&[&inputs[0], &inputs[1], &inputs[2], &inputs[3]]);
    rank(scored, Order::Descending)
        .label_ranks("tier", &config.classifiers.composite_tier)
        .map(|_, e| CompositeScore::from_entity(&e))
}

/// Plain-text summary of the leading communities.
pub fn recommendations(rows: &[CompositeScore]) -> String {
    let mut text = String::from("CALGARY INVESTMENT RECOMMENDATIONS\n");
    text.push_str(&"=".repeat(60));
    text.push_str("\n\nTop Communities by Composite Score:\n\n");
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(text, "{}. {} (score: {})", i + 1, row.community, row.score);
        let _ = writeln!(
            text,
            "   Permits: {}, Properties: {}, Crime: {}\n",
            row.permits, row.assessments, row.crime
        );
    }
    text
}

/// Any dataset may be unavailable; it then contributes no counts.
#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let permits = loader.load(Dataset::Permits, FetchPolicy::Degrade).await?;
    let assessments = loader.load(Dataset::Assessments, FetchPolicy::Degrade).await?;
    let crime = loader.load(Dataset::Crime, FetchPolicy::Degrade).await?;
    let demographics = loader.load(Dataset::Demographics, FetchPolicy::Degrade).await?;

    let ranked = analyze(&permits, &assessments, &crime, &demographics, config);
    info!(communities = ranked.len(), "Composite scores ranked");

    Ok(vec![
        ReportFile::json("correlations.json", ranked.top(50))?,
        ReportFile::html("insights.html", "Calgary Cross-Dataset Insights", ranked.top(30))?,
        ReportFile::text("recommendations.txt", recommendations(ranked.top(10))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(field: &str, community: &str, n: usize) -> Vec<Record> {
        (0..n).map(|_| Record::new().with(field, community)).collect()
    }

    #[test]
    fn test_composite_over_all_datasets() {
        let permits = rows("communityname", "Inglewood", 6);
        let mut assessments = rows("comm_name", "Inglewood", 100);
        assessments.extend(rows("comm_name", "Quiet", 5));
        let crime = rows("community", "Inglewood", 4);
        let demographics = rows("name", "Inglewood", 1);

        let ranked = analyze(
            &permits,
            &assessments,
            &crime,
            &demographics,
            &AnalyticsConfig::default(),
        );
        assert_eq!(ranked.len(), 1, "Quiet has fewer than 10 records in total");

        let row = &ranked.all()[0];
        assert_eq!(row.permits, 6);
        assert_eq!(row.assessments, 100);
        assert_eq!(row.crime, 4);
        assert_eq!(row.demographics, 1);
        // 12 + 1 - 2 + 0.1
        assert_eq!(row.score, 11.1);
        assert_eq!(row.tier, "HOT");
    }

    #[test]
    fn test_one_dataset_is_enough() {
        let crime = rows("community", "Downtown", 12);
        let ranked = analyze(&[], &[], &crime, &[], &AnalyticsConfig::default());
        assert_eq!(ranked.all()[0].score, -6.0);
    }

    #[test]
    fn test_recommendations_text() {
        let row = CompositeScore {
            community: "Inglewood".to_string(),
            score: 11.1,
            permits: 6,
            crime: 4,
            assessments: 100,
            demographics: 1,
            tier: "HOT".to_string(),
        };
        let text = recommendations(&[row]);
        assert!(text.starts_with("CALGARY INVESTMENT RECOMMENDATIONS\n"));
        assert!(text.contains("1. Inglewood (score: 11.1)\n"));
        assert!(text.contains("   Permits: 6, Properties: 100, Crime: 4\n\n"));
    }
}
