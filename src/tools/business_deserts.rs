//! Business deserts: populous communities with little commercial permit
//! activity.

use super::{PERMIT_COST, as_count};
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

const DEMOGRAPHICS: usize = 0;
const ALL_PERMITS: usize = 1;
const COMMERCIAL: usize = 2;

const POPULATION: &str = "population";
const POPULATION_FIELDS: [&str; 2] = ["res_cnt", "resident_count"];
const CLASS_FIELDS: [&str; 2] = ["permitclassmapped", "workclassmapped"];
const COMMERCIAL_KEYWORDS: [&str; 6] =
    ["commercial", "retail", "business", "office", "store", "restaurant"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessDesert {
    pub community: String,
    pub population: u64,
    pub commercial_permits: u64,
    pub total_permits: u64,
    pub commercial_value: f64,
    pub commercial_permits_per_1k: f64,
    /// Commercial share of all permits, in percent.
    pub commercial_ratio: f64,
    pub opportunity_score: f64,
    pub tier: String,
}

impl BusinessDesert {
    fn from_entity(e: &ScoredEntity) -> Self {
        Self {
            community: e.key().to_string(),
            population: as_count(e.metric("population")),
            commercial_permits: as_count(e.metric("commercial_permits")),
            total_permits: as_count(e.metric("total_permits")),
            commercial_value: presentable(e.metric("commercial_value"), 2),
            commercial_permits_per_1k: presentable(e.metric("commercial_permits_per_1k"), 2),
            commercial_ratio: presentable(e.metric("commercial_ratio"), 2),
            opportunity_score: presentable(e.score(), 2),
            tier: e.label("tier").unwrap_or_default().to_string(),
        }
    }
}

/// A permit is commercial when its permit or work class mentions a
/// commercial keyword, case-insensitively.
pub fn is_commercial(permit: &Record) -> bool {
    CLASS_FIELDS
        .iter()
        .filter_map(|field| permit.text(field))
        .any(|class| {
            let class = class.to_lowercase();
            COMMERCIAL_KEYWORDS.iter().any(|kw| class.contains(kw))
        })
}

/// Copies `record` with a whole-number `population` field taken from the
/// first population field present. A present but unreadable count is 0.
fn with_population(record: &Record) -> Record {
    match POPULATION_FIELDS.into_iter().find(|f| record.get(f).is_some()) {
        Some(field) => {
            let residents = record.number(field).unwrap_or(0.0);
            record.clone().with(POPULATION, residents.trunc())
        }
        None => record.clone(),
    }
}

/// `(population / 1000) / (commercial_permits + 1)` over communities with at
/// least `min_population` residents. Population is the largest count reported
/// for the community.
pub fn formula(scoring: &ScoringConfig) -> ScoreFormula {
    let population = Metric::max(DEMOGRAPHICS, POPULATION);
    ScoreFormula::new(Join::Left)
        .gate(Gate::AtLeast(population.clone(), scoring.min_population))
        .report("population", population.clone())
        .report("commercial_permits", Metric::count(COMMERCIAL))
        .report("total_permits", Metric::count(ALL_PERMITS))
        .report("commercial_value", Metric::sum(COMMERCIAL, PERMIT_COST))
        .report(
            "commercial_permits_per_1k",
            Metric::count(COMMERCIAL).per(population.clone()).scaled(1000.0),
        )
        .report(
            "commercial_ratio",
            Metric::count(COMMERCIAL)
                .per(Metric::count(ALL_PERMITS))
                .scaled(100.0),
        )
        .term(
            "opportunity_score",
            1.0,
            population
                .per(Metric::Const(1000.0))
                .per(Metric::count(COMMERCIAL).plus(1.0)),
        )
}

pub fn analyze(
    permits: &[Record],
    demographics: &[Record],
    config: &AnalyticsConfig,
) -> Ranked<BusinessDesert> {
    let residents: Vec<Record> = demographics.iter().map(with_population).collect();
    let population_aggs = Aggregator::new(KeyResolver::new(KeyFields::DEMOGRAPHICS))
        .retain(POPULATION)
        .run(&residents);

    let permit_keys = KeyResolver::new(KeyFields::PERMITS);
    let permit_aggs = Aggregator::new(permit_keys).run(permits);
    let commercial_aggs = Aggregator::new(permit_keys)
        .sum(PERMIT_COST)
        .run(permits.iter().filter(|p| is_commercial(p)));

    let scored =
        formula(&config.scoring).score(&[&population_aggs, &permit_aggs, &commercial_aggs]);
    rank(scored, Order::Descending)
        .label_ranks("tier", &config.classifiers.desert_tier)
        .map(|_, e| BusinessDesert::from_entity(&e))
}

#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let permits = loader.load(Dataset::Permits, FetchPolicy::Abort).await?;
    let demographics = loader.load(Dataset::Demographics, FetchPolicy::Abort).await?;

    let ranked = analyze(&permits, &demographics, config);
    info!(communities = ranked.len(), "Business deserts ranked");

    Ok(vec![
        ReportFile::json("business_deserts.json", ranked.top(30))?,
        ReportFile::csv("opportunities.csv", ranked.all())?,
        ReportFile::html(
            "desert_analysis.html",
            "Calgary Business Desert Finder",
            ranked.top(20),
        )?,
    ])
}
