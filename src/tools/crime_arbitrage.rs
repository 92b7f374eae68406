//! Crime-value arbitrage: compares recent crime per property with median
//! assessed value to flag communities priced out of line with their safety.
//!
//! Negative scores are low crime at a reasonable price (BUY); positive
//! scores are high crime at a high price (SELL).

use super::{ASSESSED_VALUE, CRIME_COUNT, as_count};
use crate::analyzers::aggregate::Aggregator;
use crate::analyzers::keys::{CommunityCodes, KeyFields, KeyResolver};
use crate::analyzers::rank::{Order, Ranked, rank};
use crate::analyzers::score::{Gate, Join, Metric, ScoreFormula};
use crate::analyzers::types::ScoredEntity;
use crate::analyzers::utility::presentable;
use crate::config::{AnalyticsConfig, Dataset, ScoringConfig};
use crate::fetch::{DatasetLoader, FetchPolicy};
use crate::output::{ReportFile, Table};
use crate::record::Record;
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

const ASSESSMENTS: usize = 0;
const CRIME: usize = 1;

const YEAR: &str = "year";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageSignal {
    pub community: String,
    pub median_property_value: u64,
    pub crime_count: u64,
    pub property_count: u64,
    pub crime_rate_per_100: f64,
    pub arbitrage_score: f64,
    pub signal: String,
}

impl ArbitrageSignal {
    fn from_entity(e: &ScoredEntity) -> Self {
        Self {
            community: e.key().to_string(),
            median_property_value: e.metric("median_property_value").max(0.0).trunc() as u64,
            crime_count: as_count(e.metric("crime_count")),
            property_count: as_count(e.metric("property_count")),
            crime_rate_per_100: presentable(e.metric("crime_rate_per_100"), 2),
            arbitrage_score: presentable(e.score(), 3),
            signal: e.label("signal").unwrap_or_default().to_string(),
        }
    }
}

/// Crime records from `floor` onward. Once any record carries a `year`,
/// records without a readable year are dropped; a dataset with no `year`
/// at all is kept whole.
pub fn recent_crime(crime: &[Record], floor: i32) -> impl Iterator<Item = &Record> {
    let floor = f64::from(floor);
    let has_year = crime.iter().any(|r| r.get(YEAR).is_some());
    crime
        .iter()
        .filter(move |r| !has_year || r.number(YEAR).is_some_and(|year| year >= floor))
}

/// `crime_rate / crime_rate_normalizer − median_value / value_normalizer`,
/// where `crime_rate` is crimes per 100 assessed properties.
pub fn formula(scoring: &ScoringConfig) -> ScoreFormula {
    let crime_rate = Metric::sum(CRIME, CRIME_COUNT)
        .per(Metric::count(ASSESSMENTS))
        .scaled(100.0);
    let median_value = Metric::median(ASSESSMENTS, ASSESSED_VALUE);

    ScoreFormula::new(Join::Left)
        .gate(Gate::MinCount {
            input: ASSESSMENTS,
            min: scoring.min_properties,
        })
        .gate(Gate::Positive(median_value.clone()))
        .report("median_property_value", median_value.clone())
        .report("crime_count", Metric::sum(CRIME, CRIME_COUNT))
        .report("property_count", Metric::count(ASSESSMENTS))
        .report("crime_rate_per_100", crime_rate.clone())
        .term(
            "crime_norm",
            1.0,
            crime_rate.per(Metric::Const(scoring.crime_rate_normalizer)),
        )
        .term(
            "value_norm",
            -1.0,
            median_value.per(Metric::Const(scoring.value_normalizer)),
        )
}

/// Ranked most undervalued first.
pub fn analyze(
    crime: &[Record],
    assessments: &[Record],
    demographics: &[Record],
    config: &AnalyticsConfig,
) -> Ranked<ArbitrageSignal> {
    let codes = CommunityCodes::from_records(
        demographics,
        KeyFields::DEMOGRAPHIC_CODES,
        KeyFields::DEMOGRAPHICS,
    );
    debug!(codes = codes.len(), "Community code table built");

    let crime_aggs = Aggregator::new(KeyResolver::new(KeyFields::CRIME).with_codes(&codes))
        .sum(CRIME_COUNT)
        .run(recent_crime(crime, config.scoring.crime_year_floor));
    let assessment_aggs = Aggregator::new(KeyResolver::new(KeyFields::ASSESSMENTS))
        .retain(ASSESSED_VALUE)
        .run(assessments);

    let signals = &config.classifiers.market_signal;
    let scored: Vec<ScoredEntity> = formula(&config.scoring)
        .score(&[&assessment_aggs, &crime_aggs])
        .into_iter()
        .map(|e| {
            let signal = signals.classify(e.score()).to_string();
            e.with_label("signal", &signal)
        })
        .collect();

    rank(scored, Order::Ascending).map(|_, e| ArbitrageSignal::from_entity(&e))
}

fn with_signal<'a>(rows: &'a [ArbitrageSignal], signal: &str, n: usize) -> Vec<&'a ArbitrageSignal> {
    rows.iter().filter(|r| r.signal == signal).take(n).collect()
}

#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let demographics = loader.load(Dataset::Demographics, FetchPolicy::Abort).await?;
    let crime = loader.load(Dataset::Crime, FetchPolicy::Abort).await?;
    let assessments = loader.load(Dataset::Assessments, FetchPolicy::Abort).await?;

    let ranked = analyze(&crime, &assessments, &demographics, config);
    let buys = with_signal(ranked.all(), "BUY", 20);
    let sells = with_signal(ranked.all(), "SELL", 20);
    let holds = with_signal(ranked.all(), "HOLD", 20);
    info!(
        communities = ranked.len(),
        buys = buys.len(),
        sells = sells.len(),
        "Arbitrage signals ranked"
    );

    Ok(vec![
        ReportFile::json("crime_value_analysis.json", ranked.all())?,
        ReportFile::csv("investment_signals.csv", ranked.all())?,
        ReportFile::html_sections(
            "arbitrage_map.html",
            "Calgary Crime-Value Arbitrage",
            &[
                ("BUY signals", Table::from_rows(&buys)?),
                ("SELL signals", Table::from_rows(&sells)?),
                ("HOLD", Table::from_rows(&holds)?),
            ],
        )?,
    ])
}
