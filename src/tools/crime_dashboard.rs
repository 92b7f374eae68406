//! Crime dashboard: totals and leading offence categories per community,
//! plus citywide category totals.

use super::{CRIME_CATEGORY, CRIME_COUNT, as_count};
use crate::analyzers::aggregate::{CategoryTally, aggregate_categorical, tally_categories};
use crate::analyzers::keys::{CommunityCodes, KeyFields, KeyResolver};
use crate::analyzers::rank::{Order, Ranked, rank_by};
use crate::config::{AnalyticsConfig, Dataset};
use crate::fetch::{DatasetLoader, FetchPolicy};
use crate::output::{ReportFile, Table};
use crate::record::Record;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

const TOP_CATEGORIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub crimes: u64,
}

impl CategoryTotal {
    fn list(categories: Vec<(&str, f64)>) -> Vec<Self> {
        categories
            .into_iter()
            .map(|(category, crimes)| Self {
                category: category.to_string(),
                crimes: as_count(crimes),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityCrime {
    pub community: String,
    pub total_crimes: u64,
    pub top_categories: Vec<CategoryTotal>,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrimeDashboard {
    pub communities: Vec<CommunityCrime>,
    pub categories: Vec<CategoryTotal>,
    pub total_crimes: u64,
}

/// Communities ranked by total crimes, largest first. Communities whose
/// counts sum to zero are left out.
pub fn analyze(
    crime: &[Record],
    demographics: &[Record],
    config: &AnalyticsConfig,
) -> Ranked<CommunityCrime> {
    let codes = CommunityCodes::from_records(
        demographics,
        KeyFields::DEMOGRAPHIC_CODES,
        KeyFields::DEMOGRAPHICS,
    );
    let keys = KeyResolver::new(KeyFields::CRIME).with_codes(&codes);

    let tallies: Vec<_> = aggregate_categorical(crime, keys, CRIME_CATEGORY, CRIME_COUNT)
        .into_iter()
        .filter(|(_, tally)| tally.total() > 0.0)
        .collect();

    let tiers = &config.classifiers.crime_tier;
    rank_by(tallies, |(_, tally)| tally.total(), Order::Descending).map(|rank, (key, tally)| {
        CommunityCrime {
            community: key.to_string(),
            total_crimes: as_count(tally.total()),
            top_categories: CategoryTotal::list(tally.top(TOP_CATEGORIES)),
            tier: tiers.classify(rank as f64).to_string(),
        }
    })
}

/// Citywide totals per category, largest first.
pub fn citywide(crime: &[Record]) -> (Vec<CategoryTotal>, u64) {
    let tally: CategoryTally = tally_categories(crime, CRIME_CATEGORY, CRIME_COUNT);
    let total = as_count(tally.total());
    (CategoryTotal::list(tally.top(tally.entries().len())), total)
}

#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let demographics = loader.load(Dataset::Demographics, FetchPolicy::Degrade).await?;
    let crime = loader.load(Dataset::Crime, FetchPolicy::Abort).await?;

    let ranked = analyze(&crime, &demographics, config);
    let (categories, total_crimes) = citywide(&crime);
    info!(
        communities = ranked.len(),
        categories = categories.len(),
        total_crimes,
        "Crime dashboard built"
    );

    let sections = [
        ("Communities", Table::from_rows(ranked.top(20))?),
        ("Categories", Table::from_rows(&categories[..categories.len().min(15)])?),
    ];
    let dashboard = CrimeDashboard {
        communities: ranked.top(50).to_vec(),
        categories,
        total_crimes,
    };

    Ok(vec![
        ReportFile::json("crime_dashboard_data.json", &dashboard)?,
        ReportFile::html_sections("crime_dashboard.html", "Calgary Crime Dashboard", &sections)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crime(community: &str, category: &str, count: &str) -> Record {
        Record::new()
            .with("community", community)
            .with("category", category)
            .with("crime_count", count)
    }

    fn sample() -> Vec<Record> {
        vec![
            crime("BLN", "Theft FROM Vehicle", "7"),
            crime("BLN", "Break & Enter - Commercial", "2"),
            crime("BLN", "Assault (Non-domestic)", "3"),
            crime("BLN", "Street Robbery", "1"),
            crime("Downtown Commercial Core", "Theft FROM Vehicle", "20"),
            crime("Quiet Acres", "Theft FROM Vehicle", "0"),
            crime("", "Street Robbery", "4"),
        ]
    }

    #[test]
    fn test_codes_and_top_categories() {
        let demographics = vec![Record::new().with("comm_code", "BLN").with("name", "Beltline")];
        let ranked = analyze(&sample(), &demographics, &AnalyticsConfig::default());
        let rows = ranked.all();

        assert_eq!(rows.len(), 2, "zero-total communities are dropped");
        assert_eq!(rows[0].community, "Downtown Commercial Core");
        assert_eq!(rows[0].total_crimes, 20);
        assert_eq!(rows[0].tier, "TOP_10");

        assert_eq!(rows[1].community, "Beltline");
        assert_eq!(rows[1].total_crimes, 13);
        let top: Vec<&str> = rows[1]
            .top_categories
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(
            top,
            ["Theft FROM Vehicle", "Assault (Non-domestic)", "Break & Enter - Commercial"]
        );
    }

    #[test]
    fn test_codes_pass_through_without_demographics() {
        let ranked = analyze(&sample(), &[], &AnalyticsConfig::default());
        assert!(ranked.all().iter().any(|r| r.community == "BLN"));
    }

    #[test]
    fn test_citywide_includes_unkeyed_records() {
        let (categories, total) = citywide(&sample());
        assert_eq!(total, 37);
        assert_eq!(categories[0].category, "Theft FROM Vehicle");
        assert_eq!(categories[0].crimes, 27);
        assert_eq!(categories[1].category, "Street Robbery");
        assert_eq!(categories[1].crimes, 5);
    }
}
