//! Construction boom detector: permit velocity per community, recent months
//! against the months before.

use crate::analyzers::aggregate::aggregate_monthly;
use crate::analyzers::keys::{KeyFields, KeyResolver};
use crate::analyzers::rank::{Order, Ranked, rank_by};
use crate::analyzers::utility::presentable;
use crate::analyzers::velocity::{VelocityDetector, VelocityTrend};
use crate::config::{AnalyticsConfig, Dataset};
use crate::fetch::{DatasetLoader, FetchPolicy};
use crate::output::ReportFile;
use crate::record::Record;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

/// Candidate date fields, most specific first.
pub const DATE_FIELDS: [&str; 5] = [
    "applieddate",
    "issueddate",
    "applied_date",
    "issued_date",
    "date",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstructionVelocity {
    pub community: String,
    /// Months in each compared window.
    pub window_months: usize,
    pub recent_permits: u64,
    pub previous_permits: u64,
    pub velocity_change: i64,
    pub percent_change: f64,
    pub status: String,
    /// Observed months in the community's series.
    pub months: usize,
}

impl From<VelocityTrend> for ConstructionVelocity {
    fn from(t: VelocityTrend) -> Self {
        Self {
            community: t.key.to_string(),
            window_months: t.window,
            recent_permits: t.velocity.recent,
            previous_permits: t.velocity.previous,
            velocity_change: t.velocity.delta,
            percent_change: presentable(t.velocity.pct_change, 1),
            status: t.status,
            months: t.periods,
        }
    }
}

/// Ranked by absolute change in permits, largest first.
pub fn analyze(permits: &[Record], config: &AnalyticsConfig) -> Ranked<ConstructionVelocity> {
    let series = aggregate_monthly(permits, KeyResolver::new(KeyFields::PERMITS), &DATE_FIELDS);
    let detector = VelocityDetector {
        window: config.scoring.velocity_window,
        classifier: &config.classifiers.construction_trend,
    };
    let trends = detector.detect(&series);
    rank_by(trends, |t| t.velocity.delta as f64, Order::Descending).map(|_, t| t.into())
}

#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let permits = loader.load(Dataset::Permits, FetchPolicy::Abort).await?;

    let ranked = analyze(&permits, config);
    let booming = ranked.all().iter().filter(|r| r.status == "BOOM").count();
    let cooling = ranked.all().iter().filter(|r| r.status == "COOLING").count();
    info!(communities = ranked.len(), booming, cooling, "Construction velocity ranked");

    Ok(vec![
        ReportFile::json("construction_velocity.json", ranked.top(40))?,
        ReportFile::csv("velocity_trends.csv", ranked.all())?,
        ReportFile::html(
            "boom_analysis.html",
            "Calgary Construction Boom Detector",
            ranked.top(20),
        )?,
    ])
}
