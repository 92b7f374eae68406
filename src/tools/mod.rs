//! The analysis tools.
//!
//! Every tool follows the same shape: load its datasets through the
//! [`DatasetLoader`] under its own [`FetchPolicy`](crate::fetch::FetchPolicy),
//! run a pure `analyze` step over the records, and render its report files.
//! Nothing is written here; the caller persists the files of a whole run.

pub mod business_deserts;
pub mod construction_boom;
pub mod crime_arbitrage;
pub mod crime_dashboard;
pub mod cross_analyze;
pub mod gentrification;
pub mod permit_hotspots;
pub mod transit_radar;

use crate::analyzers::utility::finite_or_zero;
use crate::config::AnalyticsConfig;
use crate::fetch::DatasetLoader;
use crate::output::ReportFile;
use anyhow::Result;
use std::fmt;
use tracing::info;

pub(crate) const PERMIT_COST: &str = "estprojectcost";
pub(crate) const ASSESSED_VALUE: &str = "assessed_value";
pub(crate) const CRIME_COUNT: &str = "crime_count";
pub(crate) const CRIME_CATEGORY: &str = "category";

/// Whole-number report value for a count-like metric.
pub(crate) fn as_count(value: f64) -> u64 {
    finite_or_zero(value).max(0.0).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    PermitHotspots,
    CrimeArbitrage,
    BusinessDeserts,
    ConstructionBoom,
    TransitRadar,
    Gentrification,
    CrossAnalyze,
    CrimeDashboard,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::PermitHotspots,
        Tool::CrimeArbitrage,
        Tool::BusinessDeserts,
        Tool::ConstructionBoom,
        Tool::TransitRadar,
        Tool::Gentrification,
        Tool::CrossAnalyze,
        Tool::CrimeDashboard,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::PermitHotspots => "permit-hotspots",
            Tool::CrimeArbitrage => "crime-arbitrage",
            Tool::BusinessDeserts => "business-deserts",
            Tool::ConstructionBoom => "construction-boom",
            Tool::TransitRadar => "transit-radar",
            Tool::Gentrification => "gentrification",
            Tool::CrossAnalyze => "cross-analyze",
            Tool::CrimeDashboard => "crime-dashboard",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs one tool and returns its rendered reports.
pub async fn run(
    tool: Tool,
    loader: &mut DatasetLoader<'_>,
    config: &AnalyticsConfig,
) -> Result<Vec<ReportFile>> {
    match tool {
        Tool::PermitHotspots => permit_hotspots::run(loader, config).await,
        Tool::CrimeArbitrage => crime_arbitrage::run(loader, config).await,
        Tool::BusinessDeserts => business_deserts::run(loader, config).await,
        Tool::ConstructionBoom => construction_boom::run(loader, config).await,
        Tool::TransitRadar => transit_radar::run(loader, config).await,
        Tool::Gentrification => gentrification::run(loader, config).await,
        Tool::CrossAnalyze => cross_analyze::run(loader, config).await,
        Tool::CrimeDashboard => crime_dashboard::run(loader, config).await,
    }
}

/// Runs `tools` in order against one loader, so each dataset is fetched at
/// most once. The first failing tool ends the run.
pub async fn run_all(
    tools: &[Tool],
    loader: &mut DatasetLoader<'_>,
    config: &AnalyticsConfig,
) -> Result<Vec<ReportFile>> {
    let mut files = Vec::new();
    for &tool in tools {
        let reports = run(tool, loader, config).await?;
        info!(tool = %tool, files = reports.len(), "Tool finished");
        files.extend(reports);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tool_names_are_unique() {
        let names: HashSet<&str> = Tool::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), Tool::ALL.len());
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(2.0), 2);
        assert_eq!(as_count(2.6), 3);
        assert_eq!(as_count(-1.0), 0);
        assert_eq!(as_count(f64::NAN), 0);
    }
}
