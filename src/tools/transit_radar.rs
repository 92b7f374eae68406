//! Transit development radar: permit activity in distance bands around
//! CTrain stations, scored so that closer development counts for more.

use crate::analyzers::geo::{DistanceBands, ProximityMatcher, StationPoint, StationProximity};
use crate::analyzers::rank::{Order, Ranked, rank_by};
use crate::analyzers::utility::presentable;
use crate::config::{AnalyticsConfig, Dataset};
use crate::errors::BandError;
use crate::fetch::{DatasetLoader, FetchPolicy};
use crate::output::ReportFile;
use crate::record::Record;
use crate::stations::calgary_stations;
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationActivity {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    /// `permits_within_<band>` per band, innermost first.
    #[serde(flatten)]
    pub counts: Map<String, Value>,
    pub total_permits: usize,
    /// `total_value_<band>` per band, innermost first.
    #[serde(flatten)]
    pub values: Map<String, Value>,
    pub tod_score: f64,
    pub tier: String,
}

impl StationActivity {
    fn new(bands: &DistanceBands, p: StationProximity, tier: &str) -> Self {
        let mut counts = Map::new();
        let mut values = Map::new();
        for (band, tally) in bands.bands().iter().zip(&p.tallies) {
            counts.insert(format!("permits_within_{}", band.label), tally.count.into());
            values.insert(
                format!("total_value_{}", band.label),
                presentable(tally.value, 2).into(),
            );
        }
        Self {
            total_permits: p.total(),
            tod_score: presentable(p.score, 2),
            station: p.station.name,
            lat: p.station.lat,
            lon: p.station.lon,
            counts,
            values,
            tier: tier.to_string(),
        }
    }
}

pub fn analyze(
    permits: &[Record],
    stations: &[StationPoint],
    config: &AnalyticsConfig,
) -> Result<Ranked<StationActivity>, BandError> {
    let bands = config.transit.distance_bands()?;
    let matcher = ProximityMatcher {
        bands: &bands,
        lat_field: &config.transit.lat_field,
        lon_field: &config.transit.lon_field,
        value_field: &config.transit.value_field,
    };

    let proximities = matcher.bucket(permits, stations);
    let tiers = &config.classifiers.transit_tier;
    Ok(rank_by(proximities, |p| p.score, Order::Descending)
        .map(|rank, p| StationActivity::new(&bands, p, tiers.classify(rank as f64))))
}

#[tracing::instrument(skip_all)]
pub async fn run(loader: &mut DatasetLoader<'_>, config: &AnalyticsConfig) -> Result<Vec<ReportFile>> {
    let permits = loader.load(Dataset::Permits, FetchPolicy::Abort).await?;

    let stations = calgary_stations();
    let ranked = analyze(&permits, &stations, config)?;
    info!(stations = ranked.len(), "Station activity ranked");

    Ok(vec![
        ReportFile::json("tod_hotspots.json", ranked.all())?,
        ReportFile::csv("tod_analysis.csv", ranked.all())?,
        ReportFile::html(
            "transit_development_map.html",
            "Calgary Transit Development Radar",
            ranked.all(),
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permit(lat: f64, lon: f64, cost: &str) -> Record {
        Record::new()
            .with("latitude", lat.to_string())
            .with("longitude", lon.to_string())
            .with("estprojectcost", cost)
    }

    #[test]
    fn test_bands_and_score() {
        let stations = vec![
            StationPoint::new("City Hall", 51.0486, -114.0625),
            StationPoint::new("Zoo", 51.0460, -114.0326),
        ];
        let permits = vec![
            // At the station
            permit(51.0486, -114.0625, "1000"),
            // ~333 m north
            permit(51.0516, -114.0625, "2000"),
            // ~778 m north
            permit(51.0556, -114.0625, "4000"),
            // Too far from both
            permit(51.0900, -114.0625, "8000"),
            Record::new().with("estprojectcost", "16000"),
        ];

        let ranked = analyze(&permits, &stations, &AnalyticsConfig::default()).unwrap();
        let rows = ranked.all();
        assert_eq!(rows[0].station, "City Hall");
        assert_eq!(rows[0].counts["permits_within_500m"], 2);
        assert_eq!(rows[0].counts["permits_within_1km"], 1);
        assert_eq!(rows[0].values["total_value_500m"], 3000.0);
        assert_eq!(rows[0].values["total_value_1km"], 4000.0);
        assert_eq!(rows[0].total_permits, 3);
        assert_eq!(rows[0].tod_score, 5.0);
        assert_eq!(rows[0].tier, "HIGH_TOD");

        assert_eq!(rows[1].station, "Zoo");
        assert_eq!(rows[1].total_permits, 0);
        assert_eq!(rows[1].tod_score, 0.0);
    }

    #[test]
    fn test_columns_follow_band_order() {
        let stations = vec![StationPoint::new("Chinook", 50.9978, -114.0707)];
        let ranked = analyze(&[], &stations, &AnalyticsConfig::default()).unwrap();
        let json = serde_json::to_string(&ranked.all()[0]).unwrap();
        let order: Vec<usize> = [
            "\"permits_within_500m\"",
            "\"permits_within_1km\"",
            "\"total_permits\"",
            "\"total_value_500m\"",
            "\"total_value_1km\"",
            "\"tod_score\"",
        ]
        .iter()
        .map(|k| json.find(k).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_invalid_bands_are_rejected() {
        let mut config = AnalyticsConfig::default();
        config.transit.bands.reverse();
        assert!(analyze(&[], &[], &config).is_err());
    }
}
