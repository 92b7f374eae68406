//! Great-circle distance and proximity banding around fixed stations.
//!
//! Every record is matched against every station (no spatial index); a
//! per-station bounding box skips the trigonometry for records that cannot
//! fall inside the outermost band.

use crate::analyzers::utility::finite_or_zero;
use crate::errors::BandError;
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters. Any non-finite coordinate yields
/// `f64::INFINITY`, which never falls inside a band.
pub fn distance_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    if ![lon1, lat1, lon2, lat2].iter().all(|v| v.is_finite()) {
        return f64::INFINITY;
    }
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin() * EARTH_RADIUS_M
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Reads a coordinate pair from a record; `None` if either side is
    /// missing, unparseable, or out of range.
    pub fn from_record(record: &Record, lat_field: &str, lon_field: &str) -> Option<Self> {
        let lat = record.number(lat_field)?;
        let lon = record.number(lon_field)?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
            .then_some(Self { lat, lon })
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(self.lon, self.lat, other.lon, other.lat)
    }
}

/// A fixed point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationPoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl StationPoint {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceBand {
    /// Column suffix used in reports, e.g. `500m`.
    pub label: String,
    /// Inclusive upper bound in meters.
    pub radius_m: f64,
    pub weight: f64,
}

impl DistanceBand {
    pub fn new(label: &str, radius_m: f64, weight: f64) -> Self {
        Self {
            label: label.to_string(),
            radius_m,
            weight,
        }
    }
}

/// Non-overlapping rings `[0, r1], (r1, r2], ...` with non-increasing
/// weights.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBands(Vec<DistanceBand>);

impl DistanceBands {
    pub fn new(bands: Vec<DistanceBand>) -> Result<Self, BandError> {
        if bands.is_empty() {
            return Err(BandError::Empty);
        }
        for band in &bands {
            if !(band.radius_m.is_finite() && band.radius_m > 0.0) {
                return Err(BandError::InvalidRadius(band.radius_m));
            }
        }
        for pair in bands.windows(2) {
            if pair[1].radius_m <= pair[0].radius_m {
                return Err(BandError::NotAscending {
                    previous: pair[0].radius_m,
                    next: pair[1].radius_m,
                });
            }
            if pair[1].weight > pair[0].weight {
                return Err(BandError::WeightIncreases {
                    previous: pair[0].weight,
                    next: pair[1].weight,
                });
            }
        }
        Ok(Self(bands))
    }

    pub fn bands(&self) -> &[DistanceBand] {
        &self.0
    }

    /// Index of the innermost band containing `distance`, if any.
    pub fn band_for(&self, distance: f64) -> Option<usize> {
        if distance.is_nan() || distance < 0.0 {
            return None;
        }
        self.0.iter().position(|b| distance <= b.radius_m)
    }

    pub fn outer_radius(&self) -> f64 {
        self.0.last().map_or(0.0, |b| b.radius_m)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandTally {
    pub count: usize,
    pub value: f64,
}

/// Matches for one station, one tally per band in band order.
#[derive(Debug, Clone, PartialEq)]
pub struct StationProximity {
    pub station: StationPoint,
    pub tallies: Vec<BandTally>,
    /// `Σ weight(band) × count(band)`.
    pub score: f64,
}

impl StationProximity {
    pub fn total(&self) -> usize {
        self.tallies.iter().map(|t| t.count).sum()
    }
}

/// Buckets coordinate-bearing records into distance bands around stations.
#[derive(Debug, Clone)]
pub struct ProximityMatcher<'a> {
    pub bands: &'a DistanceBands,
    pub lat_field: &'a str,
    pub lon_field: &'a str,
    pub value_field: &'a str,
}

impl ProximityMatcher<'_> {
    pub fn bucket(&self, records: &[Record], stations: &[StationPoint]) -> Vec<StationProximity> {
        let points: Vec<(Coordinate, f64)> = records
            .iter()
            .filter_map(|r| {
                let coordinate = Coordinate::from_record(r, self.lat_field, self.lon_field)?;
                Some((coordinate, r.number(self.value_field).unwrap_or(0.0)))
            })
            .collect();

        stations
            .iter()
            .map(|station| self.bucket_station(station, &points))
            .collect()
    }

    fn bucket_station(&self, station: &StationPoint, points: &[(Coordinate, f64)]) -> StationProximity {
        let centre = station.coordinate();
        let bounds = BoundingBox::around(&centre, self.bands.outer_radius());
        let mut tallies = vec![BandTally::default(); self.bands.bands().len()];

        for (point, value) in points {
            if !bounds.contains(point) {
                continue;
            }
            if let Some(i) = self.bands.band_for(centre.distance_to(point)) {
                tallies[i].count += 1;
                tallies[i].value += value;
            }
        }

        for tally in &mut tallies {
            tally.value = finite_or_zero(tally.value);
        }

        let score = self
            .bands
            .bands()
            .iter()
            .zip(&tallies)
            .map(|(band, tally)| band.weight * tally.count as f64)
            .sum();

        StationProximity {
            station: station.clone(),
            tallies,
            score,
        }
    }
}

/// Conservative lat/lon box around a circle of `radius_m`. Longitude is
/// compared as a wrapped offset from the centre, so boxes crossing ±180°
/// keep their members.
struct BoundingBox {
    lat: (f64, f64),
    centre_lon: f64,
    dlon: Option<f64>,
}

impl BoundingBox {
    const MARGIN: f64 = 1.001;

    fn around(centre: &Coordinate, radius_m: f64) -> Self {
        let angular = radius_m / EARTH_RADIUS_M * Self::MARGIN;
        let dlat = angular.to_degrees();
        let sin_ratio = angular.sin() / centre.lat.to_radians().cos();
        // Near the poles the circle can wrap every meridian.
        let dlon = (sin_ratio < 1.0).then(|| sin_ratio.asin().to_degrees());
        Self {
            lat: (centre.lat - dlat, centre.lat + dlat),
            centre_lon: centre.lon,
            dlon,
        }
    }

    fn contains(&self, p: &Coordinate) -> bool {
        let in_lat = p.lat >= self.lat.0 && p.lat <= self.lat.1;
        let in_lon = self.dlon.is_none_or(|dlon| {
            let offset = (p.lon - self.centre_lon + 540.0).rem_euclid(360.0) - 180.0;
            offset.abs() <= dlon
        });
        in_lat && in_lon
    }
}
