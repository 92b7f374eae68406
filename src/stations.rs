//! Calgary CTrain stations used as proximity reference points.

use crate::analyzers::geo::StationPoint;

const STATIONS: &[(&str, f64, f64)] = &[
    // Red Line (South)
    ("Somerset-Bridlewood", 50.9088, -114.0715),
    ("Fish Creek-Lacombe", 50.9253, -114.0702),
    ("Shawnessy", 50.9393, -114.0668),
    ("Anderson", 50.9656, -114.0811),
    ("Chinook", 50.9978, -114.0707),
    ("Heritage", 51.0113, -114.0705),
    ("39 Avenue", 51.0250, -114.0836),
    ("Erlton-Stampede", 51.0336, -114.0603),
    ("Victoria Park-Stampede", 51.0433, -114.0542),
    ("City Hall", 51.0486, -114.0625),
    // Red Line (North)
    ("3 Street SE", 51.0497, -114.0580),
    ("Bridgeland-Memorial", 51.0555, -114.0480),
    ("Lions Park", 51.0652, -114.0503),
    ("SAIT-ACAD-Jubilee", 51.0667, -114.0885),
    ("Sunnyside", 51.0544, -114.0789),
    ("Crescent Heights", 51.0516, -114.0642),
    // Blue Line (West)
    ("69 Street", 51.0396, -114.2062),
    ("Westbrook", 51.0329, -114.1616),
    ("Shaganappi Point", 51.0418, -114.1284),
    ("Sunalta", 51.0445, -114.0995),
    // Blue Line (Northeast)
    ("Whitehorn", 51.0852, -113.9667),
    ("Marlborough", 51.0779, -113.9633),
    ("Franklin", 51.0728, -113.9779),
    ("Barlow-Max Bell", 51.0684, -113.9953),
    ("Zoo", 51.0460, -114.0326),
    // Green Line (planned)
    ("Brentwood", 51.0883, -114.1106),
    ("Dalhousie", 51.1020, -114.1226),
];

/// The fixed station set, in declaration order.
pub fn calgary_stations() -> Vec<StationPoint> {
    STATIONS
        .iter()
        .map(|&(name, lat, lon)| StationPoint::new(name, lat, lon))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_station_names_are_unique() {
        let stations = calgary_stations();
        let names: HashSet<&str> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), stations.len());
        assert_eq!(stations.len(), 27);
    }

    #[test]
    fn test_stations_are_in_calgary() {
        for s in calgary_stations() {
            assert!((50.8..51.3).contains(&s.lat), "{} lat {}", s.name, s.lat);
            assert!((-114.4..-113.8).contains(&s.lon), "{} lon {}", s.name, s.lon);
        }
    }
}
