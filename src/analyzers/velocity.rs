//! Trailing-window velocity over monthly activity series.
//!
//! `recent` is the sum of the last `window` periods, `previous` the sum of
//! the `window` periods before those (0 when the series is shorter than two
//! windows). The percent change divides by `previous + 1`; the `+1` keeps
//! figures comparable with historical reports and must not be changed.

use crate::analyzers::grade::Classifier;
use crate::analyzers::types::{CommunityKey, TimeSeries};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Default trailing window, in periods.
pub const DEFAULT_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub recent: u64,
    pub previous: u64,
    pub delta: i64,
    pub pct_change: f64,
}

/// Velocity of a chronologically ordered series, or `None` when it has
/// fewer than `window` periods.
pub fn velocity(series: &TimeSeries, window: usize) -> Option<Velocity> {
    let counts: Vec<u64> = series.points().iter().map(|(_, c)| *c).collect();
    let n = counts.len();
    if window == 0 || n < window {
        return None;
    }

    let recent: u64 = counts[n - window..].iter().sum();
    let previous: u64 = if n >= 2 * window {
        counts[n - 2 * window..n - window].iter().sum()
    } else {
        0
    };
    let delta = recent as i64 - previous as i64;
    let pct_change = delta as f64 / (previous as f64 + 1.0) * 100.0;

    Some(Velocity {
        recent,
        previous,
        delta,
        pct_change,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct VelocityTrend {
    pub key: CommunityKey,
    pub periods: usize,
    /// Periods in each compared window.
    pub window: usize,
    pub velocity: Velocity,
    pub status: String,
}

/// Computes and classifies velocity for every community series.
#[derive(Debug, Clone)]
pub struct VelocityDetector<'a> {
    pub window: usize,
    pub classifier: &'a Classifier,
}

impl VelocityDetector<'_> {
    /// Series must already be chronological; they are windowed as given.
    /// Communities with fewer than `window` periods are left out.
    pub fn detect(&self, series: &BTreeMap<CommunityKey, TimeSeries>) -> Vec<VelocityTrend> {
        let trends: Vec<VelocityTrend> = series
            .iter()
            .filter_map(|(key, s)| {
                if !s.is_chronological() {
                    warn!(community = %key, "Series is not chronological; windowing as given");
                }
                let v = velocity(s, self.window)?;
                Some(VelocityTrend {
                    key: key.clone(),
                    periods: s.len(),
                    window: self.window,
                    velocity: v,
                    status: self.classifier.classify(v.pct_change).to_string(),
                })
            })
            .collect();

        debug!(
            communities = series.len(),
            trends = trends.len(),
            window = self.window,
            "Detected velocity trends"
        );

        trends
    }
}
