//! Data types shared by the analytics pipeline.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;

/// Canonical community identifier used as the grouping key across datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityKey(String);

impl CommunityKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CommunityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommunityKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-community sequence of `(period, count)` pairs.
///
/// Holds at most one entry per period. Entries keep insertion order; call
/// [`TimeSeries::sort`] before windowing if they were not added
/// chronologically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<(Period, u64)>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` to `period`, appending a new entry if the period has not
    /// been seen yet.
    pub fn add(&mut self, period: Period, count: u64) {
        match self.points.iter_mut().rev().find(|(p, _)| *p == period) {
            Some((_, existing)) => *existing += count,
            None => self.points.push((period, count)),
        }
    }

    pub fn sort(&mut self) {
        self.points.sort_by_key(|(p, _)| *p);
    }

    pub fn is_chronological(&self) -> bool {
        self.points.windows(2).all(|w| w[0].0 < w[1].0)
    }

    pub fn points(&self) -> &[(Period, u64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<(Period, u64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (Period, u64)>>(iter: I) -> Self {
        let mut series = TimeSeries::new();
        for (period, count) in iter {
            series.add(period, count);
        }
        series
    }
}

/// A community with the metrics it was scored from, its composite score, and
/// any labels attached by classifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntity {
    key: CommunityKey,
    metrics: Vec<(String, f64)>,
    score: f64,
    labels: Vec<(String, String)>,
}

impl ScoredEntity {
    pub(crate) fn new(key: CommunityKey, metrics: Vec<(String, f64)>, score: f64) -> Self {
        Self {
            key,
            metrics,
            score,
            labels: Vec::new(),
        }
    }

    pub fn key(&self) -> &CommunityKey {
        &self.key
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn metrics(&self) -> &[(String, f64)] {
        &self.metrics
    }

    /// Named metric value; 0.0 when the formula did not report it.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0.0, |(_, v)| *v)
    }

    pub fn label(&self, kind: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, l)| l.as_str())
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Returns the entity with `label` attached under `kind`, replacing any
    /// earlier label of the same kind.
    pub fn with_label(mut self, kind: &str, label: &str) -> Self {
        self.labels.retain(|(k, _)| k != kind);
        self.labels.push((kind.to_string(), label.to_string()));
        self
    }
}
