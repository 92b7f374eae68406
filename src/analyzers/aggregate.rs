//! Grouped aggregation of records by community key.
//!
//! The aggregator never drops low-count communities; minimum-sample gates
//! belong to the scoring stage so one set of aggregates can feed several
//! formulas with different thresholds.

use crate::analyzers::keys::KeyResolver;
use crate::analyzers::types::{CommunityKey, Period, TimeSeries};
use crate::analyzers::utility::{median, ratio};
use crate::record::Record;
use chrono::{DateTime, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Running totals for one community.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateBucket {
    count: usize,
    sums: HashMap<String, f64>,
    retained: HashMap<String, Vec<f64>>,
}

impl AggregateBucket {
    pub fn count(&self) -> usize {
        self.count
    }

    /// Running sum of `field`; 0.0 if the field was not tracked.
    pub fn sum(&self, field: &str) -> f64 {
        self.sums.get(field).copied().unwrap_or(0.0)
    }

    /// `sum / count`, computed on demand.
    pub fn avg(&self, field: &str) -> f64 {
        ratio(self.sum(field), self.count as f64)
    }

    /// Parsed values retained for `field`, in ingestion order.
    pub fn values(&self, field: &str) -> &[f64] {
        self.retained.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn median(&self, field: &str) -> f64 {
        median(self.values(field))
    }

    /// Largest retained value of `field`; 0.0 when none were retained.
    pub fn max(&self, field: &str) -> f64 {
        self.values(field)
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }
}

/// Counters for records absorbed by fallbacks during one aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: usize,
    /// Records with no resolvable community.
    pub excluded: usize,
    /// Declared numeric fields that were missing or unparseable (summed as 0.0).
    pub numeric_fallbacks: usize,
}

/// Buckets keyed by community, in key order.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    buckets: BTreeMap<CommunityKey, AggregateBucket>,
    stats: IngestStats,
}

impl Aggregates {
    pub fn get(&self, key: &str) -> Option<&AggregateBucket> {
        self.buckets.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CommunityKey, &AggregateBucket)> {
        self.buckets.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CommunityKey> {
        self.buckets.keys()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Get-or-create with a zero-valued bucket.
    fn bucket_mut(&mut self, key: CommunityKey) -> &mut AggregateBucket {
        self.buckets.entry(key).or_default()
    }
}

/// Declares which numeric fields are summed and which are retained per
/// community, then folds records into [`Aggregates`].
#[derive(Debug, Clone)]
pub struct Aggregator<'a> {
    keys: KeyResolver<'a>,
    summed: Vec<&'a str>,
    retained: Vec<&'a str>,
}

impl<'a> Aggregator<'a> {
    pub fn new(keys: KeyResolver<'a>) -> Self {
        Self {
            keys,
            summed: Vec::new(),
            retained: Vec::new(),
        }
    }

    /// Sums `field`, treating missing or non-numeric values as 0.0.
    pub fn sum(mut self, field: &'a str) -> Self {
        self.summed.push(field);
        self
    }

    /// Keeps every parseable value of `field` for order statistics.
    /// Missing or non-numeric values are left out rather than zero-filled.
    pub fn retain(mut self, field: &'a str) -> Self {
        self.retained.push(field);
        self
    }

    pub fn run<'r, I>(&self, records: I) -> Aggregates
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut out = Aggregates::default();

        for record in records {
            out.stats.records += 1;

            let Some(key) = self.keys.key(record) else {
                out.stats.excluded += 1;
                continue;
            };

            let mut fallbacks = 0;
            let bucket = out.bucket_mut(key);
            bucket.count += 1;

            for field in &self.summed {
                let value = record.number(field).unwrap_or_else(|| {
                    fallbacks += 1;
                    0.0
                });
                *bucket.sums.entry((*field).to_string()).or_insert(0.0) += value;
            }

            for field in &self.retained {
                if let Some(value) = record.number(field) {
                    bucket
                        .retained
                        .entry((*field).to_string())
                        .or_default()
                        .push(value);
                }
            }

            out.stats.numeric_fallbacks += fallbacks;
        }

        debug!(
            records = out.stats.records,
            excluded = out.stats.excluded,
            numeric_fallbacks = out.stats.numeric_fallbacks,
            communities = out.len(),
            "Aggregated records"
        );

        out
    }
}

/// Counts records per community and sums each of `numeric_fields`.
pub fn aggregate<'r, I>(records: I, keys: KeyResolver<'_>, numeric_fields: &[&str]) -> Aggregates
where
    I: IntoIterator<Item = &'r Record>,
{
    let aggregator = numeric_fields
        .iter()
        .fold(Aggregator::new(keys), |agg, field| agg.sum(*field));
    aggregator.run(records)
}

/// Per-category summed values, remembering first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTally {
    index: HashMap<String, usize>,
    entries: Vec<(String, f64)>,
    total: f64,
}

impl CategoryTally {
    pub fn add(&mut self, category: &str, value: f64) {
        match self.index.get(category) {
            Some(&i) => self.entries[i].1 += value,
            None => {
                self.index.insert(category.to_string(), self.entries.len());
                self.entries.push((category.to_string(), value));
            }
        }
        self.total += value;
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Categories in first-seen order.
    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    /// The `n` largest categories, ties kept in first-seen order.
    pub fn top(&self, n: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .entries
            .iter()
            .map(|(c, v)| (c.as_str(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

fn category_of(record: &Record, category_field: &str) -> String {
    record
        .text(category_field)
        .map_or_else(|| "Unknown".to_string(), |c| c.into_owned())
}

/// Sums `value_field` per category within each community.
pub fn aggregate_categorical<'r, I>(
    records: I,
    keys: KeyResolver<'_>,
    category_field: &str,
    value_field: &str,
) -> BTreeMap<CommunityKey, CategoryTally>
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut out: BTreeMap<CommunityKey, CategoryTally> = BTreeMap::new();
    for record in records {
        let Some(key) = keys.key(record) else {
            continue;
        };
        let value = record.number(value_field).unwrap_or(0.0);
        out.entry(key)
            .or_default()
            .add(&category_of(record, category_field), value);
    }
    out
}

/// Sums `value_field` per category across all records, keyed or not.
pub fn tally_categories<'r, I>(records: I, category_field: &str, value_field: &str) -> CategoryTally
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut tally = CategoryTally::default();
    for record in records {
        let value = record.number(value_field).unwrap_or(0.0);
        tally.add(&category_of(record, category_field), value);
    }
    tally
}

/// Parses portal timestamps (`2023-05-12T00:00:00.000`, RFC 3339, or a bare
/// `YYYY-MM-DD`) down to the date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

/// Counts records per community per calendar month. The date is taken from
/// the first of `date_fields` present on the record; records without a
/// parseable date are skipped. Series come out in chronological order.
pub fn aggregate_monthly<'r, I>(
    records: I,
    keys: KeyResolver<'_>,
    date_fields: &[&str],
) -> BTreeMap<CommunityKey, TimeSeries>
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut counts: BTreeMap<CommunityKey, BTreeMap<Period, u64>> = BTreeMap::new();
    let mut undated = 0usize;

    for record in records {
        let Some(key) = keys.key(record) else {
            continue;
        };
        let Some(date) = record
            .first_text(date_fields)
            .and_then(|text| parse_date(&text))
        else {
            undated += 1;
            continue;
        };
        *counts
            .entry(key)
            .or_default()
            .entry(Period::of(date))
            .or_insert(0) += 1;
    }

    debug!(undated, communities = counts.len(), "Built monthly series");

    counts
        .into_iter()
        .map(|(key, months)| (key, months.into_iter().collect()))
        .collect()
}
