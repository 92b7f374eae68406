//! Composite scoring over joined per-community aggregates.
//!
//! A [`ScoreFormula`] declares how inputs are joined, which minimum-sample
//! gates a community must pass, and a weighted linear combination of
//! [`Metric`]s. Every division is zero-safe and nothing is rounded here;
//! rounding happens when report rows are built.

use crate::analyzers::aggregate::{AggregateBucket, Aggregates};
use crate::analyzers::types::{CommunityKey, ScoredEntity};
use crate::analyzers::utility::{finite_or_zero, ratio};
use std::collections::BTreeSet;
use tracing::debug;

/// How community keys from several inputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// Keys present in every input.
    Inner,
    /// Keys of the first input; absent buckets in other inputs read as empty.
    Left,
    /// Keys present in any input.
    Outer,
}

/// One community's buckets across all inputs, in input order.
#[derive(Debug, Clone)]
pub struct JoinedRow<'a> {
    pub key: &'a CommunityKey,
    buckets: Vec<Option<&'a AggregateBucket>>,
}

impl<'a> JoinedRow<'a> {
    fn read(&self, input: usize, f: impl Fn(&AggregateBucket) -> f64) -> f64 {
        self.buckets
            .get(input)
            .copied()
            .flatten()
            .map_or(0.0, f)
    }

    pub fn count(&self, input: usize) -> usize {
        self.buckets
            .get(input)
            .copied()
            .flatten()
            .map_or(0, AggregateBucket::count)
    }

    pub fn total_count(&self) -> usize {
        self.buckets.iter().flatten().map(|b| b.count()).sum()
    }
}

/// A per-community quantity computed from a [`JoinedRow`].
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Count(usize),
    Sum(usize, String),
    Avg(usize, String),
    Median(usize, String),
    Max(usize, String),
    TotalCount,
    Const(f64),
    /// Division that yields 0.0 for a zero denominator.
    Ratio(Box<Metric>, Box<Metric>),
    Product(Box<Metric>, Box<Metric>),
    Add(Box<Metric>, Box<Metric>),
}

impl Metric {
    pub fn count(input: usize) -> Self {
        Metric::Count(input)
    }

    pub fn sum(input: usize, field: &str) -> Self {
        Metric::Sum(input, field.to_string())
    }

    pub fn avg(input: usize, field: &str) -> Self {
        Metric::Avg(input, field.to_string())
    }

    pub fn median(input: usize, field: &str) -> Self {
        Metric::Median(input, field.to_string())
    }

    pub fn max(input: usize, field: &str) -> Self {
        Metric::Max(input, field.to_string())
    }

    pub fn per(self, denominator: Metric) -> Self {
        Metric::Ratio(Box::new(self), Box::new(denominator))
    }

    pub fn times(self, other: Metric) -> Self {
        Metric::Product(Box::new(self), Box::new(other))
    }

    pub fn scaled(self, factor: f64) -> Self {
        self.times(Metric::Const(factor))
    }

    pub fn plus(self, offset: f64) -> Self {
        Metric::Add(Box::new(self), Box::new(Metric::Const(offset)))
    }

    pub fn eval(&self, row: &JoinedRow<'_>) -> f64 {
        match self {
            Metric::Count(i) => row.count(*i) as f64,
            Metric::Sum(i, f) => row.read(*i, |b| b.sum(f)),
            Metric::Avg(i, f) => row.read(*i, |b| b.avg(f)),
            Metric::Median(i, f) => row.read(*i, |b| b.median(f)),
            Metric::Max(i, f) => row.read(*i, |b| b.max(f)),
            Metric::TotalCount => row.total_count() as f64,
            Metric::Const(c) => *c,
            Metric::Ratio(n, d) => ratio(n.eval(row), d.eval(row)),
            Metric::Product(a, b) => a.eval(row) * b.eval(row),
            Metric::Add(a, b) => a.eval(row) + b.eval(row),
        }
    }
}

/// Minimum-sample precondition. A pure function of the joined row, so
/// re-running it always gives the same verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// `count(input) >= min`
    MinCount { input: usize, min: usize },
    /// Counts summed over all inputs `>= min`.
    MinTotalCount(usize),
    /// Metric must be strictly positive.
    Positive(Metric),
    /// `metric >= bound`
    AtLeast(Metric, f64),
}

impl Gate {
    pub fn admits(&self, row: &JoinedRow<'_>) -> bool {
        match self {
            Gate::MinCount { input, min } => row.count(*input) >= *min,
            Gate::MinTotalCount(min) => row.total_count() >= *min,
            Gate::Positive(metric) => metric.eval(row) > 0.0,
            Gate::AtLeast(metric, bound) => metric.eval(row) >= *bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub name: String,
    pub weight: f64,
    pub metric: Metric,
}

/// Declarative score: join mode, gates, weighted terms, and extra metrics
/// carried into each [`ScoredEntity`] for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFormula {
    join: Join,
    gates: Vec<Gate>,
    terms: Vec<Term>,
    reported: Vec<(String, Metric)>,
}

impl ScoreFormula {
    pub fn new(join: Join) -> Self {
        Self {
            join,
            gates: Vec::new(),
            terms: Vec::new(),
            reported: Vec::new(),
        }
    }

    pub fn gate(mut self, gate: Gate) -> Self {
        self.gates.push(gate);
        self
    }

    /// Adds `weight × metric` to the score; the unweighted metric is also
    /// reported under `name`.
    pub fn term(mut self, name: &str, weight: f64, metric: Metric) -> Self {
        self.terms.push(Term {
            name: name.to_string(),
            weight,
            metric,
        });
        self
    }

    /// Carries `metric` into the entity without affecting the score.
    pub fn report(mut self, name: &str, metric: Metric) -> Self {
        self.reported.push((name.to_string(), metric));
        self
    }

    pub fn admits(&self, row: &JoinedRow<'_>) -> bool {
        self.gates.iter().all(|g| g.admits(row))
    }

    /// Joins `inputs`, applies the gates, and scores every surviving
    /// community, in key order.
    pub fn score(&self, inputs: &[&Aggregates]) -> Vec<ScoredEntity> {
        let rows = join(inputs, self.join);
        let candidates = rows.len();

        let scored: Vec<ScoredEntity> = rows
            .iter()
            .filter(|row| self.admits(row))
            .map(|row| self.score_row(row))
            .collect();

        debug!(
            candidates,
            scored = scored.len(),
            gated = candidates - scored.len(),
            "Scored communities"
        );

        scored
    }

    fn score_row(&self, row: &JoinedRow<'_>) -> ScoredEntity {
        let mut metrics: Vec<(String, f64)> = self
            .reported
            .iter()
            .map(|(name, m)| (name.clone(), finite_or_zero(m.eval(row))))
            .collect();

        let mut score = 0.0;
        for term in &self.terms {
            let value = term.metric.eval(row);
            score += term.weight * value;
            metrics.push((term.name.clone(), finite_or_zero(value)));
        }

        ScoredEntity::new(row.key.clone(), metrics, finite_or_zero(score))
    }
}

/// Aligns buckets from `inputs` by community key.
pub fn join<'a>(inputs: &[&'a Aggregates], mode: Join) -> Vec<JoinedRow<'a>> {
    let Some((&first, rest)) = inputs.split_first() else {
        return Vec::new();
    };

    let keys: Vec<&'a CommunityKey> = match mode {
        Join::Inner => first
            .keys()
            .filter(|k| rest.iter().all(|agg| agg.contains(k.as_str())))
            .collect(),
        Join::Left => first.keys().collect(),
        Join::Outer => inputs
            .iter()
            .flat_map(|&agg| agg.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    keys.into_iter()
        .map(|key| JoinedRow {
            key,
            buckets: inputs.iter().map(|&agg| agg.get(key.as_str())).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::aggregate;
    use crate::analyzers::keys::{KeyFields, KeyResolver};
    use crate::record::Record;

    fn permits(rows: &[(&str, &str)]) -> Aggregates {
        let records: Vec<Record> = rows
            .iter()
            .map(|(c, v)| {
                Record::new()
                    .with("communityname", *c)
                    .with("estprojectcost", *v)
            })
            .collect();
        aggregate(
            &records,
            KeyResolver::new(KeyFields::PERMITS),
            &["estprojectcost"],
        )
    }

    fn assessments(rows: &[(&str, &str)]) -> Aggregates {
        let records: Vec<Record> = rows
            .iter()
            .map(|(c, v)| Record::new().with("comm_name", *c).with("assessed_value", *v))
            .collect();
        aggregate(
            &records,
            KeyResolver::new(KeyFields::ASSESSMENTS),
            &["assessed_value"],
        )
    }

    fn density_formula(min_permits: usize) -> ScoreFormula {
        ScoreFormula::new(Join::Inner)
            .gate(Gate::MinCount {
                input: 0,
                min: min_permits,
            })
            .term("permit_density", 100.0, Metric::count(0).per(Metric::count(1)))
            .term(
                "investment_ratio",
                50.0,
                Metric::sum(0, "estprojectcost").per(Metric::sum(1, "assessed_value")),
            )
    }

    #[test]
    fn test_inner_join_drops_one_sided_keys() {
        let p = permits(&[("A", "10"), ("B", "10")]);
        let a = assessments(&[("A", "100"), ("C", "100")]);
        let scored = density_formula(0).score(&[&p, &a]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].key().as_str(), "A");
    }

    #[test]
    fn test_weighted_linear_score() {
        let p = permits(&[("A", "100"), ("A", "100")]);
        let a = assessments(&[("A", "1000"), ("A", "1000"), ("A", "2000"), ("A", "0")]);
        let e = &density_formula(0).score(&[&p, &a])[0];
        // 100 * 2/4 + 50 * 200/4000
        assert!((e.score() - 52.5).abs() < 1e-9);
        assert_eq!(e.metric("permit_density"), 0.5);
        assert_eq!(e.metric("investment_ratio"), 0.05);
    }

    #[test]
    fn test_zero_denominator_is_zero_ratio() {
        let p = permits(&[("A", "100")]);
        let a = assessments(&[("A", "0")]);
        let e = &density_formula(0).score(&[&p, &a])[0];
        assert_eq!(e.metric("investment_ratio"), 0.0);
        assert_eq!(e.score(), 100.0);
    }

    #[test]
    fn test_gate_excludes_and_is_idempotent() {
        let p = permits(&[("A", "1"), ("A", "1"), ("B", "1")]);
        let a = assessments(&[("A", "1"), ("B", "1")]);
        let formula = density_formula(2);
        let rows = join(&[&p, &a], Join::Inner);
        let first: Vec<bool> = rows.iter().map(|r| formula.admits(r)).collect();
        let second: Vec<bool> = rows.iter().map(|r| formula.admits(r)).collect();
        assert_eq!(first, vec![true, false]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_left_and_outer_joins() {
        let p = permits(&[("A", "1"), ("B", "1")]);
        let a = assessments(&[("B", "1"), ("C", "1")]);

        let left: Vec<&str> = join(&[&a, &p], Join::Left)
            .iter()
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(left, vec!["B", "C"]);

        let outer = join(&[&p, &a], Join::Outer);
        let keys: Vec<&str> = outer.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
        assert_eq!(outer[0].count(1), 0);
        assert_eq!(outer[1].total_count(), 2);
    }

    #[test]
    fn test_offset_and_positive_gate() {
        let p = permits(&[("A", "5")]);
        let a = assessments(&[("A", "0"), ("B", "7")]);
        let formula = ScoreFormula::new(Join::Left)
            .gate(Gate::Positive(Metric::max(0, "assessed_value")))
            .term(
                "opportunity",
                1.0,
                Metric::Const(10.0).per(Metric::count(1).plus(1.0)),
            );
        let scored = formula.score(&[&a, &p]);
        assert_eq!(scored.len(), 0, "max() of untracked field is 0");

        let formula = ScoreFormula::new(Join::Left)
            .gate(Gate::Positive(Metric::sum(0, "assessed_value")))
            .term(
                "opportunity",
                1.0,
                Metric::Const(10.0).per(Metric::count(1).plus(1.0)),
            );
        let scored = formula.score(&[&a, &p]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].key().as_str(), "B");
        assert_eq!(scored[0].score(), 10.0);
    }

    #[test]
    fn test_at_least_gate_is_inclusive() {
        let a = assessments(&[("A", "500"), ("B", "499.9")]);
        let formula = ScoreFormula::new(Join::Inner)
            .gate(Gate::AtLeast(Metric::sum(0, "assessed_value"), 500.0))
            .report("value", Metric::sum(0, "assessed_value"));
        let scored = formula.score(&[&a]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].metric("value"), 500.0);
    }
}
