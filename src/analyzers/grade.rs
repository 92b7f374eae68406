//! Threshold classification of scores into discrete labels.
//!
//! A [`Classifier`] is an ordered list of guard conditions evaluated top to
//! bottom; the first rule that holds names the label, otherwise the default
//! applies. Rule sets are plain data so they can live in configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `value > bound`
    Above,
    /// `value < bound`
    Below,
    /// `value >= bound`
    AtLeast,
    /// `value <= bound`
    AtMost,
}

impl Comparison {
    fn holds(self, value: f64, bound: f64) -> bool {
        match self {
            Comparison::Above => value > bound,
            Comparison::Below => value < bound,
            Comparison::AtLeast => value >= bound,
            Comparison::AtMost => value <= bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub comparison: Comparison,
    pub bound: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    pub rules: Vec<ThresholdRule>,
    pub default: String,
}

impl Classifier {
    pub fn new(default: &str) -> Self {
        Self {
            rules: Vec::new(),
            default: default.to_string(),
        }
    }

    pub fn rule(mut self, comparison: Comparison, bound: f64, label: &str) -> Self {
        self.rules.push(ThresholdRule {
            comparison,
            bound,
            label: label.to_string(),
        });
        self
    }

    /// Label for `value`. NaN never satisfies a rule and falls to the default.
    pub fn classify(&self, value: f64) -> &str {
        self.rules
            .iter()
            .find(|r| r.comparison.holds(value, r.bound))
            .map_or(self.default.as_str(), |r| r.label.as_str())
    }

    /// | Score  | Signal |
    /// |--------|--------|
    /// | > 0.5  | SELL   |
    /// | < -0.5 | BUY    |
    /// | else   | HOLD   |
    pub fn market_signal() -> Self {
        Classifier::new("HOLD")
            .rule(Comparison::Above, 0.5, "SELL")
            .rule(Comparison::Below, -0.5, "BUY")
    }

    /// | % change | Trend   |
    /// |----------|---------|
    /// | > 50     | BOOM    |
    /// | < -30    | COOLING |
    /// | else     | STABLE  |
    pub fn construction_trend() -> Self {
        Classifier::new("STABLE")
            .rule(Comparison::Above, 50.0, "BOOM")
            .rule(Comparison::Below, -30.0, "COOLING")
    }

    /// Labels 1-based ranks up to and including `max_rank`.
    pub fn rank_tier(max_rank: usize, label: &str) -> Self {
        Classifier::new("-").rule(Comparison::AtMost, max_rank as f64, label)
    }
}
