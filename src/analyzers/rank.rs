//! Stable ranking with non-destructive top-N views.

use crate::analyzers::grade::Classifier;
use crate::analyzers::types::ScoredEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Smallest first, e.g. most undervalued.
    Ascending,
    /// Largest first, e.g. highest score.
    Descending,
}

/// A fully ranked sequence. Truncation is a view: [`Ranked::top`] borrows a
/// prefix and the full ranking stays available through [`Ranked::all`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    items: Vec<T>,
}

impl<T> Ranked<T> {
    pub fn all(&self) -> &[T] {
        &self.items
    }

    pub fn top(&self, n: usize) -> &[T] {
        &self.items[..n.min(self.items.len())]
    }

    /// Transforms each item with its 1-based rank, keeping the order.
    pub fn map<U>(self, mut f: impl FnMut(usize, T) -> U) -> Ranked<U> {
        Ranked {
            items: self
                .items
                .into_iter()
                .enumerate()
                .map(|(i, item)| f(i + 1, item))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Ranked<ScoredEntity> {
    /// Attaches a label derived from each entity's rank position.
    pub fn label_ranks(self, kind: &str, tiers: &Classifier) -> Self {
        self.map(|rank, e| {
            let label = tiers.classify(rank as f64).to_string();
            e.with_label(kind, &label)
        })
    }
}

/// Stable sort of `items` by `key`. Equal keys keep their input order.
pub fn rank_by<T>(mut items: Vec<T>, key: impl Fn(&T) -> f64, order: Order) -> Ranked<T> {
    items.sort_by(|a, b| {
        let ord = key(a).total_cmp(&key(b));
        match order {
            Order::Ascending => ord,
            Order::Descending => ord.reverse(),
        }
    });
    Ranked { items }
}

/// Ranks scored entities by their composite score.
pub fn rank(entities: Vec<ScoredEntity>, order: Order) -> Ranked<ScoredEntity> {
    rank_by(entities, ScoredEntity::score, order)
}
