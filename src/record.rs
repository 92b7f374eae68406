//! Flat dataset rows as returned by the open data portal.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// A single dataset row: field name to scalar value.
///
/// Nested values (objects, arrays) are carried through untouched but read as
/// absent by the scalar accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style setter, mostly for fixtures.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the field as trimmed text, or `None` when it is missing, null,
    /// blank, or not a scalar.
    pub fn text(&self, field: &str) -> Option<Cow<'_, str>> {
        match self.0.get(field)? {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Cow::Borrowed(trimmed))
                }
            }
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// First field from `fields` that carries usable text.
    pub fn first_text(&self, fields: &[&str]) -> Option<Cow<'_, str>> {
        fields.iter().find_map(|f| self.text(f))
    }

    /// Parses the field as a finite float. Numbers pass through, strings are
    /// parsed after trimming; anything else is `None`.
    pub fn number(&self, field: &str) -> Option<f64> {
        let v = match self.0.get(field)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
