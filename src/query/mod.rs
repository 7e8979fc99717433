// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend-neutral document queries.
//!
//! A [`FindQuery`] is a plain value describing filters, ordering, projection
//! and paging. Store backends translate it into their own query language;
//! the in-memory backend evaluates it with the helpers in this module.

pub mod features;

pub use features::QueryFeatures;

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A stored document: a JSON object with at least an `id` key.
pub type Document = Map<String, Value>;

/// Internal version field, never returned to clients.
pub const VERSION_FIELD: &str = "__v";

/// Comparison operators supported by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value is an array; matches when the field equals any element.
    In,
}

impl Comparison {
    /// Parse the bracket operator of `field[op]=value`.
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(Comparison::Gt),
            "gte" => Some(Comparison::Gte),
            "lt" => Some(Comparison::Lt),
            "lte" => Some(Comparison::Lte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field path; dots address nested objects.
    pub field: String,
    pub op: Comparison,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Comparison::Eq, value)
    }

    /// Evaluate this filter against a document.
    ///
    /// Equality against an array field matches when any element is equal.
    /// Range comparisons only match values of the same kind.
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = lookup(doc, &self.field);
        match self.op {
            Comparison::Eq => actual.is_some_and(|v| equals_or_contains(v, &self.value)),
            Comparison::In => match (&self.value, actual) {
                (Value::Array(options), Some(v)) => {
                    options.iter().any(|o| equals_or_contains(v, o))
                }
                _ => false,
            },
            Comparison::Gt | Comparison::Gte | Comparison::Lt | Comparison::Lte => {
                let Some(ordering) = actual.and_then(|v| compare_same_kind(v, &self.value))
                else {
                    return false;
                };
                match self.op {
                    Comparison::Gt => ordering == Ordering::Greater,
                    Comparison::Gte => ordering != Ordering::Less,
                    Comparison::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
        }
    }
}

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Parse `name` or `-name`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// Which fields a query returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Apply to a document. `id` is always kept and the version field always dropped.
    pub fn apply(&self, doc: &mut Document) {
        match self {
            Projection::All => {}
            Projection::Include(fields) => {
                doc.retain(|k, _| k == "id" || fields.iter().any(|f| f == k));
            }
            Projection::Exclude(fields) => {
                doc.retain(|k, _| k == "id" || !fields.iter().any(|f| f == k));
            }
        }
        doc.remove(VERSION_FIELD);
    }
}

/// A complete collection query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u32,
    pub limit: Option<u32>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filtered(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Compare two documents by the sort keys, ties broken by `id`.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let ord = compare_values(lookup(a, &key.field), lookup(b, &key.field));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        compare_values(a.get("id"), b.get("id"))
    }
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn equals_or_contains(actual: &Value, expected: &Value) -> bool {
    if values_equal(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Cross-type rank used for ordering: missing and null first, then numbers,
/// strings, objects, arrays, booleans.
fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values, used for sorting.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_kind(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_range_filters_on_numbers() {
        let d = doc(json!({"id": "1", "price": 497}));
        assert!(Filter::new("price", Comparison::Gte, 497).matches(&d));
        assert!(!Filter::new("price", Comparison::Gt, 497).matches(&d));
        assert!(Filter::new("price", Comparison::Lt, 500.5).matches(&d));
        assert!(!Filter::new("price", Comparison::Lte, 400).matches(&d));
        // mixed kinds never match a range
        assert!(!Filter::new("price", Comparison::Gt, "100").matches(&d));
    }

    #[test]
    fn test_eq_matches_array_elements() {
        let d = doc(json!({"id": "1", "guides": ["a", "b"]}));
        assert!(Filter::eq("guides", "b").matches(&d));
        assert!(!Filter::eq("guides", "c").matches(&d));
        assert!(!Filter::eq("secretTour", false).matches(&d));
    }

    #[test]
    fn test_in_filter() {
        let d = doc(json!({"id": "1", "difficulty": "easy"}));
        let f = Filter::new("difficulty", Comparison::In, json!(["easy", "medium"]));
        assert!(f.matches(&d));
        let f = Filter::new("difficulty", Comparison::In, json!(["difficult"]));
        assert!(!f.matches(&d));
    }

    #[test]
    fn test_dotted_lookup() {
        let d = doc(json!({"id": "1", "startLocation": {"address": "Miami"}}));
        assert!(Filter::eq("startLocation.address", "Miami").matches(&d));
        assert_eq!(lookup(&d, "startLocation.missing"), None);
    }

    #[test]
    fn test_sort_descending_then_ascending() {
        let q = FindQuery {
            sort: vec![SortKey::parse("-price").unwrap(), SortKey::parse("name").unwrap()],
            ..FindQuery::default()
        };
        let mut docs = vec![
            doc(json!({"id": "1", "price": 10, "name": "b"})),
            doc(json!({"id": "2", "price": 20, "name": "z"})),
            doc(json!({"id": "3", "price": 10, "name": "a"})),
        ];
        docs.sort_by(|a, b| q.compare(a, b));
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }

    #[test]
    fn test_projection_keeps_id_and_drops_version() {
        let mut d = doc(json!({"id": "1", "__v": 0, "name": "x", "price": 3}));
        Projection::Include(vec!["name".into()]).apply(&mut d);
        assert_eq!(Value::Object(d), json!({"id": "1", "name": "x"}));

        let mut d = doc(json!({"id": "1", "__v": 0, "name": "x", "price": 3}));
        Projection::Exclude(vec!["price".into()]).apply(&mut d);
        assert_eq!(Value::Object(d), json!({"id": "1", "name": "x"}));
    }
}
