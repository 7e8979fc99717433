// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turns request query-string pairs into a [`FindQuery`].
//!
//! ```text
//! ?difficulty=easy&price[lt]=1500&sort=-price,name&fields=name,price&page=2&limit=10
//! ```
//!
//! Each step is independent; callers chain the ones they need:
//!
//! ```ignore
//! let query = QueryFeatures::new(base, params)
//!     .with_multi_value_fields(Tour::MULTI_VALUE_FIELDS)
//!     .filter()?
//!     .sort()
//!     .select()
//!     .paginate()
//!     .into_query();
//! ```

use super::{Comparison, Filter, FindQuery, Projection, SortKey};
use crate::error::{AppError, Result};
use serde_json::Value;

/// Keys that control the query rather than filter documents.
const CONTROL_KEYS: &[&str] = &["page", "sort", "limit", "fields"];

pub const DEFAULT_SORT: &str = "-createdAt";
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 100;

pub struct QueryFeatures {
    query: FindQuery,
    params: Vec<(String, String)>,
    multi_value_fields: &'static [&'static str],
}

impl QueryFeatures {
    pub fn new(query: FindQuery, params: Vec<(String, String)>) -> Self {
        Self {
            query,
            params,
            multi_value_fields: &[],
        }
    }

    /// Fields allowed to repeat in the query string. Repeated values of any
    /// other key collapse to the last one.
    pub fn with_multi_value_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.multi_value_fields = fields;
        self
    }

    /// Last value given for `key`, if any.
    fn last(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn filter(mut self) -> Result<Self> {
        // Group by key, keeping first-seen order.
        let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
        for (key, value) in &self.params {
            if CONTROL_KEYS.contains(&key.as_str()) || key.is_empty() || key.contains('$') {
                continue;
            }
            match grouped.iter_mut().find(|(k, _)| *k == key.as_str()) {
                Some((_, values)) => values.push(value),
                None => grouped.push((key, vec![value])),
            }
        }

        let mut filters = Vec::with_capacity(grouped.len());
        for (key, values) in grouped {
            let (field, op) = parse_key(key)?;
            let filter = if op == Comparison::Eq
                && values.len() > 1
                && self.multi_value_fields.contains(&field)
            {
                let options = values.iter().map(|v| coerce(v)).collect();
                Filter::new(field, Comparison::In, Value::Array(options))
            } else {
                let value = values.last().map(|v| coerce(v)).unwrap_or(Value::Null);
                Filter::new(field, op, value)
            };
            filters.push(filter);
        }

        self.query.filters.extend(filters);
        Ok(self)
    }

    pub fn sort(mut self) -> Self {
        let raw = self.last("sort").unwrap_or(DEFAULT_SORT);
        let mut keys: Vec<SortKey> = raw.split(',').filter_map(SortKey::parse).collect();
        if keys.is_empty() {
            keys = SortKey::parse(DEFAULT_SORT).into_iter().collect();
        }
        self.query.sort = keys;
        self
    }

    pub fn select(mut self) -> Self {
        let Some(raw) = self.last("fields") else {
            return self;
        };
        let fields: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            return self;
        }

        let exclude: Vec<String> = fields
            .iter()
            .filter_map(|f| f.strip_prefix('-'))
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        self.query.projection = if exclude.is_empty() {
            Projection::Include(fields.iter().map(|f| f.to_string()).collect())
        } else {
            Projection::Exclude(exclude)
        };
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = positive_or(self.last("page"), DEFAULT_PAGE);
        let limit = positive_or(self.last("limit"), DEFAULT_LIMIT);
        self.query.skip = (page - 1).saturating_mul(limit);
        self.query.limit = Some(limit);
        self
    }

    pub fn into_query(self) -> FindQuery {
        self.query
    }
}

/// Split `field[op]` into the field path and its comparison.
fn parse_key(key: &str) -> Result<(&str, Comparison)> {
    let Some(open) = key.find('[') else {
        return Ok((key, Comparison::Eq));
    };
    let field = &key[..open];
    let op = key[open + 1..].strip_suffix(']').unwrap_or_default();
    match Comparison::from_operator(op) {
        Some(cmp) if !field.is_empty() => Ok((field, cmp)),
        _ => Err(AppError::BadRequest(format!(
            "Invalid query operator in '{key}'"
        ))),
    }
}

/// Numbers and booleans become typed values; everything else stays a string.
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() && raw.chars().any(|c| c.is_ascii_digit()) {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

fn positive_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
