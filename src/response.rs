// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Success response envelope.
//!
//! ```json
//! { "status": "success", "results": 2, "data": { "data": [...] } }
//! ```

use crate::error::{AppError, Result};
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct Envelope {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
}

impl Envelope {
    pub fn success() -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            message: None,
            data: None,
        }
    }

    /// Add `data.<key>`.
    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    /// A list under `data.data` plus its length as `results`.
    pub fn with_list(self, items: Vec<Value>) -> Self {
        self.with_results(items.len())
            .with_data("data", Value::Array(items))
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Serialize a typed payload for [`Envelope::with_data`].
pub fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}
