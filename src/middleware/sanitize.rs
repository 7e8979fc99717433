// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON body extractor that scrubs payloads before handlers see them.
//!
//! Keys that start with `$` or contain `.` are dropped so they can never be
//! read as query operators or nested paths, and `<`/`>` in strings are
//! HTML-escaped.

use crate::error::AppError;
use crate::query::Document;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde_json::Value;

/// A JSON object body, sanitized.
#[derive(Debug)]
pub struct SanitizedJson(pub Document);

impl<S> FromRequest<S> for SanitizedJson
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        match sanitize(value) {
            Value::Object(map) => Ok(SanitizedJson(map)),
            _ => Err(AppError::BadRequest(
                "Request body must be a JSON object".to_string(),
            )),
        }
    }
}

pub fn json_rejection(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(rejection.body_text())
    }
}

fn is_forbidden_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

pub fn escape_html(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}

/// Recursively scrub a JSON value.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !is_forbidden_key(k))
                .map(|(k, v)| (k, sanitize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::String(s) if s.contains(['<', '>']) => Value::String(escape_html(&s)),
        other => other,
    }
}
