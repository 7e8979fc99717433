// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Development-only layer that exposes the underlying error text.

use crate::error::ErrorDetail;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

/// Error bodies are tiny; anything larger is passed through untouched.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Copy the [`ErrorDetail`] extension into the JSON body as `detail`.
pub async fn expose_error_detail(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read error body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut map)) => {
            map.insert("detail".to_string(), Value::String(detail));
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::from(Value::Object(map).to_string())
        }
        _ => Body::from(bytes),
    };
    Response::from_parts(parts, body)
}
