// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod auth;
pub mod reviews;
pub mod tours;
pub mod users;

use crate::error::AppError;
use crate::middleware::{error_detail, rate_limit, security};
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::handler::HandlerWithoutStateExt;
use axum::http::{header, HeaderValue, Method, Uri};
use axum::response::IntoResponse;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// JSON and form bodies are capped at this size.
pub const BODY_LIMIT: usize = 10 * 1024;

/// Catch-all for paths no route or static file matches.
async fn route_not_found(uri: Uri) -> impl IntoResponse {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Credentials may not be combined with a wildcard origin.
    if origins.is_empty() {
        cors
    } else {
        cors.allow_credentials(true)
    }
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/api/v1/tours", tours::routes(state.clone()))
        .nest("/api/v1/users", users::routes(state.clone()))
        .nest("/api/v1/reviews", reviews::routes(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ));

    let static_files = ServeDir::new(&state.config.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(route_not_found.into_service());

    let mut router = Router::new()
        .merge(api)
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware::from_fn(security::add_security_headers))
        .layer(cors_layer(&state.config.cors_origins));

    if !state.config.is_production() {
        router = router.layer(middleware::from_fn(error_detail::expose_error_detail));
    }

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
