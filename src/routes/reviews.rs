// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Review routes, top level and nested under a tour.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    routing::{get, post},
    Extension, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::crud;
use crate::error::Result;
use crate::middleware::auth::{require_auth, require_roles, AuthUser};
use crate::middleware::sanitize::SanitizedJson;
use crate::models::{Review, Role, Tour};
use crate::query::{Document, Filter};
use crate::response::Envelope;
use crate::AppState;

const AUTHORS: &[Role] = &[Role::User];
const MODERATORS: &[Role] = &[Role::User, Role::Admin];

fn authors_only<S: Clone + Send + Sync + 'static>(router: Router<S>) -> Router<S> {
    router.route_layer(middleware::from_fn(|req: Request, next: Next| {
        require_roles(AUTHORS, req, next)
    }))
}

/// `/reviews`, all behind authentication.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let read = Router::new()
        .route("/", get(crud::get_all_handler::<Review>))
        .route("/{id}", get(crud::get_one_handler::<Review>));

    let create = authors_only(Router::new().route("/", post(create_review)));

    let modify = Router::new()
        .route(
            "/{id}",
            axum::routing::patch(crud::update_one_handler::<Review>)
                .delete(crud::delete_one_handler::<Review>),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(MODERATORS, req, next)
        }));

    read.merge(create)
        .merge(modify)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// `/tours/{id}/reviews`. The caller adds authentication.
pub fn nested_routes() -> Router<Arc<AppState>> {
    let read = Router::new().route("/{id}/reviews", get(list_tour_reviews));
    let create = authors_only(Router::new().route("/{id}/reviews", post(create_tour_review)));
    read.merge(create)
}

async fn list_tour_reviews(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Envelope> {
    crud::find_stored::<Tour>(&state, &tour_id).await?;
    let reviews =
        crud::list::<Review>(&state, vec![Filter::eq("tour", tour_id)], params).await?;
    Ok(Envelope::success().with_list(reviews.into_iter().map(Value::Object).collect()))
}

/// Create a review authored by the current user.
async fn insert_review(
    state: &AppState,
    auth: &AuthUser,
    tour_id: Option<String>,
    mut body: Document,
) -> Result<(StatusCode, Envelope)> {
    if let Some(tour_id) = tour_id {
        body.insert("tour".to_string(), Value::String(tour_id));
    }
    if let Some(tour_id) = body.get("tour").and_then(Value::as_str) {
        crud::find_stored::<Tour>(state, tour_id).await?;
    }
    body.insert("user".to_string(), Value::String(auth.id().to_string()));

    let review = crud::create::<Review>(state, body).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::success().with_data("data", Value::Object(review)),
    ))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    SanitizedJson(body): SanitizedJson,
) -> Result<(StatusCode, Envelope)> {
    insert_review(&state, &auth, None, body).await
}

async fn create_tour_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(tour_id): Path<String>,
    SanitizedJson(body): SanitizedJson,
) -> Result<(StatusCode, Envelope)> {
    insert_review(&state, &auth, Some(tour_id), body).await
}
