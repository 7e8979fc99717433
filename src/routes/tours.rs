// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour routes: CRUD, aliases, aggregates and geo queries.

use axum::{
    extract::{Path, Query, Request, State},
    middleware::{self, Next},
    routing::get,
    Router,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::reviews;
use crate::crud;
use crate::error::{AppError, Result};
use crate::middleware::auth::{require_auth, require_roles};
use crate::models::{Role, Tour};
use crate::query::{Document, FindQuery};
use crate::resource::{parse_model, Resource};
use crate::response::{to_json, Envelope};
use crate::services::geo::{self, Unit};
use crate::services::tour_stats;
use crate::AppState;

const TOUR_EDITORS: &[Role] = &[Role::Admin, Role::LeadGuide];
const TOUR_STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];

/// Query applied by `/top-5-cheap`, overriding the client's.
const TOP_CHEAP: &[(&str, &str)] = &[
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/", get(crud::get_all_handler::<Tour>))
        .route("/{id}", get(crud::get_one_handler::<Tour>))
        .route("/top-5-cheap", get(top_cheap))
        .route("/tourStats", get(get_tour_stats))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(tour_distances));

    let editors = Router::new()
        .route("/", axum::routing::post(crud::create_one_handler::<Tour>))
        .route(
            "/{id}",
            axum::routing::patch(crud::update_one_handler::<Tour>)
                .delete(crud::delete_one_handler::<Tour>),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(TOUR_EDITORS, req, next)
        }));

    let staff = Router::new()
        .route("/busyMonth/{year}", get(get_busy_month))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(TOUR_STAFF, req, next)
        }));

    let protected = Router::new()
        .merge(editors)
        .merge(staff)
        .merge(reviews::nested_routes())
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

async fn top_cheap(
    state: State<Arc<AppState>>,
    Query(mut params): Query<Vec<(String, String)>>,
) -> Result<Envelope> {
    params.extend(TOP_CHEAP.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    crud::get_all_handler::<Tour>(state, Query(params)).await
}

/// Every tour visible to clients, as stored.
async fn visible_tours(state: &AppState) -> Result<Vec<Document>> {
    state
        .db
        .find(Tour::COLLECTION, &FindQuery::filtered(Tour::scope()))
        .await
}

fn parse_tours(docs: &[Document]) -> Result<Vec<Tour>> {
    docs.iter().cloned().map(parse_model::<Tour>).collect()
}

async fn get_tour_stats(State(state): State<Arc<AppState>>) -> Result<Envelope> {
    let tours = parse_tours(&visible_tours(&state).await?)?;
    let stats = tour_stats::tour_stats(&tours);
    Ok(Envelope::success().with_data("stats", to_json(&stats)?))
}

async fn get_busy_month(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<Envelope> {
    let year: i32 = year
        .parse()
        .map_err(|_| AppError::BadRequest("Please provide a valid year.".to_string()))?;

    let tours = parse_tours(&visible_tours(&state).await?)?;
    let plan = tour_stats::busy_month(&tours, year);
    Ok(Envelope::success()
        .with_results(plan.len())
        .with_data("plan", to_json(&plan)?))
}

async fn tours_within(
    State(state): State<Arc<AppState>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<Envelope> {
    let radius: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::BadRequest("Please provide a valid distance.".to_string()))?;
    let center = geo::parse_lat_lng(&latlng)?;
    let unit: Unit = unit.parse()?;

    let docs = visible_tours(&state).await?;
    let ids: HashSet<String> = geo::within(&parse_tours(&docs)?, center, radius, unit)
        .into_iter()
        .collect();
    let matching: Vec<Document> = docs
        .into_iter()
        .filter(|doc| {
            doc.get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| ids.contains(id))
        })
        .collect();

    let tours = crud::render::<Tour>(&state, matching, Tour::POPULATE).await?;
    Ok(Envelope::success().with_list(tours.into_iter().map(Value::Object).collect()))
}

async fn tour_distances(
    State(state): State<Arc<AppState>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Envelope> {
    let center = geo::parse_lat_lng(&latlng)?;
    let unit: Unit = unit.parse()?;

    let tours = parse_tours(&visible_tours(&state).await?)?;
    let distances = geo::distances(&tours, center, unit);
    Ok(Envelope::success().with_data("data", to_json(&distances)?))
}
