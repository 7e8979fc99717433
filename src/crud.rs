// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generic create/read/update/delete over any [`Resource`].
//!
//! The plain functions do the work and are reused by the auth and profile
//! routes; the `*_handler` wrappers adapt them to axum.

use crate::db::DocumentStore;
use crate::error::{AppError, Result};
use crate::middleware::sanitize::SanitizedJson;
use crate::query::{Document, Filter, FindQuery, QueryFeatures, VERSION_FIELD};
use crate::resource::{Populate, PopulateKind, Resource, WriteKind};
use crate::response::Envelope;
use crate::storage::{object_keys_at, sign_file_refs};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use futures_util::{future::BoxFuture, stream, FutureExt, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

const MAX_CONCURRENT_DB_OPS: usize = 16;

/// New document id.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn in_scope<R: Resource>(doc: &Document) -> bool {
    R::scope().iter().all(|f| f.matches(doc))
}

/// Stored document by id, or NotFound when absent or out of scope.
pub async fn find_stored<R: Resource>(state: &AppState, id: &str) -> Result<Document> {
    match state.db.get(R::COLLECTION, id).await? {
        Some(doc) if in_scope::<R>(&doc) => Ok(doc),
        _ => Err(AppError::not_found_id()),
    }
}

/// Run the query features over the collection and render the results.
pub async fn list<R: Resource>(
    state: &AppState,
    ancestor: Vec<Filter>,
    params: Vec<(String, String)>,
) -> Result<Vec<Document>> {
    let mut query = QueryFeatures::new(FindQuery::new(), params)
        .with_multi_value_fields(R::MULTI_VALUE_FIELDS)
        .filter()?
        .sort()
        .select()
        .paginate()
        .into_query();

    // Hidden fields must not become a lookup oracle.
    query
        .filters
        .retain(|f| !R::HIDDEN_FIELDS.contains(&f.field.as_str()));
    query
        .sort
        .retain(|k| !R::HIDDEN_FIELDS.contains(&k.field.as_str()));
    query.filters.extend(ancestor);
    query.filters.extend(R::scope());

    let docs = state.db.find(R::COLLECTION, &query).await?;
    render::<R>(state, docs, R::POPULATE).await
}

pub async fn get<R: Resource>(state: &AppState, id: &str) -> Result<Document> {
    let doc = find_stored::<R>(state, id).await?;
    let populate: Vec<Populate> = R::POPULATE.iter().chain(R::POPULATE_ONE).copied().collect();
    render_one::<R>(state, doc, &populate).await
}

/// Validate and insert a new document. Returns the stored form.
pub async fn insert<R: Resource>(state: &AppState, mut body: Document) -> Result<Document> {
    body.insert("id".to_string(), Value::String(new_id()));
    body.insert(VERSION_FIELD.to_string(), Value::from(0));

    let doc = R::prepare(body, WriteKind::Create)?;
    check_unique::<R>(state.db.as_ref(), &doc, None).await?;

    let id = document_id(&doc)?;
    state.db.put(R::COLLECTION, &id, &doc).await?;
    tracing::info!(collection = R::COLLECTION, id = %id, "Document created");
    Ok(doc)
}

pub async fn create<R: Resource>(state: &AppState, mut body: Document) -> Result<Document> {
    body.remove("id");
    body.remove(VERSION_FIELD);
    let doc = insert::<R>(state, body).await?;
    render_one::<R>(state, doc, R::POPULATE).await
}

/// Merge `patch` over the stored document, validate and write. Returns the stored form.
pub async fn apply_update<R: Resource>(
    state: &AppState,
    current: Document,
    mut patch: Document,
) -> Result<Document> {
    patch.remove("id");
    patch.remove(VERSION_FIELD);

    let mut merged = current.clone();
    merged.extend(patch);

    let doc = R::prepare(merged, WriteKind::Update { current: &current })?;
    let id = document_id(&current)?;
    check_unique::<R>(state.db.as_ref(), &doc, Some(&id)).await?;

    state.db.put(R::COLLECTION, &id, &doc).await?;
    tracing::info!(collection = R::COLLECTION, id = %id, "Document updated");
    Ok(doc)
}

pub async fn update<R: Resource>(state: &AppState, id: &str, patch: Document) -> Result<Document> {
    let current = find_stored::<R>(state, id).await?;
    let doc = apply_update::<R>(state, current, patch).await?;
    render_one::<R>(state, doc, R::POPULATE).await
}

/// Delete a document and, best effort, the objects it references.
pub async fn delete<R: Resource>(state: &AppState, id: &str) -> Result<()> {
    let current = find_stored::<R>(state, id).await?;

    let mut keys = Vec::new();
    let value = Value::Object(current);
    for path in R::FILE_FIELDS.iter().filter(|p| !p.contains('.')) {
        object_keys_at(&value, path, &mut keys);
    }
    for key in keys {
        if let Err(e) = state.storage.delete_object(&key).await {
            tracing::warn!(error = %e, key = %key, "Failed to delete stored object");
        }
    }

    state.db.delete(R::COLLECTION, id).await?;
    tracing::info!(collection = R::COLLECTION, id = %id, "Document deleted");
    Ok(())
}

fn document_id(doc: &Document) -> Result<String> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("document has no id")))
}

/// Reject a write that would duplicate a unique field group.
async fn check_unique<R: Resource>(
    db: &dyn DocumentStore,
    doc: &Document,
    exclude_id: Option<&str>,
) -> Result<()> {
    for group in R::UNIQUE_FIELDS {
        let values: Option<Vec<&Value>> = group
            .iter()
            .map(|field| doc.get(*field).filter(|v| !v.is_null()))
            .collect();
        let Some(values) = values else {
            continue;
        };

        let filters = group
            .iter()
            .zip(&values)
            .map(|(field, value)| Filter::eq(*field, (*value).clone()))
            .collect();
        let query = FindQuery::filtered(filters).with_limit(2);
        let existing = db.find(R::COLLECTION, &query).await?;

        let conflict = existing
            .iter()
            .any(|other| other.get("id").and_then(Value::as_str) != exclude_id);
        if conflict {
            let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            return Err(AppError::Conflict(shown.join(", ")));
        }
    }
    Ok(())
}

/// Populate, hide, decorate and sign a batch of documents for output.
pub async fn render<R: Resource>(
    state: &AppState,
    mut docs: Vec<Document>,
    populate_specs: &[Populate],
) -> Result<Vec<Document>> {
    populate(state.db.as_ref(), &mut docs, populate_specs).await?;

    for doc in &mut docs {
        doc.remove(VERSION_FIELD);
        for field in R::HIDDEN_FIELDS {
            doc.remove(*field);
        }
        R::present(doc);
    }

    sign_file_refs(
        state.storage.as_ref(),
        &mut docs,
        R::FILE_FIELDS,
        state.config.storage.signed_url_ttl,
    )
    .await?;
    Ok(docs)
}

pub async fn render_one<R: Resource>(
    state: &AppState,
    doc: Document,
    populate_specs: &[Populate],
) -> Result<Document> {
    render::<R>(state, vec![doc], populate_specs)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("render dropped the document")))
}

fn shape(doc: &mut Document, spec: &Populate) {
    if let Some(select) = spec.select {
        doc.retain(|k, _| k == "id" || select.contains(&k.as_str()));
    }
    for field in spec.exclude {
        doc.remove(*field);
    }
    doc.remove(VERSION_FIELD);
}

fn referenced_ids(doc: &Document, path: &str) -> Vec<String> {
    match doc.get(path) {
        Some(Value::String(id)) => vec![id.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Replace references with the documents they point at.
fn populate<'a>(
    db: &'a dyn DocumentStore,
    docs: &'a mut [Document],
    specs: &'a [Populate],
) -> BoxFuture<'a, Result<()>> {
    async move {
        for spec in specs {
            match spec.kind {
                PopulateKind::Reference => populate_reference(db, docs, spec).await?,
                PopulateKind::Reverse { foreign_field } => {
                    populate_reverse(db, docs, spec, foreign_field).await?
                }
            }
        }
        Ok(())
    }
    .boxed()
}

async fn populate_reference(
    db: &dyn DocumentStore,
    docs: &mut [Document],
    spec: &Populate,
) -> Result<()> {
    let ids: HashSet<String> = docs
        .iter()
        .flat_map(|doc| referenced_ids(doc, spec.path))
        .collect();
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<Option<Document>> = stream::iter(ids)
        .map(|id| async move { db.get(spec.collection, &id).await })
        .buffer_unordered(MAX_CONCURRENT_DB_OPS)
        .try_collect()
        .await?;
    let mut joined: Vec<Document> = found.into_iter().flatten().collect();
    for doc in &mut joined {
        shape(doc, spec);
    }
    populate(db, &mut joined, spec.nested).await?;

    let by_id: HashMap<String, Document> = joined
        .into_iter()
        .filter_map(|doc| {
            let id = doc.get("id")?.as_str()?.to_string();
            Some((id, doc))
        })
        .collect();

    for doc in docs.iter_mut() {
        let Some(value) = doc.get_mut(spec.path) else {
            continue;
        };
        let replacement = match &*value {
            Value::String(id) => by_id
                .get(id.as_str())
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|id| by_id.get(id).cloned().map(Value::Object))
                    .collect(),
            ),
            _ => continue,
        };
        *value = replacement;
    }
    Ok(())
}

async fn populate_reverse(
    db: &dyn DocumentStore,
    docs: &mut [Document],
    spec: &Populate,
    foreign_field: &str,
) -> Result<()> {
    for doc in docs.iter_mut() {
        let Some(id) = doc.get("id").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        let query = FindQuery::filtered(vec![Filter::eq(foreign_field, id)]);
        let mut joined = db.find(spec.collection, &query).await?;
        for j in &mut joined {
            shape(j, spec);
        }
        populate(db, &mut joined, spec.nested).await?;
        doc.insert(
            spec.path.to_string(),
            Value::Array(joined.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(())
}

// Axum handlers

pub async fn get_all_handler<R: Resource>(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Envelope> {
    let docs = list::<R>(&state, Vec::new(), params).await?;
    Ok(Envelope::success().with_list(docs.into_iter().map(Value::Object).collect()))
}

pub async fn get_one_handler<R: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Envelope> {
    let doc = get::<R>(&state, &id).await?;
    Ok(Envelope::success().with_data("data", Value::Object(doc)))
}

pub async fn create_one_handler<R: Resource>(
    State(state): State<Arc<AppState>>,
    SanitizedJson(body): SanitizedJson,
) -> Result<(StatusCode, Envelope)> {
    let doc = create::<R>(&state, body).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::success().with_data("data", Value::Object(doc)),
    ))
}

pub async fn update_one_handler<R: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    SanitizedJson(patch): SanitizedJson,
) -> Result<Envelope> {
    let doc = update::<R>(&state, &id, patch).await?;
    Ok(Envelope::success().with_data("data", Value::Object(doc)))
}

pub async fn delete_one_handler<R: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    delete::<R>(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
