// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-collection behaviour plugged into the generic handlers in [`crate::crud`].

use crate::error::{AppError, Result};
use crate::query::{Document, Filter};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationErrors};

/// What a write is doing to the stored document.
#[derive(Debug, Clone, Copy)]
pub enum WriteKind<'a> {
    Create,
    /// `current` is the stored document before the patch was merged in.
    Update { current: &'a Document },
}

#[derive(Debug, Clone, Copy)]
pub enum PopulateKind {
    /// The field holds one id or an array of ids in another collection.
    Reference,
    /// Documents in another collection whose `foreign_field` holds this id.
    Reverse { foreign_field: &'static str },
}

/// Join applied when documents are read.
#[derive(Debug, Clone, Copy)]
pub struct Populate {
    /// Output field; for references also the field holding the ids.
    pub path: &'static str,
    pub collection: &'static str,
    pub kind: PopulateKind,
    /// Keep only these fields (plus `id`) of the joined documents.
    pub select: Option<&'static [&'static str]>,
    /// Fields removed from the joined documents.
    pub exclude: &'static [&'static str],
    /// Joins applied to the joined documents themselves.
    pub nested: &'static [Populate],
}

pub trait Resource: Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Groups of fields whose combined values must be unique.
    const UNIQUE_FIELDS: &'static [&'static [&'static str]] = &[];
    /// Stored but never returned.
    const HIDDEN_FIELDS: &'static [&'static str] = &[];
    /// Paths holding object-storage keys, populated paths included.
    const FILE_FIELDS: &'static [&'static str] = &[];
    /// Joins applied on every read.
    const POPULATE: &'static [Populate] = &[];
    /// Extra joins applied when a single document is fetched.
    const POPULATE_ONE: &'static [Populate] = &[];
    /// Filter keys that may repeat in a query string.
    const MULTI_VALUE_FIELDS: &'static [&'static str] = &[];

    /// Filters every read, update and delete is restricted to.
    fn scope() -> Vec<Filter> {
        Vec::new()
    }

    /// Validate and normalize a document before it is written.
    ///
    /// On update `input` is the stored document with the patch merged in.
    fn prepare(input: Document, kind: WriteKind<'_>) -> Result<Document>;

    /// Add computed fields to an outgoing document.
    fn present(_doc: &mut Document) {}
}

/// Deserialize a document into its model type.
pub fn parse_model<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| AppError::Validation(e.to_string()))
}

/// Run the model's declarative validation.
pub fn validate_model<T: Validate>(model: &T) -> Result<()> {
    model
        .validate()
        .map_err(|errors| AppError::Validation(validation_message(&errors)))
}

/// All messages, ordered by field name, joined into one sentence list.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<(String, Vec<String>)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let field = field.to_string();
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("{} is invalid", field),
                })
                .collect();
            (field, messages)
        })
        .collect();
    fields.sort();
    fields
        .into_iter()
        .flat_map(|(_, messages)| messages)
        .collect::<Vec<_>>()
        .join(". ")
}

/// Serialize a model back into a document.
pub fn to_document<T: Serialize>(model: &T) -> Result<Document> {
    match serde_json::to_value(model).map_err(|e| AppError::Internal(e.into()))? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(anyhow::anyhow!(
            "model did not serialize to an object"
        ))),
    }
}

/// Trim a string field in place.
pub fn trim(value: &mut Option<String>) {
    if let Some(s) = value {
        let trimmed = s.trim();
        if trimmed.len() != s.len() {
            *s = trimmed.to_string();
        }
    }
}
