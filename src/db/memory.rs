// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process [`DocumentStore`] used by tests and `DATABASE_BACKEND=memory`.
//!
//! Queries are evaluated with the same filter and ordering rules the query
//! module defines, so handler behaviour matches the Firestore backend.

use super::DocumentStore;
use crate::error::AppError;
use crate::query::{Document, FindQuery};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryStore {
    collections: DashMap<String, HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, AppError> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect();
        drop(docs);

        matched.sort_by(|a, b| query.compare(a, b));

        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(query.skip as usize)
            .take(limit)
            .map(|mut doc| {
                query.projection.apply(&mut doc);
                doc
            })
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn put(&self, collection: &str, id: &str, doc: &Document) -> Result<(), AppError> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        Ok(self
            .collections
            .get_mut(collection)
            .is_some_and(|mut docs| docs.remove(id).is_some()))
    }
}
