// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Handlers talk to a [`DocumentStore`], which has a Firestore backend for
//! deployments and an in-memory backend for tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemoryStore;

use crate::error::AppError;
use crate::query::{Document, Filter, FindQuery};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const TOURS: &str = "tours";
    pub const USERS: &str = "users";
    pub const REVIEWS: &str = "reviews";
}

/// Minimal document database interface.
///
/// Documents are JSON objects keyed by their `id`. Writes replace the whole
/// document; each single-document operation is atomic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query. Filters, ordering, projection and paging are all applied
    /// by the backend.
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, AppError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    /// Create or replace the document with this id.
    async fn put(&self, collection: &str, id: &str, doc: &Document) -> Result<(), AppError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, AppError>;

    /// First document matching all filters.
    async fn find_one(
        &self,
        collection: &str,
        filters: Vec<Filter>,
    ) -> Result<Option<Document>, AppError> {
        let query = FindQuery::filtered(filters).with_limit(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }
}
