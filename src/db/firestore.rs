// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore backend for [`DocumentStore`].
//!
//! Documents are stored as-is under their `id`. A [`FindQuery`] maps onto a
//! single structured query; Firestore needs composite indexes for range
//! filters combined with ordering on another field.

use super::DocumentStore;
use crate::error::AppError;
use crate::query::{Comparison, Document, FindQuery, Projection};
use async_trait::async_trait;
use firestore::{FirestoreQueryDirection, FirestoreQueryOrder};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator does not check credentials; skip the local credential lookup.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, AppError> {
        let select = match &query.projection {
            Projection::Include(fields) => self
                .client
                .fluent()
                .select()
                .fields(fields.iter().map(String::as_str).chain(["id"])),
            _ => self.client.fluent().select(),
        };
        let mut builder = select.from(collection);

        if !query.filters.is_empty() {
            let filters = query.filters.clone();
            builder = builder.filter(move |q| {
                q.for_all(filters.iter().map(|f| {
                    let field = q.field(f.field.as_str());
                    let value = f.value.clone();
                    match f.op {
                        Comparison::Eq => field.eq(value),
                        Comparison::Gt => field.greater_than(value),
                        Comparison::Gte => field.greater_than_or_equal(value),
                        Comparison::Lt => field.less_than(value),
                        Comparison::Lte => field.less_than_or_equal(value),
                        Comparison::In => field.is_in(value),
                    }
                }))
            });
        }

        if !query.sort.is_empty() {
            builder = builder.order_by(query.sort.iter().map(|key| {
                let direction = if key.descending {
                    FirestoreQueryDirection::Descending
                } else {
                    FirestoreQueryDirection::Ascending
                };
                FirestoreQueryOrder::new(key.field.clone(), direction)
            }));
        }

        if query.skip > 0 {
            builder = builder.offset(query.skip);
        }
        if let Some(limit) = query.limit {
            builder = builder.limit(limit);
        }

        let mut docs: Vec<Document> = builder
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for doc in &mut docs {
            query.projection.apply(doc);
        }
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put(&self, collection: &str, id: &str, doc: &Document) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        if self.get(collection, id).await?.is_none() {
            return Ok(false);
        }

        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(collection, id, "Deleted document");
        Ok(true)
    }
}
