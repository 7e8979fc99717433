// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Review model.

use crate::db::collections;
use crate::error::Result;
use crate::query::Document;
use crate::resource::{
    parse_model, to_document, trim, validate_model, Populate, PopulateKind, Resource, WriteKind,
};
use crate::time_utils::millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user's review of a tour. One per (tour, user).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "__v", default)]
    pub version: u32,

    #[validate(
        required(message = "Review can not be empty"),
        length(min = 1, message = "Review can not be empty")
    )]
    pub review: Option<String>,
    #[validate(
        required(message = "A review must have a rating"),
        range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5")
    )]
    pub rating: Option<f64>,
    #[serde(default = "Utc::now", with = "millis")]
    pub created_at: DateTime<Utc>,

    #[validate(required(message = "Review must belong to a tour"))]
    pub tour: Option<String>,
    #[validate(required(message = "Review must belong to a user"))]
    pub user: Option<String>,
}

impl Resource for Review {
    const COLLECTION: &'static str = collections::REVIEWS;
    const UNIQUE_FIELDS: &'static [&'static [&'static str]] = &[&["tour", "user"]];
    const FILE_FIELDS: &'static [&'static str] = &["user.photo"];
    const POPULATE: &'static [Populate] = &[Populate {
        path: "user",
        collection: collections::USERS,
        kind: PopulateKind::Reference,
        select: Some(&["name", "photo"]),
        exclude: &[],
        nested: &[],
    }];

    fn prepare(input: Document, _kind: WriteKind<'_>) -> Result<Document> {
        let mut review: Review = parse_model(input)?;
        trim(&mut review.review);
        validate_model(&review)?;
        to_document(&review)
    }
}
