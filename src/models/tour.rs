// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour model.

use crate::db::collections;
use crate::error::Result;
use crate::models::review::Review;
use crate::models::user::PUBLIC_PROFILE_EXCLUDE;
use crate::query::{Document, Filter};
use crate::resource::{
    parse_model, to_document, trim, validate_model, Populate, PopulateKind, Resource, WriteKind,
};
use crate::time_utils::{millis, millis_vec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

/// GeoJSON-style point with a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default = "point")]
    pub kind: String,
    /// `[lng, lat]`
    #[serde(default)]
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Itinerary day, only used in `locations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

fn point() -> String {
    "Point".to_string()
}

impl Location {
    /// `(lng, lat)` when the coordinates are well formed.
    pub fn lng_lat(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lng, lat] if (-180.0..=180.0).contains(lng) && (-90.0..=90.0).contains(lat) => {
                Some((*lng, *lat))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_tour"))]
pub struct Tour {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "__v", default)]
    pub version: u32,

    #[validate(
        required(message = "A tour must have a name"),
        length(
            min = 10,
            max = 40,
            message = "A tour name must have between 10 and 40 characters"
        )
    )]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub secret_tour: bool,

    #[validate(
        required(message = "A tour must have a duration"),
        range(min = 1, message = "Duration must be at least 1 day")
    )]
    pub duration: Option<u32>,
    #[validate(
        required(message = "A tour must have a group size"),
        range(min = 1, message = "Group size must be at least 1")
    )]
    pub max_group_size: Option<u32>,
    #[validate(required(message = "A tour must have a difficulty"))]
    pub difficulty: Option<String>,

    #[serde(default = "default_rating")]
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u32,

    #[validate(
        required(message = "A tour must have a price"),
        range(min = 0.0, message = "Price must not be negative")
    )]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,

    #[validate(required(message = "A tour must have a summary"))]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[validate(required(message = "A tour must have a cover image"))]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default = "Utc::now", with = "millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "millis_vec")]
    pub start_dates: Vec<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Location>,
    #[serde(default)]
    pub locations: Vec<Location>,
    /// User ids
    #[serde(default)]
    pub guides: Vec<String>,
}

fn default_rating() -> f64 {
    4.5
}

fn validate_tour(tour: &Tour) -> std::result::Result<(), ValidationError> {
    if let Some(difficulty) = &tour.difficulty {
        if !DIFFICULTIES.contains(&difficulty.as_str()) {
            return Err(ValidationError::new("difficulty")
                .with_message("Difficulty is either: easy, medium, difficult".into()));
        }
    }
    if let (Some(discount), Some(price)) = (tour.price_discount, tour.price) {
        if discount >= price {
            return Err(ValidationError::new("priceDiscount").with_message(
                format!("Discount price ({discount}) should be below regular price").into(),
            ));
        }
    }
    let locations = tour.start_location.iter().chain(tour.locations.iter());
    for location in locations {
        if location.kind != "Point" || location.lng_lat().is_none() {
            return Err(ValidationError::new("location").with_message(
                "Locations must be points with coordinates [lng, lat]".into(),
            ));
        }
    }
    Ok(())
}

/// Lower-case, dash-separated form of a name.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

impl Tour {
    fn normalize(&mut self) {
        trim(&mut self.name);
        trim(&mut self.summary);
        trim(&mut self.description);
        self.slug = self.name.as_deref().map(slugify).unwrap_or_default();
        self.ratings_average = (self.ratings_average * 10.0).round() / 10.0;
    }
}

impl Resource for Tour {
    const COLLECTION: &'static str = collections::TOURS;
    const UNIQUE_FIELDS: &'static [&'static [&'static str]] = &[&["name"]];
    const FILE_FIELDS: &'static [&'static str] = &[
        "imageCover",
        "images",
        "guides.photo",
        "reviews.user.photo",
    ];
    const POPULATE: &'static [Populate] = &[Populate {
        path: "guides",
        collection: collections::USERS,
        kind: PopulateKind::Reference,
        select: None,
        exclude: PUBLIC_PROFILE_EXCLUDE,
        nested: &[],
    }];
    const POPULATE_ONE: &'static [Populate] = &[Populate {
        path: "reviews",
        collection: collections::REVIEWS,
        kind: PopulateKind::Reverse {
            foreign_field: "tour",
        },
        select: None,
        exclude: &[],
        nested: Review::POPULATE,
    }];
    const MULTI_VALUE_FIELDS: &'static [&'static str] = &[
        "ratingsAverage",
        "ratingsQuantity",
        "duration",
        "maxGroupSize",
        "difficulty",
        "price",
    ];

    fn scope() -> Vec<Filter> {
        vec![Filter::eq("secretTour", false)]
    }

    fn prepare(input: Document, _kind: WriteKind<'_>) -> Result<Document> {
        let mut tour: Tour = parse_model(input)?;
        tour.normalize();
        validate_model(&tour)?;
        to_document(&tour)
    }

    fn present(doc: &mut Document) {
        if let Some(duration) = doc.get("duration").and_then(Value::as_f64) {
            doc.insert("durationWeeks".to_string(), Value::from(duration / 7.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;

    fn input(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn valid() -> Value {
        json!({
            "id": "t1",
            "name": "  The Forest Hiker  ",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": " Breathtaking hike through the Canadian Banff National Park ",
            "imageCover": "tour-1-cover.jpg",
            "ratingsAverage": 4.66,
            "startLocation": {
                "type": "Point",
                "coordinates": [-115.570154, 51.178456],
                "address": "224 Banff Ave, Banff, AB, Canada"
            }
        })
    }

    #[test]
    fn test_prepare_normalizes() {
        let doc = Tour::prepare(input(valid()), WriteKind::Create).unwrap();
        assert_eq!(doc["name"], "The Forest Hiker");
        assert_eq!(doc["slug"], "the-forest-hiker");
        assert_eq!(doc["ratingsAverage"].as_f64(), Some(4.7));
        assert_eq!(doc["ratingsQuantity"], 0);
        assert_eq!(doc["secretTour"], false);
        assert_eq!(doc["summary"], "Breathtaking hike through the Canadian Banff National Park");
        assert!(doc["createdAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(doc["startLocation"]["type"], "Point");
    }

    #[test]
    fn test_prepare_rejects_discount_above_price() {
        let mut v = valid();
        v["priceDiscount"] = json!(397);
        let err = Tour::prepare(input(v), WriteKind::Create).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("below regular price")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_prepare_rejects_missing_and_out_of_range() {
        let mut v = valid();
        v.as_object_mut().unwrap().remove("price");
        v["name"] = json!("Short");
        let err = Tour::prepare(input(v), WriteKind::Create).unwrap_err();
        let AppError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("between 10 and 40"));
        assert!(msg.contains("must have a price"));
    }

    #[test]
    fn test_prepare_rejects_unknown_difficulty_and_bad_point() {
        let mut v = valid();
        v["difficulty"] = json!("extreme");
        assert!(Tour::prepare(input(v), WriteKind::Create).is_err());

        let mut v = valid();
        v["startLocation"]["coordinates"] = json!([200.0, 10.0]);
        assert!(Tour::prepare(input(v), WriteKind::Create).is_err());
    }

    #[test]
    fn test_present_adds_duration_weeks() {
        let mut doc = input(json!({"id": "t1", "duration": 14}));
        Tour::present(&mut doc);
        assert_eq!(doc["durationWeeks"].as_f64(), Some(2.0));

        let mut doc = input(json!({"id": "t1"}));
        Tour::present(&mut doc);
        assert!(!doc.contains_key("durationWeeks"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Sea Explorer"), "the-sea-explorer");
        assert_eq!(slugify("  Wine & Dine, Tour! "), "wine-dine-tour");
    }
}
