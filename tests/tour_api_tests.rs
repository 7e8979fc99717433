// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour API tests: query features, CRUD rules, aggregates and geo routes.

use natours::db::DocumentStore;
use natours::models::Role;
use serde_json::{json, Value};

mod common;

fn names(body: &Value) -> Vec<String> {
    body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

async fn seed_catalog(app: &common::TestApp) {
    app.seed_tour("The Forest Hiker", json!({"price": 397, "ratingsAverage": 4.7}))
        .await;
    app.seed_tour(
        "The Sea Explorer",
        json!({"price": 497, "difficulty": "medium", "ratingsAverage": 4.8}),
    )
    .await;
    app.seed_tour(
        "The Snow Adventurer",
        json!({"price": 997, "difficulty": "difficult", "ratingsAverage": 4.5}),
    )
    .await;
    app.seed_tour(
        "The City Wanderer",
        json!({"price": 1197, "ratingsAverage": 4.6}),
    )
    .await;
    app.seed_tour(
        "The Secret Passage",
        json!({"price": 100, "secretTour": true}),
    )
    .await;
}

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let app = common::create_test_app();
    seed_catalog(&app).await;

    let res = app
        .get("/api/v1/tours?price[lt]=1000&sort=-price", None)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "success");
    assert_eq!(res.body["results"], 3);
    assert_eq!(
        names(&res.body),
        vec!["The Snow Adventurer", "The Sea Explorer", "The Forest Hiker"]
    );

    let res = app
        .get("/api/v1/tours?difficulty=easy&sort=price", None)
        .await;
    assert_eq!(names(&res.body), vec!["The Forest Hiker", "The City Wanderer"]);

    // Repeated keys on allowed fields become an "in" filter.
    let res = app
        .get(
            "/api/v1/tours?difficulty=medium&difficulty=difficult&sort=price",
            None,
        )
        .await;
    assert_eq!(names(&res.body), vec!["The Sea Explorer", "The Snow Adventurer"]);

    let res = app.get("/api/v1/tours?price[regex]=1", None).await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_list_paginates_and_projects() {
    let app = common::create_test_app();
    seed_catalog(&app).await;

    let res = app
        .get("/api/v1/tours?sort=price&limit=2&page=2&fields=name,price", None)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(names(&res.body), vec!["The Snow Adventurer", "The City Wanderer"]);
    let first = res.body["data"]["data"][0].as_object().unwrap();
    let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["id", "name", "price"]);

    let res = app.get("/api/v1/tours?sort=price&limit=2&page=5", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["results"], 0);
    assert_eq!(res.body["data"]["data"], json!([]));
}

#[tokio::test]
async fn test_second_page_is_the_next_window_in_sort_order() {
    let app = common::create_test_app();
    // Seeded out of price order so the page comes from the sort, not insertion
    for i in [7, 2, 11, 5, 0, 9, 3, 12, 6, 1, 10, 8, 4] {
        app.seed_tour(
            &format!("The Paginated Tour {:02}", i),
            json!({"price": 100 + i * 10}),
        )
        .await;
    }

    let res = app
        .get("/api/v1/tours?sort=price&limit=5&page=2&fields=name,price", None)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["results"], 5);
    let expected: Vec<String> = (5..10)
        .map(|i| format!("The Paginated Tour {:02}", i))
        .collect();
    assert_eq!(names(&res.body), expected);
    let prices: Vec<i64> = res.body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["price"].as_i64().unwrap())
        .collect();
    assert_eq!(prices, vec![150, 160, 170, 180, 190]);
}

#[tokio::test]
async fn test_secret_tours_are_invisible() {
    let app = common::create_test_app();
    let secret = app
        .seed_tour("The Secret Passage", json!({"secretTour": true}))
        .await;
    let (_, admin) = app
        .login_as("Admin Person", "admin@natours.test", Role::Admin)
        .await;

    let res = app.get("/api/v1/tours", None).await;
    assert_eq!(res.body["results"], 0);

    let res = app.get(&format!("/api/v1/tours/{}", secret), None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["message"], "No document found with that ID");

    let res = app
        .patch(
            &format!("/api/v1/tours/{}", secret),
            Some(&admin),
            json!({"price": 1}),
        )
        .await;
    assert_eq!(res.status, 404);

    let res = app.delete(&format!("/api/v1/tours/{}", secret), Some(&admin)).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_get_one_signs_images_and_adds_virtuals() {
    let app = common::create_test_app();
    let id = app.seed_tour("The Forest Hiker", json!({"duration": 14})).await;

    let res = app.get(&format!("/api/v1/tours/{}", id), None).await;
    assert_eq!(res.status, 200);
    let tour = &res.body["data"]["data"];
    assert_eq!(tour["slug"], "the-forest-hiker");
    assert_eq!(tour["durationWeeks"].as_f64(), Some(2.0));
    assert_eq!(
        tour["imageCover"],
        "https://signed.test/tours/tour-1-cover.jpg?expires=86400"
    );
    assert_eq!(tour["reviews"], json!([]));
    assert!(tour.get("__v").is_none());
}

#[tokio::test]
async fn test_guides_are_populated_without_private_fields() {
    let app = common::create_test_app();
    let guide = app
        .seed_user("Lisa Brown", "lisa@natours.test", Role::Guide)
        .await;
    app.seed_tour("The Forest Hiker", json!({"guides": [guide]}))
        .await;

    let res = app.get("/api/v1/tours", None).await;
    let guides = &res.body["data"]["data"][0]["guides"];
    assert_eq!(guides[0]["name"], "Lisa Brown");
    assert_eq!(guides[0]["role"], "guide");
    assert_eq!(guides[0]["photo"], "default.jpg");
    for field in ["password", "active", "passwordChangedAt", "__v"] {
        assert!(guides[0].get(field).is_none(), "{field} leaked");
    }
}

#[tokio::test]
async fn test_create_requires_editor_role() {
    let app = common::create_test_app();
    let body = common::tour_input("The Park Camper");

    let res = app.post("/api/v1/tours", None, body.clone()).await;
    assert_eq!(res.status, 401);
    assert_eq!(
        res.body["message"],
        "You are not logged in! Please log in to get access."
    );

    let (_, user) = app
        .login_as("Regular User", "user@natours.test", Role::User)
        .await;
    let res = app.post("/api/v1/tours", Some(&user), body.clone()).await;
    assert_eq!(res.status, 403);
    assert_eq!(
        res.body["message"],
        "You do not have permission to perform this action"
    );

    let (_, lead) = app
        .login_as("Lead Guide", "lead@natours.test", Role::LeadGuide)
        .await;
    let res = app.post("/api/v1/tours", Some(&lead), body).await;
    assert_eq!(res.status, 201);
    assert_eq!(res.body["data"]["data"]["slug"], "the-park-camper");
    assert_eq!(res.body["data"]["data"]["ratingsAverage"].as_f64(), Some(4.5));
}

#[tokio::test]
async fn test_create_validation_and_duplicates() {
    let app = common::create_test_app();
    let (_, admin) = app
        .login_as("Admin Person", "admin@natours.test", Role::Admin)
        .await;

    let mut body = common::tour_input("The Park Camper");
    body["priceDiscount"] = json!(500);
    let res = app.post("/api/v1/tours", Some(&admin), body).await;
    assert_eq!(res.status, 400);
    assert!(res.body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid input data."));

    let res = app
        .post("/api/v1/tours", Some(&admin), common::tour_input("The Park Camper"))
        .await;
    assert_eq!(res.status, 201);

    let res = app
        .post("/api/v1/tours", Some(&admin), common::tour_input("The Park Camper"))
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(
        res.body["message"],
        "Duplicate field value: \"The Park Camper\". Please use another value!"
    );
    assert_eq!(app.db.len("tours"), 1);
}

#[tokio::test]
async fn test_update_revalidates_and_recomputes_slug() {
    let app = common::create_test_app();
    let id = app.seed_tour("The Forest Hiker", json!({})).await;
    let (_, admin) = app
        .login_as("Admin Person", "admin@natours.test", Role::Admin)
        .await;
    let uri = format!("/api/v1/tours/{}", id);

    let res = app
        .patch(&uri, Some(&admin), json!({"name": "The Forest Runner", "ratingsAverage": 4.66}))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["data"]["data"]["slug"], "the-forest-runner");
    assert_eq!(res.body["data"]["data"]["ratingsAverage"].as_f64(), Some(4.7));

    let res = app
        .patch(&uri, Some(&admin), json!({"difficulty": "extreme"}))
        .await;
    assert_eq!(res.status, 400);

    let res = app
        .patch("/api/v1/tours/missing", Some(&admin), json!({"price": 1}))
        .await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_delete_removes_stored_images() {
    let app = common::create_test_app();
    let id = app
        .seed_tour(
            "The Forest Hiker",
            json!({"images": ["tours/a.jpg", "https://cdn.test/b.jpg"]}),
        )
        .await;
    let (_, admin) = app
        .login_as("Admin Person", "admin@natours.test", Role::Admin)
        .await;

    let res = app.delete(&format!("/api/v1/tours/{}", id), Some(&admin)).await;
    assert_eq!(res.status, 204);
    assert_eq!(res.body, Value::Null);

    let mut deleted = app.storage.deletes();
    deleted.sort();
    assert_eq!(deleted, vec!["tours/a.jpg", "tours/tour-1-cover.jpg"]);
    assert!(app.db.get("tours", &id).await.unwrap().is_none());

    let res = app.delete(&format!("/api/v1/tours/{}", id), Some(&admin)).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_top_five_cheap_alias() {
    let app = common::create_test_app();
    seed_catalog(&app).await;

    let res = app.get("/api/v1/tours/top-5-cheap", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["results"], 4);
    assert_eq!(
        names(&res.body),
        vec![
            "The Sea Explorer",
            "The Forest Hiker",
            "The City Wanderer",
            "The Snow Adventurer"
        ]
    );
    assert!(res.body["data"]["data"][0].get("imageCover").is_none());
}

#[tokio::test]
async fn test_tour_stats() {
    let app = common::create_test_app();
    seed_catalog(&app).await;
    app.seed_tour("The Low Rated One", json!({"ratingsAverage": 3.0}))
        .await;

    let res = app.get("/api/v1/tours/tourStats", None).await;
    assert_eq!(res.status, 200);
    let stats = res.body["data"]["stats"].as_array().unwrap();
    let order: Vec<&str> = stats
        .iter()
        .map(|s| s["difficulty"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["MEDIUM", "EASY", "DIFFICULT"]);
    assert_eq!(stats[1]["numTours"], 2);
    assert_eq!(stats[1]["minPrice"].as_f64(), Some(397.0));
    assert_eq!(stats[1]["maxPrice"].as_f64(), Some(1197.0));
}

#[tokio::test]
async fn test_busy_month_requires_staff() {
    let app = common::create_test_app();
    seed_catalog(&app).await;

    let (_, user) = app
        .login_as("Regular User", "user@natours.test", Role::User)
        .await;
    let res = app.get("/api/v1/tours/busyMonth/2021", Some(&user)).await;
    assert_eq!(res.status, 403);

    let (_, guide) = app
        .login_as("Guide Person", "guide@natours.test", Role::Guide)
        .await;
    let res = app.get("/api/v1/tours/busyMonth/2021", Some(&guide)).await;
    assert_eq!(res.status, 200);
    let plan = res.body["data"]["plan"].as_array().unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0]["month"], 4);
    assert_eq!(plan[0]["numTourStarts"], 4);

    let res = app.get("/api/v1/tours/busyMonth/abc", Some(&guide)).await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_geo_routes() {
    let app = common::create_test_app();
    app.seed_tour(
        "The Los Angeles Tour",
        json!({"startLocation": {"type": "Point", "coordinates": [-118.2437, 34.0522]}}),
    )
    .await;
    app.seed_tour(
        "The New York City Tour",
        json!({"startLocation": {"type": "Point", "coordinates": [-74.0060, 40.7128]}}),
    )
    .await;

    let res = app
        .get(
            "/api/v1/tours/tours-within/100/center/34.111745,-118.113491/unit/mi",
            None,
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(names(&res.body), vec!["The Los Angeles Tour"]);

    let res = app
        .get("/api/v1/tours/distances/34.111745,-118.113491/unit/km", None)
        .await;
    assert_eq!(res.status, 200);
    let data = res.body["data"]["data"].as_array().unwrap();
    assert_eq!(data[0]["name"], "The Los Angeles Tour");
    assert!(data[0]["distance"].as_f64().unwrap() < 20.0);
    assert!(data[1]["distance"].as_f64().unwrap() > 3000.0);

    let res = app
        .get("/api/v1/tours/distances/34.1/unit/km", None)
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(
        res.body["message"],
        "Please provide latitude and longitude in the format lat,lng."
    );

    let res = app
        .get("/api/v1/tours/distances/34.1,-118.1/unit/ft", None)
        .await;
    assert_eq!(res.status, 400);
}
