// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use natours::config::Config;
use natours::crud;
use natours::db::{FirestoreDb, InMemoryStore};
use natours::error::AppError;
use natours::middleware::auth::create_jwt;
use natours::models::{Role, Tour, User};
use natours::query::Document;
use natours::routes::create_router;
use natours::services::{Email, Mailer};
use natours::storage::ObjectStorage;
use natours::AppState;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const PASSWORD: &str = "pass1234";

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Object storage that records calls and signs with a fake host.
#[derive(Default)]
pub struct RecordingStorage {
    pub puts: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
}

impl RecordingStorage {
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        Ok(format!(
            "https://signed.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}

/// Mailer that keeps every message and can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Raw token at the end of the most recent email link.
    pub fn last_token(&self) -> String {
        let sent = self.sent();
        let email = sent.last().expect("no email sent");
        email
            .action_url
            .rsplit('/')
            .next()
            .unwrap()
            .to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Upstream(
                "There was an error sending the email. Try again later!".to_string(),
            ));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryStore>,
    pub storage: Arc<RecordingStorage>,
    pub mailer: Arc<RecordingMailer>,
}

/// Create a test app over the in-memory store with recording fakes.
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

pub fn create_test_app_with(config: Config) -> TestApp {
    let db = Arc::new(InMemoryStore::new());
    let storage = Arc::new(RecordingStorage::default());
    let mailer = Arc::new(RecordingMailer::default());

    let state = Arc::new(AppState::new(
        config,
        db.clone(),
        storage.clone(),
        mailer.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        storage,
        mailer,
    }
}

/// Parsed response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    pub fn token(&self) -> String {
        self.body["token"].as_str().expect("no token in body").to_string()
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Insert a user with [`PASSWORD`] and return its id.
    pub async fn seed_user(&self, name: &str, email: &str, role: Role) -> String {
        let input = json!({
            "name": name,
            "email": email,
            "role": role.as_str(),
            "password": PASSWORD,
            "passwordConfirm": PASSWORD,
        });
        let doc = crud::insert::<User>(&self.state, as_doc(input)).await.unwrap();
        doc["id"].as_str().unwrap().to_string()
    }

    /// Insert a user and return `(id, session token)`.
    pub async fn login_as(&self, name: &str, email: &str, role: Role) -> (String, String) {
        let id = self.seed_user(name, email, role).await;
        let token = self.token_for(&id);
        (id, token)
    }

    pub fn token_for(&self, user_id: &str) -> String {
        create_jwt(
            user_id,
            &self.state.config.jwt_signing_key,
            self.state.config.jwt_expires_in,
        )
        .unwrap()
    }

    /// Insert a tour built from [`tour_input`] plus `overrides`; returns its id.
    pub async fn seed_tour(&self, name: &str, overrides: Value) -> String {
        let mut input = tour_input(name);
        if let (Some(base), Value::Object(extra)) = (input.as_object_mut(), overrides) {
            base.extend(extra);
        }
        let doc = crud::insert::<Tour>(&self.state, as_doc(input)).await.unwrap();
        doc["id"].as_str().unwrap().to_string()
    }
}

pub fn as_doc(value: Value) -> Document {
    value.as_object().cloned().expect("expected a JSON object")
}

/// A valid tour body.
pub fn tour_input(name: &str) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "price": 397,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "imageCover": "tours/tour-1-cover.jpg",
        "images": ["tours/tour-1-1.jpg"],
        "startDates": ["2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z"],
        "startLocation": {
            "type": "Point",
            "coordinates": [-115.570154, 51.178456],
            "address": "224 Banff Ave, Banff, AB, Canada",
            "description": "Banff, CAN"
        }
    })
}
