// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Natours: a tours, users and reviews REST API.
//!
//! This crate provides the backend API for browsing and managing tours,
//! with session authentication, role-based access, reviews and
//! object-storage backed images.

pub mod config;
pub mod crud;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod query;
pub mod resource;
pub mod response;
pub mod routes;
pub mod services;
pub mod storage;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use middleware::RateLimiter;
use services::Mailer;
use std::sync::Arc;
use storage::ObjectStorage;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);
        Self {
            config,
            db,
            storage,
            mailer,
            rate_limiter,
        }
    }
}
