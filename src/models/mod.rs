// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod review;
pub mod tour;
pub mod user;

pub use review::Review;
pub use tour::{Location, Tour};
pub use user::{Role, User};
