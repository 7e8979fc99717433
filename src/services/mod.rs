// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod email;
pub mod geo;
pub mod password;
pub mod tokens;
pub mod tour_stats;

pub use email::{Email, HttpMailer, LogMailer, Mailer};
pub use tokens::OneTimeToken;
