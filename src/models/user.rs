// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use crate::db::collections;
use crate::error::{AppError, Result};
use crate::query::Document;
use crate::resource::{parse_model, to_document, trim, validate_model, Resource, WriteKind};
use crate::services::password;
use crate::storage::DEFAULT_PHOTO;
use crate::time_utils::{millis_option, millis};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    #[default]
    User,
    Guide,
    LeadGuide,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields stored on a user but never returned.
pub const HIDDEN_FIELDS: &[&str] = &[
    "password",
    "passwordConfirm",
    "active",
    "passwordResetToken",
    "passwordResetExpires",
    "emailVerificationToken",
    "emailVerificationExpires",
];

/// Fields removed when a user is embedded in another document.
pub const PUBLIC_PROFILE_EXCLUDE: &[&str] = &[
    "password",
    "passwordConfirm",
    "active",
    "passwordResetToken",
    "passwordResetExpires",
    "emailVerificationToken",
    "emailVerificationExpires",
    "passwordChangedAt",
];

/// Fields a password write may not come with through the profile routes.
pub const PASSWORD_FIELDS: &[&str] = &["password", "passwordConfirm"];

/// User account stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "__v", default)]
    pub version: u32,

    #[validate(
        required(message = "A user must have a name"),
        length(
            min = 5,
            max = 40,
            message = "A user name must have between 5 and 40 characters"
        )
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "A user must have an email"),
        email(message = "Please provide a valid email")
    )]
    pub email: Option<String>,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default)]
    pub role: Role,

    /// Argon2 hash once stored; plaintext only while a write is prepared.
    #[validate(
        required(message = "A user must have a password"),
        length(min = 8, message = "Password must have at least 8 characters")
    )]
    pub password: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_confirm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "millis_option")]
    pub password_changed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "millis_option")]
    pub password_reset_expires: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verification_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "millis_option")]
    pub email_verification_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_verified: bool,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "Utc::now", with = "millis")]
    pub created_at: DateTime<Utc>,
}

fn default_photo() -> String {
    DEFAULT_PHOTO.to_string()
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn from_document(doc: Document) -> Result<Self> {
        parse_model(doc)
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    /// Check a candidate password against the stored hash.
    pub fn verify_password(&self, candidate: &str) -> Result<bool> {
        match &self.password {
            Some(hash) => Ok(password::verify_password(candidate, hash)?),
            None => Ok(false),
        }
    }

    /// True when the password changed after a token issued at `iat` (seconds).
    pub fn changed_password_after(&self, iat: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| iat < changed.timestamp())
    }

    fn normalize(&mut self) {
        trim(&mut self.name);
        trim(&mut self.email);
        if let Some(email) = &mut self.email {
            *email = email.to_lowercase();
        }
    }
}

impl Resource for User {
    const COLLECTION: &'static str = collections::USERS;
    const UNIQUE_FIELDS: &'static [&'static [&'static str]] = &[&["name"], &["email"]];
    const HIDDEN_FIELDS: &'static [&'static str] = HIDDEN_FIELDS;
    const FILE_FIELDS: &'static [&'static str] = &["photo"];

    fn prepare(input: Document, kind: WriteKind<'_>) -> Result<Document> {
        let mut user: User = parse_model(input)?;
        user.normalize();
        validate_model(&user)?;

        let password_changed = match kind {
            WriteKind::Create => true,
            WriteKind::Update { current } => {
                current.get("password").and_then(Value::as_str) != user.password.as_deref()
            }
        };

        if password_changed {
            match user.password_confirm.as_deref() {
                None => {
                    return Err(AppError::Validation(
                        "Please confirm your password".to_string(),
                    ))
                }
                Some(confirm) if Some(confirm) != user.password.as_deref() => {
                    return Err(AppError::Validation(
                        "Passwords are not the same!".to_string(),
                    ))
                }
                Some(_) => {}
            }
            let plain = user.password.as_deref().unwrap_or_default();
            user.password = Some(password::hash_password(plain)?);
            if matches!(kind, WriteKind::Update { .. }) {
                // Tokens issued in the same second stay valid.
                user.password_changed_at = Some(Utc::now() - Duration::seconds(1));
            }
        }
        user.password_confirm = None;

        to_document(&user)
    }
}
