// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account authentication routes: signup, login, password and email flows.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::crud;
use crate::db::collections;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, JWT_COOKIE, LOGGED_OUT};
use crate::middleware::sanitize::SanitizedJson;
use crate::models::User;
use crate::query::{Document, Filter};
use crate::response::Envelope;
use crate::services::tokens::hash_token;
use crate::services::{Email, OneTimeToken};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

const RESET_TOKEN: &str = "passwordResetToken";
const RESET_EXPIRES: &str = "passwordResetExpires";
const VERIFY_TOKEN: &str = "emailVerificationToken";
const VERIFY_EXPIRES: &str = "emailVerificationExpires";

/// Routes reachable without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/{token}", patch(reset_password))
        .route("/sendVerificationEmail", post(send_verification_email))
        .route("/verifyEmail/{token}", get(verify_email))
}

/// Routes that need an authenticated user.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/updateMyPassword", patch(update_my_password))
}

/// Whether the client reached us over TLS, directly or via a proxy.
fn is_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// `<scheme>://<host>` the client used.
fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if is_secure(headers) { "https" } else { "http" };
    format!("{}://{}", scheme, host)
}

fn session_cookie(token: String, days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .expires(OffsetDateTime::now_utc() + time::Duration::days(days))
        .build()
}

/// Issue a session token for `user` in both the body and the cookie.
async fn send_token(
    state: &AppState,
    jar: CookieJar,
    headers: &HeaderMap,
    user: Document,
    status: StatusCode,
) -> Result<impl IntoResponse> {
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user document has no id")))?;

    let token = create_jwt(&id, &state.config.jwt_signing_key, state.config.jwt_expires_in)?;
    let cookie = session_cookie(
        token.clone(),
        state.config.jwt_cookie_expires_days,
        is_secure(headers),
    );

    let user = crud::render_one::<User>(state, user, &[]).await?;
    Ok((
        status,
        jar.add(cookie),
        Envelope::success()
            .with_token(token)
            .with_data("user", Value::Object(user)),
    ))
}

fn string_field<'a>(body: &'a Document, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Passwords are compared byte for byte, so surrounding whitespace is kept.
fn secret_field<'a>(body: &'a Document, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Keep only the listed keys of a request body.
fn pick(body: &Document, keys: &[&str]) -> Document {
    keys.iter()
        .filter_map(|k| body.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

async fn find_by_email(state: &AppState, email: &str) -> Result<Option<Document>> {
    state
        .db
        .find_one(
            collections::USERS,
            vec![Filter::eq("email", email.to_lowercase())],
        )
        .await
}

/// Look up a user by a still-valid one-time token.
async fn find_by_token(
    state: &AppState,
    raw: &str,
    token_field: &str,
    expires_field: &str,
) -> Result<Document> {
    let invalid = || AppError::BadRequest("Token is invalid or has expired".to_string());

    let doc = state
        .db
        .find_one(
            collections::USERS,
            vec![Filter::eq(token_field, hash_token(raw))],
        )
        .await?
        .ok_or_else(invalid)?;

    let now = format_utc_rfc3339(chrono::Utc::now());
    let unexpired = doc
        .get(expires_field)
        .and_then(Value::as_str)
        .is_some_and(|expires| expires > now.as_str());
    if !unexpired {
        return Err(invalid());
    }
    Ok(doc)
}

/// Store a fresh one-time token on `user` and email the raw value.
///
/// If the email cannot be sent the token is cleared again.
async fn issue_token(
    state: &AppState,
    mut user: Document,
    token_field: &str,
    expires_field: &str,
    make_email: impl FnOnce(&User, String) -> Email,
    link_base: String,
) -> Result<()> {
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user document has no id")))?;
    let token = OneTimeToken::generate()?;

    user.insert(token_field.to_string(), Value::String(token.hash.clone()));
    user.insert(
        expires_field.to_string(),
        Value::String(format_utc_rfc3339(token.expires_at)),
    );
    state.db.put(collections::USERS, &id, &user).await?;

    let email = make_email(
        &User::from_document(user.clone())?,
        format!("{}/{}", link_base, token.raw),
    );
    if let Err(e) = state.mailer.send(&email).await {
        user.remove(token_field);
        user.remove(expires_field);
        if let Err(rollback) = state.db.put(collections::USERS, &id, &user).await {
            tracing::error!(error = %rollback, user_id = %id, "Failed to clear one-time token");
        }
        return Err(e);
    }

    tracing::info!(user_id = %id, field = token_field, "One-time token issued");
    Ok(())
}

async fn send_verification(state: &AppState, headers: &HeaderMap, user: Document) -> Result<()> {
    issue_token(
        state,
        user,
        VERIFY_TOKEN,
        VERIFY_EXPIRES,
        |u, url| Email::email_verification(u.email(), u.name(), &url),
        format!("{}/api/v1/users/verifyEmail", base_url(headers)),
    )
    .await
}

/// Create an account with the default role.
async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    SanitizedJson(body): SanitizedJson,
) -> Result<impl IntoResponse> {
    let input = pick(&body, &["name", "email", "password", "passwordConfirm"]);
    let user = crud::insert::<User>(&state, input).await?;

    send_verification(&state, &headers, user.clone()).await?;

    send_token(&state, jar, &headers, user, StatusCode::CREATED).await
}

async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    SanitizedJson(body): SanitizedJson,
) -> Result<impl IntoResponse> {
    let (Some(email), Some(password)) = (
        string_field(&body, "email"),
        secret_field(&body, "password"),
    ) else {
        return Err(AppError::BadRequest(
            "Please provide email and password!".to_string(),
        ));
    };

    let incorrect = || AppError::Unauthorized("Incorrect email or password".to_string());
    let doc = find_by_email(&state, email).await?.ok_or_else(incorrect)?;
    let user = User::from_document(doc.clone())?;
    if !user.verify_password(password)? {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(incorrect());
    }

    if !user.active {
        return Err(AppError::Unauthorized(
            "This account has been deactivated.".to_string(),
        ));
    }
    if state.config.require_email_verification && !user.email_verified {
        return Err(AppError::Unauthorized(
            "Please verify your email address before logging in.".to_string(),
        ));
    }

    tracing::info!(user_id = %user.id, "User logged in");
    send_token(&state, jar, &headers, doc, StatusCode::OK).await
}

/// Overwrite the session cookie with a short-lived placeholder.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .path("/")
        .http_only(true)
        .expires(OffsetDateTime::now_utc() + time::Duration::seconds(10))
        .build();
    (jar.add(cookie), Envelope::success())
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    SanitizedJson(body): SanitizedJson,
) -> Result<Envelope> {
    let Some(email) = string_field(&body, "email") else {
        return Err(AppError::BadRequest(
            "Please provide your email address.".to_string(),
        ));
    };
    let Some(user) = find_by_email(&state, email).await? else {
        return Err(AppError::NotFound(
            "There is no user with that email address.".to_string(),
        ));
    };

    issue_token(
        &state,
        user,
        RESET_TOKEN,
        RESET_EXPIRES,
        |u, url| Email::password_reset(u.email(), u.name(), &url),
        format!("{}/api/v1/users/resetPassword", base_url(&headers)),
    )
    .await?;

    Ok(Envelope::success().with_message("Token sent to email!"))
}

/// Patch that sets a new password and clears the given token fields.
fn password_patch(body: &Document, clear: &[&str]) -> Result<Document> {
    if secret_field(body, "password").is_none() {
        return Err(AppError::Validation(
            "Please provide a new password".to_string(),
        ));
    }
    let mut patch = pick(body, &["password", "passwordConfirm"]);
    for field in clear {
        patch.insert(field.to_string(), Value::Null);
    }
    Ok(patch)
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    SanitizedJson(body): SanitizedJson,
) -> Result<impl IntoResponse> {
    let current = find_by_token(&state, &token, RESET_TOKEN, RESET_EXPIRES).await?;
    let patch = password_patch(&body, &[RESET_TOKEN, RESET_EXPIRES])?;

    let user = crud::apply_update::<User>(&state, current, patch).await?;
    tracing::info!(user_id = ?user.get("id"), "Password reset");

    send_token(&state, jar, &headers, user, StatusCode::OK).await
}

async fn send_verification_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    SanitizedJson(body): SanitizedJson,
) -> Result<Envelope> {
    let Some(email) = string_field(&body, "email") else {
        return Err(AppError::BadRequest(
            "Please provide your email address.".to_string(),
        ));
    };
    let Some(user) = find_by_email(&state, email).await? else {
        return Err(AppError::NotFound(
            "There is no user with that email address.".to_string(),
        ));
    };
    if user.get("emailVerified").and_then(Value::as_bool) == Some(true) {
        return Err(AppError::BadRequest(
            "This email address is already verified.".to_string(),
        ));
    }

    send_verification(&state, &headers, user).await?;
    Ok(Envelope::success().with_message("Verification email sent!"))
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let mut user = find_by_token(&state, &token, VERIFY_TOKEN, VERIFY_EXPIRES).await?;

    user.insert("emailVerified".to_string(), Value::Bool(true));
    user.remove(VERIFY_TOKEN);
    user.remove(VERIFY_EXPIRES);
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user document has no id")))?;
    state.db.put(collections::USERS, &id, &user).await?;
    tracing::info!(user_id = %id, "Email verified");

    send_token(&state, jar, &headers, user, StatusCode::OK).await
}

async fn update_my_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    jar: CookieJar,
    SanitizedJson(body): SanitizedJson,
) -> Result<impl IntoResponse> {
    let Some(candidate) = secret_field(&body, "passwordCurrent") else {
        return Err(AppError::BadRequest(
            "Please provide your current password.".to_string(),
        ));
    };
    if !auth.0.verify_password(candidate)? {
        return Err(AppError::Unauthorized(
            "Your current password is wrong.".to_string(),
        ));
    }

    let current = crud::find_stored::<User>(&state, auth.id()).await?;
    let patch = password_patch(&body, &[])?;
    let user = crud::apply_update::<User>(&state, current, patch).await?;
    tracing::info!(user_id = %auth.id(), "Password updated");

    send_token(&state, jar, &headers, user, StatusCode::OK).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), 90, true).to_string();
        assert!(cookie.starts_with("jwt=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Expires="));

        let cookie = session_cookie("abc".to_string(), 90, false).to_string();
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_base_url_follows_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "natours.dev".parse().unwrap());
        assert_eq!(base_url(&headers), "http://natours.dev");
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(base_url(&headers), "https://natours.dev");
    }
}
