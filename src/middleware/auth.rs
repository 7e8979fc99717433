// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication and role authorization middleware.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Name of the session cookie.
pub const JWT_COOKIE: &str = "jwt";
/// Cookie value left behind by logout.
pub const LOGGED_OUT: &str = "loggedout";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user, loaded fresh from the store for this request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }
}

/// Bearer header first, then the session cookie.
fn extract_token(request: &Request, jar: &CookieJar) -> Option<String> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    jar.get(JWT_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty() && *v != LOGGED_OUT)
        .map(str::to_string)
}

/// Verify a session token and return its claims.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                AppError::Unauthorized("Your token has expired! Please log in again.".to_string())
            }
            _ => AppError::InvalidToken,
        })
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = extract_token(&request, &jar) else {
        return Err(AppError::Unauthorized(
            "You are not logged in! Please log in to get access.".to_string(),
        ));
    };

    let claims = verify_jwt(&token, &state.config.jwt_signing_key).inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected session token");
    })?;

    let Some(doc) = state.db.get(collections::USERS, &claims.sub).await? else {
        return Err(AppError::Unauthorized(
            "The user belonging to this token does no longer exist.".to_string(),
        ));
    };
    let user = User::from_document(doc)?;

    if !user.active {
        return Err(AppError::Unauthorized(
            "This account has been deactivated.".to_string(),
        ));
    }

    if user.changed_password_after(claims.iat as i64) {
        return Err(AppError::Unauthorized(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");
    request.extensions_mut().insert(AuthUser(user));

    Ok(next.run(request).await)
}

/// Allow only the given roles. Must run after [`require_auth`].
pub async fn require_roles(
    roles: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(auth) = request.extensions().get::<AuthUser>() else {
        return Err(AppError::Unauthorized(
            "You are not logged in! Please log in to get access.".to_string(),
        ));
    };

    if !roles.contains(&auth.role()) {
        tracing::debug!(user_id = %auth.id(), role = %auth.role(), "Role not permitted");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, signing_key: &[u8], expires_in: Duration) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + expires_in.as_secs() as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_jwt_key_32_bytes_minimum!!";

    #[test]
    fn test_jwt_round_trip() {
        let token = create_jwt("u1", KEY, Duration::from_secs(3600)).unwrap();
        let claims = verify_jwt(&token, KEY).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_key_is_invalid_token() {
        let token = create_jwt("u1", KEY, Duration::from_secs(3600)).unwrap();
        let err = verify_jwt(&token, b"another_key_that_is_long_enough").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
        assert!(matches!(verify_jwt("garbage", KEY), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let claims = Claims {
            sub: "u1".into(),
            iat: 1_000_000,
            exp: 1_000_060,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(KEY)).unwrap();
        let err = verify_jwt(&token, KEY).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(m) if m.contains("expired")));
    }
}
