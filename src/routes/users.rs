// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile and administration routes.

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    routing::{delete, get, patch},
    Extension, Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth;
use crate::crud;
use crate::error::{AppError, Result};
use crate::middleware::auth::{require_auth, require_roles, AuthUser};
use crate::middleware::sanitize::{escape_html, SanitizedJson};
use crate::models::user::PASSWORD_FIELDS;
use crate::models::{Role, User};
use crate::query::Document;
use crate::response::Envelope;
use crate::storage::{is_object_key, user_photo_key};
use crate::AppState;

/// Upper bound for `updateMe` bodies, which may carry a photo.
pub const PHOTO_UPLOAD_LIMIT: usize = 5 * 1024 * 1024;

const ADMIN: &[Role] = &[Role::Admin];

/// Fields a user may change on their own profile.
const PROFILE_FIELDS: &[&str] = &["name", "email"];

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route(
            "/",
            get(crud::get_all_handler::<User>).post(create_user),
        )
        .route(
            "/{id}",
            get(crud::get_one_handler::<User>)
                .patch(update_user)
                .delete(crud::delete_one_handler::<User>),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(ADMIN, req, next)
        }));

    let protected = Router::new()
        .route("/getMe", get(get_me))
        .route(
            "/updateMe",
            patch(update_me).layer(DefaultBodyLimit::max(PHOTO_UPLOAD_LIMIT)),
        )
        .route("/deleteMe", delete(delete_me))
        .merge(auth::protected_routes())
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new().merge(auth::routes()).merge(protected)
}

fn reject_password_fields(body: &Document) -> Result<()> {
    if PASSWORD_FIELDS.iter().any(|f| body.contains_key(*f)) {
        return Err(AppError::BadRequest(
            "This route is not for password updates. Please use /updateMyPassword.".to_string(),
        ));
    }
    Ok(())
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Envelope> {
    let user = crud::get::<User>(&state, auth.id()).await?;
    Ok(Envelope::success().with_data("data", Value::Object(user)))
}

/// An uploaded profile photo.
struct Photo {
    data: Bytes,
    content_type: String,
}

impl Photo {
    fn extension(&self) -> &str {
        match self.content_type.split_once('/') {
            Some((_, "jpeg")) => "jpeg",
            Some((_, subtype)) if !subtype.is_empty() => subtype,
            _ => "jpg",
        }
    }
}

/// Read a multipart profile update: text fields plus an optional `photo`.
async fn read_multipart(mut multipart: Multipart) -> Result<(Document, Option<Photo>)> {
    let bad = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(e.body_text());

    let mut fields = Document::new();
    let mut photo = None;
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "photo" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest(
                    "Not an image! Please upload only images.".to_string(),
                ));
            }
            let data = field.bytes().await.map_err(bad)?;
            if !data.is_empty() {
                photo = Some(Photo { data, content_type });
            }
        } else if !name.starts_with('$') && !name.contains('.') {
            let text = field.text().await.map_err(bad)?;
            fields.insert(name, Value::String(escape_html(&text)));
        }
    }
    Ok((fields, photo))
}

/// Update name, email and photo of the current user.
///
/// Accepts JSON or `multipart/form-data` with an image in the `photo` part.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    request: Request,
) -> Result<Envelope> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (body, photo) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        read_multipart(multipart).await?
    } else {
        let SanitizedJson(body) = SanitizedJson::from_request(request, &state).await?;
        (body, None)
    };
    reject_password_fields(&body)?;

    let mut patch: Document = body
        .into_iter()
        .filter(|(k, _)| PROFILE_FIELDS.contains(&k.as_str()))
        .collect();

    let current = crud::find_stored::<User>(&state, auth.id()).await?;
    let old_photo = current
        .get("photo")
        .and_then(Value::as_str)
        .filter(|p| is_object_key(p))
        .map(str::to_string);

    if let Some(photo) = &photo {
        let key = user_photo_key(auth.id(), photo.extension());
        state
            .storage
            .put_object(&key, photo.data.clone(), &photo.content_type)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Photo upload failed");
                AppError::Upstream(
                    "There was an error uploading the photo. Try again later!".to_string(),
                )
            })?;
        tracing::info!(user_id = %auth.id(), key = %key, "Photo uploaded");
        patch.insert("photo".to_string(), Value::String(key));
    }

    let user = crud::apply_update::<User>(&state, current, patch).await?;

    if let (Some(_), Some(old)) = (&photo, old_photo) {
        if let Err(e) = state.storage.delete_object(&old).await {
            tracing::warn!(error = %e, key = %old, "Failed to delete previous photo");
        }
    }

    let user = crud::render_one::<User>(&state, user, &[]).await?;
    Ok(Envelope::success().with_data("user", Value::Object(user)))
}

/// Deactivate the current account.
async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<StatusCode> {
    let current = crud::find_stored::<User>(&state, auth.id()).await?;
    let mut patch = Document::new();
    patch.insert("active".to_string(), Value::Bool(false));
    crud::apply_update::<User>(&state, current, patch).await?;

    tracing::info!(user_id = %auth.id(), "Account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// Accounts are only created through signup.
async fn create_user() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "status": "error",
            "message": "This route is not defined! Please use /signup instead"
        })),
    )
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    SanitizedJson(patch): SanitizedJson,
) -> Result<Envelope> {
    reject_password_fields(&patch)?;
    let user = crud::update::<User>(&state, &id, patch).await?;
    Ok(Envelope::success().with_data("data", Value::Object(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_extension() {
        let photo = |ct: &str| Photo {
            data: Bytes::new(),
            content_type: ct.to_string(),
        };
        assert_eq!(photo("image/jpeg").extension(), "jpeg");
        assert_eq!(photo("image/png").extension(), "png");
        assert_eq!(photo("image/").extension(), "jpg");
    }

    #[test]
    fn test_reject_password_fields() {
        let body = json!({"name": "x", "passwordConfirm": "y"});
        assert!(reject_password_fields(body.as_object().unwrap()).is_err());
        let body = json!({"name": "x"});
        assert!(reject_password_fields(body.as_object().unwrap()).is_ok());
    }
}
