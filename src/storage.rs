// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Object storage for uploaded images.
//!
//! Documents store bare object keys; responses carry presigned GET URLs
//! instead. Values that are already `https://` URLs and the `default.jpg`
//! placeholder are left alone.

use crate::config::StorageConfig;
use crate::error::AppError;
use crate::query::Document;
use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use futures_util::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Placeholder photo assigned to new users.
pub const DEFAULT_PHOTO: &str = "default.jpg";

const MAX_CONCURRENT_SIGNING: usize = 16;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, expires_in: Duration) -> anyhow::Result<String>;
}

/// S3 (or S3-compatible) bucket.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                &config.access_key_id,
                &config.secret_key,
                None,
                None,
                "static",
            ));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(bucket = %config.bucket, region = %config.region, "Object storage configured");

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

/// Whether a stored file reference is a bare object key.
pub fn is_object_key(reference: &str) -> bool {
    !reference.is_empty() && !reference.starts_with("https://") && reference != DEFAULT_PHOTO
}

/// Every object key found at `path` inside `value`.
///
/// Paths are dotted; arrays along the way are walked element by element, so
/// `guides.photo` reaches the photo of every populated guide.
pub fn object_keys_at(value: &Value, path: &str, out: &mut Vec<String>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match value {
        Value::Array(items) => {
            for item in items {
                object_keys_at(item, path, out);
            }
        }
        Value::Object(map) => match (map.get(head), rest) {
            (Some(child), Some(rest)) => object_keys_at(child, rest, out),
            (Some(Value::String(s)), None) if is_object_key(s) => out.push(s.clone()),
            (Some(Value::Array(items)), None) => out.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| is_object_key(s))
                    .map(str::to_string),
            ),
            _ => {}
        },
        _ => {}
    }
}

fn rewrite_at(value: &mut Value, path: &str, urls: &HashMap<String, String>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match value {
        Value::Array(items) => {
            for item in items {
                rewrite_at(item, path, urls);
            }
        }
        Value::Object(map) => match (map.get_mut(head), rest) {
            (Some(child), Some(rest)) => rewrite_at(child, rest, urls),
            (Some(Value::String(s)), None) => {
                if let Some(url) = urls.get(s.as_str()) {
                    *s = url.clone();
                }
            }
            (Some(Value::Array(items)), None) => {
                for item in items {
                    if let Value::String(s) = item {
                        if let Some(url) = urls.get(s.as_str()) {
                            *s = url.clone();
                        }
                    }
                }
            }
            _ => {}
        },
        _ => {}
    }
}

/// Replace object keys at the given paths with presigned GET URLs.
///
/// Each distinct key is signed once; signing runs with bounded concurrency.
pub async fn sign_file_refs(
    storage: &dyn ObjectStorage,
    docs: &mut [Document],
    paths: &[&str],
    expires_in: Duration,
) -> Result<(), AppError> {
    let mut keys = Vec::new();
    for doc in docs.iter() {
        let value = Value::Object(doc.clone());
        for path in paths {
            object_keys_at(&value, path, &mut keys);
        }
    }
    if keys.is_empty() {
        return Ok(());
    }
    let unique: HashSet<String> = keys.into_iter().collect();

    let urls: HashMap<String, String> = stream::iter(unique)
        .map(|key| async move {
            let url = storage.presign_get(&key, expires_in).await?;
            Ok::<_, anyhow::Error>((key, url))
        })
        .buffer_unordered(MAX_CONCURRENT_SIGNING)
        .try_collect()
        .await?;

    for doc in docs.iter_mut() {
        let mut value = Value::Object(std::mem::take(doc));
        for path in paths {
            rewrite_at(&mut value, path, &urls);
        }
        if let Value::Object(map) = value {
            *doc = map;
        }
    }
    Ok(())
}

/// Object key for a new user photo.
pub fn user_photo_key(user_id: &str, extension: &str) -> String {
    format!(
        "users/user-{}-{}.{}",
        user_id,
        chrono::Utc::now().timestamp_millis(),
        extension
    )
}
