// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-use tokens for password reset and email verification.
//!
//! The raw token only ever travels in the emailed link. The store keeps its
//! SHA-256 hash and an expiry.

use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// How long an emailed token stays valid.
pub const TOKEN_TTL_MINUTES: i64 = 10;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct OneTimeToken {
    /// Hex string sent to the user.
    pub raw: String,
    /// What gets stored.
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn generate() -> anyhow::Result<Self> {
        let mut bytes = [0u8; TOKEN_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        let raw = hex::encode(bytes);
        Ok(Self {
            hash: hash_token(&raw),
            raw,
            expires_at: Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES),
        })
    }
}

pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
