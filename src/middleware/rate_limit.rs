// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-client fixed-window rate limiting.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entries are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Counts requests per client key in fixed windows.
pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: DashMap::new(),
        }
    }

    /// Count a request from `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        if self.clients.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }

        let mut entry = self.clients.entry(key.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        entry.hits = entry.hits.saturating_add(1);

        Decision {
            allowed: entry.hits <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.hits),
            reset_after: self.window.saturating_sub(now.duration_since(entry.started)),
        }
    }

    fn sweep(&self, now: Instant) {
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window);
    }
}

/// Client key: the peer address, or with `trust_proxy` the last
/// `X-Forwarded-For` hop, which the proxy appended itself. Earlier hops are
/// client supplied.
fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let appended = request
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|h| h.to_str().ok())
            .last()
            .and_then(|h| h.rsplit(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = appended {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the configured request budget.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request, state.config.trust_proxy);
    let decision = state.rate_limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        let mut response = AppError::TooManyRequests(
            "Too many requests from this IP, please try again in an hour!".to_string(),
        )
        .into_response();
        response.headers_mut().insert(
            "Retry-After",
            HeaderValue::from(decision.reset_after.as_secs().max(1)),
        );
        response
    };

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(decision.remaining),
    );
    response
}
