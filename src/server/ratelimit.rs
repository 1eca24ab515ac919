//! Per-client rate limiting for the public contact form.
//!
//! Each client gets a fixed window with a request quota. Windows are kept in
//! an LRU cache, so memory stays bounded no matter how many distinct clients
//! show up; an evicted client simply starts a fresh window.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lru::LruCache;
use tracing::warn;

use super::handlers::ErrorResponse;

/// Default submissions allowed per window.
pub const DEFAULT_RATE_LIMIT: u32 = 5;

/// Default window length: one hour.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Default number of clients tracked at once.
pub const DEFAULT_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Returned when a client is over quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    /// Time until the client's window resets
    pub retry_after: Duration,
}

impl std::fmt::Display for RateLimited {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Too many submissions. Try again in {} seconds",
            self.retry_after.as_secs().max(1)
        )
    }
}

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let status = StatusCode::TOO_MANY_REQUESTS;
        let message = self.to_string();
        warn!(
            error_type = "rate_limited",
            status = status.as_u16(),
            "Client error: {}",
            message
        );

        let mut response = (
            status,
            Json(ErrorResponse::with_status("rate_limited", message, status)),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&self.retry_after.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Fixed-window request counter keyed by client identity.
pub struct RateLimiter {
    windows: Mutex<LruCache<String, Window>>,
    limit: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW)
    }
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per `window` per client.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_capacity(limit, window, DEFAULT_TRACKED_CLIENTS)
    }

    /// Create a limiter tracking at most `clients` clients.
    pub fn with_capacity(limit: u32, window: Duration, clients: usize) -> Self {
        let capacity = NonZeroUsize::new(clients).unwrap_or(NonZeroUsize::MIN);
        Self {
            windows: Mutex::new(LruCache::new(capacity)),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request from `client` now.
    pub fn check(&self, client: &str) -> Result<(), RateLimited> {
        self.check_at(client, Instant::now())
    }

    /// Count one request from `client` at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), RateLimited> {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entry = windows.get_or_insert_mut(client.to_string(), || Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            return Err(RateLimited {
                retry_after: self.window.saturating_sub(elapsed),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Whether `X-Forwarded-For` names the client.
///
/// Only enable this behind a reverse proxy that overwrites the header;
/// otherwise any caller can pick a fresh identity per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardedPolicy {
    pub trust_forwarded: bool,
}

impl ForwardedPolicy {
    pub const fn trusted() -> Self {
        Self {
            trust_forwarded: true,
        }
    }

    pub const fn untrusted() -> Self {
        Self {
            trust_forwarded: false,
        }
    }
}

/// Client identity for rate limiting.
///
/// With a trusted proxy this is the first `X-Forwarded-For` hop. Otherwise
/// it is the peer address, then `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
    ForwardedPolicy: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let policy = ForwardedPolicy::from_ref(state);

        if policy.trust_forwarded {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());

            if let Some(ip) = forwarded {
                return Ok(ClientId(ip.to_string()));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientId(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}
