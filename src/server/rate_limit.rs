//! Per-client rate limiting middleware.
//!
//! Fixed one-minute windows counted in a DashMap keyed by client address.
//! Players poll manifests on a steady cadence, so a generous per-minute cap
//! only bites on scripted abuse of the origin.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::state::AppState;
use crate::error::PlaygateError;

#[derive(Clone, Copy, Debug)]
struct Window {
    count: u32,
    started: Instant,
}

/// Per-client fixed-window rate limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::with_window(limit, Duration::from_secs(60))
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            window,
        }
    }

    /// Count a request from `client`; `false` once it is over the limit.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(client.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });

        if entry.started.elapsed() >= self.window {
            *entry = Window {
                count: 0,
                started: now,
            };
        }

        entry.count = entry.count.saturating_add(1);
        entry.count <= self.limit
    }

    /// Forget clients whose window has lapsed.
    pub fn cleanup(&self) {
        let window = self.window;
        self.windows.retain(|_, w| w.started.elapsed() < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Client address from proxy headers, first hop of `X-Forwarded-For` first,
/// then the peer address of the connection.
fn client_key(req: &Request) -> String {
    let headers = req.headers();

    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    if let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return peer.ip().to_string();
    }

    // No proxy headers and no connect info (in-process router calls)
    "unknown".to_string()
}

/// Axum middleware: reject requests over the per-client limit.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        let client = client_key(&req);
        if !limiter.check(&client) {
            warn!("Rate limit exceeded for client: {}", client);
            return PlaygateError::RateLimited.into_response();
        }
    }

    next.run(req).await
}
