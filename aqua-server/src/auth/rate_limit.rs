//! Per-IP rate limiting for login and registration routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use shared::error::{AppError, ErrorCode};

use crate::state::AppState;

const STALE_AFTER: Duration = Duration::from_secs(300);

struct IpEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    /// route name -> (IP -> entry)
    inner: Arc<Mutex<HashMap<&'static str, HashMap<String, IpEntry>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` once `ip` exceeded `max_requests` in the current window
    pub async fn check(
        &self,
        route: &'static str,
        ip: &str,
        max_requests: u32,
        window_secs: u64,
    ) -> bool {
        let now = Instant::now();
        let mut routes = self.inner.lock().await;
        let entry = routes
            .entry(route)
            .or_default()
            .entry(ip.to_owned())
            .or_insert_with(|| IpEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= Duration::from_secs(window_secs) {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= max_requests
    }

    /// Drop windows idle for longer than [`STALE_AFTER`]
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut routes = self.inner.lock().await;
        routes.retain(|_, by_ip| {
            by_ip.retain(|_, entry| now.duration_since(entry.window_start) < STALE_AFTER);
            !by_ip.is_empty()
        });
    }
}

/// X-Forwarded-For first (load balancer), then peer address
pub fn client_ip(headers: &http::HeaderMap, peer: Option<std::net::SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn extract_ip(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0);
    client_ip(request.headers(), peer)
}

/// Attempts allowed per IP within a fixed window
#[derive(Debug, Clone, Copy)]
pub struct RateRule {
    pub route: &'static str,
    pub max_requests: u32,
    pub window_secs: u64,
}

pub const LOGIN: RateRule = RateRule {
    route: "login",
    max_requests: 5,
    window_secs: 60,
};

pub const REGISTER: RateRule = RateRule {
    route: "register",
    max_requests: 3,
    window_secs: 60,
};

async fn enforce(
    state: &AppState,
    rule: RateRule,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = extract_ip(&request);
    if !state
        .rate_limiter
        .check(rule.route, &ip, rule.max_requests, rule.window_secs)
        .await
    {
        tracing::warn!(ip = %ip, route = rule.route, "Rate limit exceeded");
        return Err(AppError::new(ErrorCode::TooManyAttempts)
            .with_detail("retry_after_secs", rule.window_secs));
    }
    Ok(next.run(request).await)
}

pub async fn login_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, LOGIN, request, next).await
}

pub async fn register_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, REGISTER, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = http::HeaderMap::new();
        let peer = Some(std::net::SocketAddr::from(([10, 0, 0, 9], 4000)));
        assert_eq!(client_ip(&headers, peer), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");
    }

    #[tokio::test]
    async fn test_window_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.check("register", "10.0.0.1", 3, 60).await);
        }
        assert!(!limiter.check("register", "10.0.0.1", 3, 60).await);
        // other IPs and routes are independent
        assert!(limiter.check("register", "10.0.0.2", 3, 60).await);
        assert!(limiter.check("login", "10.0.0.1", 3, 60).await);
    }

    #[tokio::test]
    async fn test_elapsed_window_resets() {
        let limiter = RateLimiter::new();
        // a zero-length window has always elapsed
        for _ in 0..10 {
            assert!(limiter.check(LOGIN.route, "10.0.0.1", 1, 0).await);
        }
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_windows() {
        let limiter = RateLimiter::new();
        limiter.check(REGISTER.route, "10.0.0.1", 3, 60).await;
        limiter.cleanup().await;
        assert!(!limiter.check(REGISTER.route, "10.0.0.1", 1, 60).await);
    }
}
