//! Rate limiting for the login and register endpoints.
//!
//! Token buckets keyed by client IP. Requests whose IP cannot be determined
//! all share one bucket.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const UNKNOWN_CLIENT_KEY: &str = "unknown";

/// Default login attempts per minute per IP.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Default registrations per minute per IP.
pub const DEFAULT_REGISTER_PER_MINUTE: u32 = 5;

#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    pub register: Arc<IpLimiter>,
}

fn per_minute(n: u32) -> Quota {
    // A zero rate would reject everything; treat it as the minimum instead
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

impl RateLimitConfig {
    pub fn new(login_per_minute: u32, register_per_minute: u32) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(per_minute(login_per_minute))),
            register: Arc::new(RateLimiter::keyed(per_minute(register_per_minute))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PER_MINUTE, DEFAULT_REGISTER_PER_MINUTE)
    }
}

async fn check(limiter: &IpLimiter, request: Request, next: Next, message: &str) -> Response {
    let key = extract_client_ip(&request).unwrap_or_else(|| UNKNOWN_CLIENT_KEY.to_string());

    match limiter.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            ApiError::TooManyRequests(message.to_string()).into_response()
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.login,
        request,
        next,
        "Too many login attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting registrations.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.register,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}
