//! In-memory sliding-window rate limiting.
//!
//! Requests are keyed by the `x-user-id` header when present, otherwise
//! by the client address. Two windows apply: a per-minute quota and a
//! one-second burst cap. State lives in process memory; restarting the
//! server resets all windows.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kopi_core::config::RateLimitConfig;
use serde_json::json;

const MINUTE: Duration = Duration::from_secs(60);
const SECOND: Duration = Duration::from_secs(1);

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { limit: u32, remaining: u32 },
    Denied { retry_after_secs: u64 },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|pattern| {
            match pattern.strip_suffix("/*") {
                Some(prefix) => path == prefix || path.starts_with(&format!("{prefix}/")),
                None => path == pattern,
            }
        })
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows.entry(key.to_string()).or_default();
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= MINUTE {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() as u32 >= self.config.per_minute {
            let retry_after_secs = window
                .front()
                .map(|front| MINUTE.saturating_sub(now.duration_since(*front)).as_secs().max(1))
                .unwrap_or(1);
            return RateDecision::Denied { retry_after_secs };
        }

        let burst = window
            .iter()
            .rev()
            .take_while(|stamp| now.duration_since(**stamp) < SECOND)
            .count() as u32;
        if burst >= self.config.burst_per_second {
            return RateDecision::Denied {
                retry_after_secs: 1,
            };
        }

        window.push_back(now);
        let remaining = self.config.per_minute - window.len() as u32;
        RateDecision::Allowed {
            limit: self.config.per_minute,
            remaining,
        }
    }
}

fn client_key(request: &Request) -> String {
    if let Some(user) = request
        .headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
    {
        return format!("user:{}", user.trim());
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| format!("addr:{}", info.0.ip()))
        .unwrap_or_else(|| "addr:unknown".to_string())
}

pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.config.enabled || limiter.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&request);
    match limiter.check(&key) {
        RateDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("x-ratelimit-limit", value);
            }
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                headers.insert("x-ratelimit-remaining", value);
            }
            response
        }
        RateDecision::Denied { retry_after_secs } => {
            tracing::warn!(
                event_name = "interface.rate_limit.exceeded",
                key = %key,
                path = request.uri().path(),
                "rate limit exceeded",
            );
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests. Please slow down and retry shortly.",
                })),
            )
                .into_response();
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                headers.insert("retry-after", value);
            }
            if let Ok(value) = HeaderValue::from_str(&limiter.config.per_minute.to_string()) {
                headers.insert("x-ratelimit-limit", value);
            }
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
            response
        }
    }
}
