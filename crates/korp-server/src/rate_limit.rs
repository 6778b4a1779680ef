use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::warn;

const LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Per-client token bucket, shared across requests via the middleware state.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, Bucket>>,
    dropped_since_log: Arc<AtomicU64>,
    last_log: Arc<Mutex<Instant>>,
    rate_per_sec: f64,
    burst: f64,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            dropped_since_log: Arc::new(AtomicU64::new(0)),
            last_log: Arc::new(Mutex::new(Instant::now())),
            rate_per_sec: rate_per_sec as f64,
            burst: burst as f64,
        }
    }

    fn check_and_consume(&self, client: &str) -> bool {
        let mut entry = self.buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last_refill: Instant::now(),
        });
        let now = Instant::now();
        let elapsed = now
            .saturating_duration_since(entry.last_refill)
            .as_secs_f64();
        if elapsed > 0.0 {
            entry.tokens = (entry.tokens + elapsed * self.rate_per_sec).min(self.burst);
            entry.last_refill = now;
        }
        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn log_drops_if_needed(&self) {
        let now = Instant::now();
        let mut last = self
            .last_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if now.saturating_duration_since(*last) >= LOG_INTERVAL {
            let dropped = self.dropped_since_log.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                warn!("rate limiter dropped {dropped} requests in the last minute");
            }
            *last = now;
        }
    }
}

/// Axum middleware entry point; install with
/// `middleware::from_fn_with_state(limiter, rate_limit::enforce)`.
pub async fn enforce(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(client) = client_id(&request)
        && !limiter.check_and_consume(&client)
    {
        limiter.dropped_since_log.fetch_add(1, Ordering::Relaxed);
        limiter.log_drops_if_needed();
        return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }
    next.run(request).await
}

fn client_id(request: &Request) -> Option<String> {
    // Trust the reverse proxy's client header when present; direct
    // connections are not limited.
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_deny() {
        let limiter = RateLimiter::new(1, 3);
        assert!(limiter.check_and_consume("10.0.0.1"));
        assert!(limiter.check_and_consume("10.0.0.1"));
        assert!(limiter.check_and_consume("10.0.0.1"));
        assert!(!limiter.check_and_consume("10.0.0.1"));
    }

    #[test]
    fn clients_have_independent_buckets() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check_and_consume("10.0.0.1"));
        assert!(!limiter.check_and_consume("10.0.0.1"));
        assert!(limiter.check_and_consume("10.0.0.2"));
    }
}
