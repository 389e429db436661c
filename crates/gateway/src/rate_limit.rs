//! Per-IP sliding-window rate limiting for the admin HTTP API (§4.3, §6).
//!
//! Grounded on the teacher's `RequestThrottle` (fixed window per IP, lazy
//! periodic cleanup of stale buckets), narrowed to the single admin-API
//! scope this relay exposes.

use std::{
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use dashmap::{mapref::entry::Entry, DashMap};
use ttsrelay_protocol::{ADMIN_RATE_LIMIT_MAX_REQUESTS, ADMIN_RATE_LIMIT_WINDOW_SECS};

use crate::server::AppState;

const CLEANUP_EVERY_REQUESTS: u64 = 512;
const MAX_REQUESTS: usize = ADMIN_RATE_LIMIT_MAX_REQUESTS as usize;
const WINDOW: Duration = Duration::from_secs(ADMIN_RATE_LIMIT_WINDOW_SECS);

#[derive(Clone)]
pub struct RequestThrottle {
    buckets: Arc<DashMap<IpAddr, WindowState>>,
    requests_seen: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started_at: Instant,
    count: usize,
}

enum ThrottleDecision {
    Allowed,
    Denied { retry_after: Duration },
}

impl RequestThrottle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            requests_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    fn check(&self, ip: IpAddr) -> ThrottleDecision {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> ThrottleDecision {
        let decision = match self.buckets.entry(ip) {
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();
                let elapsed = now.duration_since(state.started_at);
                if elapsed >= WINDOW {
                    state.started_at = now;
                    state.count = 1;
                    ThrottleDecision::Allowed
                } else if state.count < MAX_REQUESTS {
                    state.count += 1;
                    ThrottleDecision::Allowed
                } else {
                    ThrottleDecision::Denied { retry_after: WINDOW.saturating_sub(elapsed) }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(WindowState { started_at: now, count: 1 });
                ThrottleDecision::Allowed
            }
        };

        self.cleanup_if_needed(now);
        decision
    }

    fn cleanup_if_needed(&self, now: Instant) {
        let seen = self.requests_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % CLEANUP_EVERY_REQUESTS != 0 {
            return;
        }
        let stale_after = WINDOW.saturating_mul(3);
        self.buckets.retain(|_, state| now.duration_since(state.started_at) <= stale_after);
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn throttle_gate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let client_ip = resolve_client_ip(request.headers(), addr, state.behind_proxy);
    match state.request_throttle.check(client_ip) {
        ThrottleDecision::Allowed => next.run(request).await,
        ThrottleDecision::Denied { retry_after } => rate_limited_response(retry_after),
    }
}

fn rate_limited_response(retry_after: Duration) -> Response {
    let retry_after_secs = retry_after.as_secs().max(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "too many requests",
            "retry_after_seconds": retry_after_secs
        })),
    )
        .into_response();

    if let Ok(value) = retry_after_secs.to_string().parse() {
        response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
    }
    response
}

pub fn resolve_client_ip(headers: &HeaderMap, addr: SocketAddr, behind_proxy: bool) -> IpAddr {
    if behind_proxy {
        if let Some(ip) = extract_forwarded_ip(headers) {
            return ip;
        }
    }
    addr.ip()
}

fn extract_forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    if let Some(xff) = xff {
        if let Some(ip) = xff.split(',').find_map(|candidate| parse_ip(candidate.trim())) {
            return Some(ip);
        }
    }

    let xri = headers.get("x-real-ip").and_then(|v| v.to_str().ok());
    if let Some(xri) = xri {
        if let Some(ip) = parse_ip(xri.trim()) {
            return Some(ip);
        }
    }

    let cf_ip = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok());
    if let Some(cf_ip) = cf_ip {
        if let Some(ip) = parse_ip(cf_ip.trim()) {
            return Some(ip);
        }
    }

    None
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    if value.is_empty() {
        return None;
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_limits_requests_then_resets() {
        let throttle = RequestThrottle::new();
        let ip = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        let now = Instant::now();

        for _ in 0..MAX_REQUESTS {
            assert!(matches!(throttle.check_at(ip, now), ThrottleDecision::Allowed));
        }

        match throttle.check_at(ip, now) {
            ThrottleDecision::Denied { retry_after } => assert_eq!(retry_after, WINDOW),
            ThrottleDecision::Allowed => panic!("expected request over the limit to be throttled"),
        }

        assert!(matches!(
            throttle.check_at(ip, now + WINDOW + Duration::from_secs(1)),
            ThrottleDecision::Allowed
        ));
    }

    #[test]
    fn distinct_ips_have_independent_windows() {
        let throttle = RequestThrottle::new();
        let now = Instant::now();
        let a = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 2));

        for _ in 0..MAX_REQUESTS {
            assert!(matches!(throttle.check_at(a, now), ThrottleDecision::Allowed));
        }
        assert!(matches!(throttle.check_at(b, now), ThrottleDecision::Allowed));
    }

    #[test]
    fn forwarded_ip_uses_first_xff_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            axum::http::HeaderValue::from_static("203.0.113.1, 198.51.100.9"),
        );
        assert_eq!(
            extract_forwarded_ip(&headers),
            Some(IpAddr::V4(std::net::Ipv4Addr::new(203, 0, 113, 1)))
        );
    }

    #[test]
    fn falls_back_to_socket_addr_when_not_behind_proxy() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, addr, false), addr.ip());
    }
}
