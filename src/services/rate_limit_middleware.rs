// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Rate limiting middleware for Axum.
//!
//! - `client_identifier`: authenticated user id if present, otherwise client address
//! - `rate_limit_middleware`: counts the request and sets the `X-RateLimit-*` headers
//! - `RateLimitExceeded`: 429 response with `Retry-After`

use crate::models::rate_limit::{RateLimitDecision, RateLimitExceededResponse};
use crate::services::rate_limiter::RateLimiter;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Identity attached to the request by an upstream authentication layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Rejection for a client that used up its window.
#[derive(Debug)]
pub struct RateLimitExceeded {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = RateLimitExceededResponse {
            error: "rate limit exceeded".to_string(),
            retry_after: self.retry_after,
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from(self.retry_after));
        response
    }
}

/// Resolve the identifier to count requests against.
///
/// `X-Forwarded-For` is only read when the connecting peer is one of
/// `trusted_proxies`; any other peer is identified by its own address.
pub fn client_identifier(request: &Request, trusted_proxies: &[IpAddr]) -> String {
    if let Some(AuthenticatedUser(user_id)) = request.extensions().get::<AuthenticatedUser>() {
        return format!("user:{}", user_id);
    }
    match client_address(request, trusted_proxies) {
        Some(address) => format!("ip:{}", address),
        None => "ip:unknown".to_string(),
    }
}

fn client_address(request: &Request, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())?;

    if !trusted_proxies.contains(&peer) {
        return Some(peer);
    }

    // Walk the chain from the nearest hop and stop at the first untrusted address
    let forwarded: Vec<IpAddr> = request
        .headers()
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect();

    Some(
        forwarded
            .iter()
            .rev()
            .find(|hop| !trusted_proxies.contains(hop))
            .or(forwarded.first())
            .copied()
            .unwrap_or(peer),
    )
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(HEADER_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        HEADER_RESET,
        HeaderValue::from(decision.reset_at.timestamp()),
    );
}

/// Count the request against the caller's window, rejecting it with 429 once
/// the window is used up.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(&request, limiter.trusted_proxies());
    let decision = limiter.check_limit(&identifier).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        RateLimitExceeded {
            retry_after: decision.retry_after_secs(),
        }
        .into_response()
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;
    use crate::services::metrics::Metrics;
    use crate::services::rate_limiter::RateLimitConfig;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;
    use tower::ServiceExt;

    const PROXY: [u8; 4] = [127, 0, 0, 1];

    fn loopback() -> Vec<IpAddr> {
        RateLimitConfig::default().trusted_proxies
    }

    fn from_peer(peer: [u8; 4], forwarded: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 4242))));
        request
    }

    #[test]
    fn test_identifier_prefers_authenticated_user() {
        let mut request = from_peer([203, 0, 113, 7], None);
        request
            .extensions_mut()
            .insert(AuthenticatedUser("alice".to_string()));

        assert_eq!(client_identifier(&request, &loopback()), "user:alice");
    }

    #[test]
    fn test_identifier_uses_forwarded_address_from_trusted_proxy() {
        let request = from_peer(PROXY, Some("203.0.113.7"));
        assert_eq!(client_identifier(&request, &loopback()), "ip:203.0.113.7");
    }

    #[test]
    fn test_forwarded_chain_skips_trusted_hops() {
        let trusted: Vec<IpAddr> = vec![
            "127.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
        ];
        // The left-most entry is whatever the client claimed
        let request = from_peer(PROXY, Some("6.6.6.6, 198.51.100.20, 10.0.0.2"));

        assert_eq!(client_identifier(&request, &trusted), "ip:198.51.100.20");
    }

    #[test]
    fn test_forwarded_header_from_untrusted_peer_is_ignored() {
        let request = from_peer([192, 168, 1, 5], Some("203.0.113.7"));
        assert_eq!(client_identifier(&request, &loopback()), "ip:192.168.1.5");
    }

    #[test]
    fn test_garbage_forwarded_header_falls_back_to_peer() {
        let request = from_peer(PROXY, Some("not an address"));
        assert_eq!(client_identifier(&request, &loopback()), "ip:127.0.0.1");
    }

    #[test]
    fn test_identifier_without_address() {
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&request, &loopback()), "ip:unknown");
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_does_not_bypass_limit() {
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryCache::new()),
            RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(60),
                ..Default::default()
            },
            Arc::new(Metrics::new()),
        ));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));

        let mut allowed = 0;
        for i in 0..10 {
            let forwarded = format!("198.51.100.{}", i);
            let request = from_peer([192, 168, 1, 5], Some(&forwarded));
            let response = app.clone().oneshot(request).await.unwrap();
            if response.status() == StatusCode::OK {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 2);
    }

    #[test]
    fn test_exceeded_response() {
        let response = RateLimitExceeded { retry_after: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "12");
    }
}
