// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum integration for the `general` policy.
//!
//! The `auth` and `claim` policies are consumed explicitly inside their
//! handlers (keyed by client address and user id respectively); only the
//! blanket per-client policy runs as a layer.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::Policy;
use crate::error::ApiError;
use crate::state::AppState;

/// Identify the calling client for per-client policies.
///
/// The socket peer address, unless `trust_forwarded` is set, in which case
/// the first `X-Forwarded-For` hop and then `X-Real-IP` take precedence.
/// Clients choose those headers freely, so they are only meaningful behind
/// a proxy that overwrites them.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    let peer = peer.map(|addr| addr.ip().to_string());
    if !trust_forwarded {
        return peer.unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_owned)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Client key from request parts (used by handlers).
pub fn client_key_from_parts(parts: &Parts, trust_forwarded: bool) -> String {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_key(&parts.headers, peer, trust_forwarded)
}

/// Extractor yielding [`client_key_from_parts`] under the configured trust.
pub struct ClientKey(pub String);

impl FromRequestParts<AppState> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientKey(client_key_from_parts(
            parts,
            state.config.trust_forwarded_headers,
        )))
    }
}

/// Layer function enforcing the `general` policy per client.
///
/// Handlers that consume a stricter policy set their own rate-limit headers;
/// those are left untouched.
pub async fn general_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.config.trust_forwarded_headers);

    match state.rate_limiter.consume(Policy::General, &key) {
        Ok(admission) => {
            let mut response = next.run(request).await;
            if !response.headers().contains_key("x-ratelimit-limit") {
                admission.info.apply_headers(response.headers_mut());
            }
            response
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_headers_ignored_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        let peer: SocketAddr = "203.0.113.7:9000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer), false), "203.0.113.7");
        assert_eq!(client_key(&headers, None, false), "unknown");
    }

    #[test]
    fn trusted_forwarded_for_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.1");
    }

    #[test]
    fn trusted_falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_key(&headers, None, true), "10.0.0.9");

        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "127.0.0.1");
        assert_eq!(client_key(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn rotating_forwarded_for_cannot_escape_auth_limit() {
        let state = AppState::in_memory(crate::config::AppConfig::for_tests());
        let peer: SocketAddr = "203.0.113.7:40000".parse().unwrap();
        let capacity = state.rate_limiter.policies().auth.capacity;

        let admitted = (0..50)
            .filter(|i| {
                let mut headers = HeaderMap::new();
                let spoofed = format!("198.51.100.{i}");
                headers.insert("x-forwarded-for", HeaderValue::from_str(&spoofed).unwrap());
                let key = client_key(&headers, Some(peer), state.config.trust_forwarded_headers);
                state.rate_limiter.consume(Policy::Auth, &key).is_ok()
            })
            .count();
        assert_eq!(admitted, capacity as usize);
    }
}
