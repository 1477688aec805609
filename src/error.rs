// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error envelope.
//!
//! Every failure leaving the service is rendered as
//!
//! ```json
//! {"error": {"code": "CLAIM_IN_PROGRESS", "message": "...", "timestamp": "...", "request_id": "..."}}
//! ```
//!
//! Domain errors convert into [`ApiError`] through `From` impls living next
//! to each error type. The request id is filled in by [`stamp_request_id`],
//! which runs inside the request-id layer.

use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ratelimit::RateLimitInfo;
use crate::storage::StoreError;

/// Header carrying the request id (set by tower-http).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Seconds until the caller may retry.
    pub retry_after: Option<u64>,
    /// Rate-limit headers to attach to the response.
    pub rate_limit: Option<RateLimitInfo>,
}

/// JSON envelope; also stored in response extensions for request-id stamping.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
            rate_limit: None,
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    /// Generic internal error. The detail is logged, never returned.
    pub fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        tracing::error!(context, error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        )
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::internal("store", e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                timestamp: Utc::now(),
                request_id: None,
                retry_after: self.retry_after,
            },
        };

        let mut response = (self.status, Json(envelope.clone())).into_response();
        let headers = response.headers_mut();
        if let Some(info) = &self.rate_limit {
            info.apply_headers(headers);
        }
        if let Some(seconds) = self.retry_after {
            headers.insert("retry-after", HeaderValue::from(seconds));
        }
        response.extensions_mut().insert(envelope);
        response
    }
}

/// Re-render error bodies with the request id assigned by the request-id layer.
pub async fn stamp_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = next.run(request).await;

    let (Some(request_id), Some(mut envelope)) =
        (request_id, response.extensions_mut().remove::<ErrorEnvelope>())
    else {
        return response;
    };

    envelope.error.request_id = Some(request_id);
    let Ok(bytes) = serde_json::to_vec(&envelope) else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_code() {
        let nf = ApiError::not_found("TRANSACTION_NOT_FOUND", "missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.code, "TRANSACTION_NOT_FOUND");
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn into_response_returns_envelope() {
        let response = ApiError::conflict("CLAIM_IN_PROGRESS", "busy").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"]["code"], "CLAIM_IN_PROGRESS");
        assert_eq!(body["error"]["message"], "busy");
        assert!(body["error"]["timestamp"].is_string());
        assert!(body["error"].get("retryAfter").is_none());
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let response = ApiError::internal("test", "secret database path").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(!body.contains("secret"));
        assert!(body.contains("INTERNAL_ERROR"));
    }

    #[tokio::test]
    async fn retry_after_sets_header_and_body() {
        let response = ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", "slow down")
            .with_retry_after(42)
            .into_response();
        assert_eq!(response.headers()["retry-after"], "42");

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"]["retryAfter"], 42);
    }
}
