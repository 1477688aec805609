// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Three families, matching the three stages of a wallet login:
//! bearer-token checks ([`AuthError`]), challenge bookkeeping
//! ([`NonceError`]) and signature checks ([`SignatureError`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::storage::StoreError;

/// Bearer session token errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingToken,
    /// Header malformed, signature invalid, or session revoked/unknown
    #[error("Session token is invalid")]
    InvalidToken,
    /// Token or session has expired
    #[error("Session token has expired")]
    TokenExpired,
    /// Authenticated but lacking the required role
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InsufficientPermissions => "FORBIDDEN",
            AuthError::Store(_) | AuthError::Signing(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(inner) => inner.into(),
            AuthError::Signing(detail) => ApiError::internal("session signing", detail),
            AuthError::InsufficientPermissions => ApiError::new(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Insufficient permissions for this operation",
            ),
            other => ApiError::unauthorized(other.error_code(), other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Challenge (nonce) lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NonceError {
    #[error("No active challenge for this wallet")]
    NotFound,
    #[error("Challenge has expired")]
    Expired,
    #[error("Challenge has already been used")]
    AlreadyUsed,
}

impl NonceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            NonceError::NotFound => "NONCE_NOT_FOUND",
            NonceError::Expired => "NONCE_EXPIRED",
            NonceError::AlreadyUsed => "NONCE_ALREADY_USED",
        }
    }
}

/// Signed message errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Signature verification failed")]
    Invalid,
    #[error("Signed message timestamp is outside the accepted window")]
    TimestampOutOfRange,
    #[error("Signed message is not a recognised challenge")]
    MalformedMessage,
    #[error("Invalid wallet address: {0}")]
    MalformedAddress(String),
}

impl SignatureError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SignatureError::Invalid => "SIGNATURE_INVALID",
            SignatureError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            SignatureError::MalformedMessage => "INVALID_MESSAGE",
            SignatureError::MalformedAddress(_) => "INVALID_WALLET_ADDRESS",
        }
    }
}

/// Outcome of verifying a signed challenge.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Nonce(#[from] NonceError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<NonceError> for ApiError {
    fn from(e: NonceError) -> Self {
        let status = match e {
            NonceError::NotFound => StatusCode::NOT_FOUND,
            NonceError::Expired | NonceError::AlreadyUsed => StatusCode::UNAUTHORIZED,
        };
        ApiError::new(status, e.error_code(), e.to_string())
    }
}

impl From<SignatureError> for ApiError {
    fn from(e: SignatureError) -> Self {
        let status = match e {
            SignatureError::Invalid | SignatureError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }
            SignatureError::MalformedMessage | SignatureError::MalformedAddress(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        ApiError::new(status, e.error_code(), e.to_string())
    }
}

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Nonce(inner) => inner.into(),
            VerifyError::Signature(inner) => inner.into(),
            VerifyError::Store(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_token_returns_401() {
        let response = AuthError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"]["code"], "MISSING_TOKEN");
    }

    #[test]
    fn verify_errors_map_to_stable_codes() {
        let api: ApiError = VerifyError::from(NonceError::AlreadyUsed).into();
        assert_eq!(api.code, "NONCE_ALREADY_USED");
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);

        let api: ApiError = VerifyError::from(SignatureError::TimestampOutOfRange).into();
        assert_eq!(api.code, "TIMESTAMP_OUT_OF_RANGE");

        let api: ApiError = SignatureError::MalformedAddress("x".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn insufficient_permissions_is_403() {
        let api: ApiError = AuthError::InsufficientPermissions.into();
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert_eq!(api.code, "FORBIDDEN");
    }
}
