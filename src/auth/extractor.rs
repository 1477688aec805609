// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! `OptionalAuth` is for public endpoints that show more to signed-in
//! callers. It distinguishes "no credentials" (`None`) from "bad
//! credentials" (rejected), so an expired token is never silently treated
//! as anonymous.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, AuthenticatedUser, Role};
use crate::state::AppState;

/// Extractor for authenticated users.
pub struct Auth(pub AuthenticatedUser);

/// Extractor that requires the admin role.
pub struct AdminOnly(pub AuthenticatedUser);

/// Extractor yielding `None` when no `Authorization` header is present.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

/// Pull the bearer token out of the headers.
///
/// `Ok(None)` when the header is absent, an error when it is present but not
/// a `Bearer` credential.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Some)
        .ok_or(AuthError::InvalidToken)
}

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(&parts.headers)?.ok_or(AuthError::MissingToken)?;
        let user = authenticate(state, token)?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

fn authenticate(state: &AppState, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let mut user = state.sessions.verify(token)?;
    user.role = state.config.role_for(&user.wallet_address);
    Ok(user)
}

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.role.has_privilege(Role::Admin) {
            tracing::warn!(user_id = %user.user_id, "Admin endpoint refused");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers)? {
            None => Ok(OptionalAuth(None)),
            Some(token) => Ok(OptionalAuth(Some(authenticate(state, token)?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::http::Request;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_requires_header() {
        let state = AppState::in_memory(AppConfig::for_tests());
        let mut parts = parts_with(None);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn auth_rejects_non_bearer_scheme() {
        let state = AppState::in_memory(AppConfig::for_tests());
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz"));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn auth_accepts_issued_session() {
        let state = AppState::in_memory(AppConfig::for_tests());
        let issued = state.sessions.issue("user-1", "wallet-1").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", issued.token)));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user-1");
        assert!(parts.extensions.get::<AuthenticatedUser>().is_some());
    }

    #[tokio::test]
    async fn optional_auth_distinguishes_absent_from_invalid() {
        let state = AppState::in_memory(AppConfig::for_tests());

        let mut parts = parts_with(None);
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(user.is_none());

        let mut parts = parts_with(Some("Bearer garbage"));
        let result = OptionalAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));

        let issued = state.sessions.issue("user-2", "wallet-2").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", issued.token)));
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.unwrap().user_id, "user-2");
    }

    #[tokio::test]
    async fn admin_only_follows_configured_wallets() {
        let mut config = AppConfig::for_tests();
        config.admin_wallets = vec!["wallet-admin".to_string()];
        let state = AppState::in_memory(config);

        let user = state.sessions.issue("user-1", "wallet-1").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", user.token)));
        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));

        let admin = state.sessions.issue("user-9", "wallet-admin").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", admin.token)));
        let AdminOnly(user) = AdminOnly::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.role, Role::Admin);

        let mut parts = parts_with(None);
        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }
}
