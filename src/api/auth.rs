// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet login API endpoints.
//!
//! `challenge` and `wallet-connect` are public and limited by the `auth`
//! policy per client address. `logout` and `sessions/revoke-others` act on
//! the caller's own sessions.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{Auth, IssuedChallenge},
    error::ApiError,
    ratelimit::{ClientKey, Policy},
    rewards::User,
    state::AppState,
};

/// Request a login challenge.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChallengeRequest {
    /// Wallet address in the configured scheme's format.
    pub wallet_address: String,
}

/// Submit a signed challenge.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WalletConnectRequest {
    pub wallet_address: String,
    /// Signature over `message` (base58 or hex for ed25519, 65-byte hex for EVM).
    pub signature: String,
    /// The challenge message exactly as signed.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletConnectResponse {
    pub user: User,
    /// Bearer token for subsequent requests.
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    /// Whether this login created the user.
    pub is_new_user: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogoutResponse {
    /// Whether an active session was revoked.
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RevokeOthersResponse {
    /// Number of other sessions revoked.
    pub revoked_count: usize,
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

/// Issue a login challenge for a wallet.
///
/// Replaces any earlier challenge for the same wallet.
#[utoipa::path(
    post,
    path = "/v1/auth/challenge",
    tag = "Auth",
    request_body = ChallengeRequest,
    responses(
        (status = 200, description = "Challenge issued", body = IssuedChallenge),
        (status = 400, description = "Invalid wallet address"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn challenge(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    Json(request): Json<ChallengeRequest>,
) -> Result<Response, ApiError> {
    require("wallet_address", &request.wallet_address)?;
    let admission = state.rate_limiter.consume(Policy::Auth, &client)?;

    let issued = state.challenges.issue_challenge(&request.wallet_address)?;

    let mut response = Json(issued).into_response();
    admission.info.apply_headers(response.headers_mut());
    Ok(response)
}

/// Verify a signed challenge and open a session.
///
/// Creates the user and its reward account on first login.
#[utoipa::path(
    post,
    path = "/v1/auth/wallet-connect",
    tag = "Auth",
    request_body = WalletConnectRequest,
    responses(
        (status = 200, description = "Logged in", body = WalletConnectResponse),
        (status = 400, description = "Malformed address or message"),
        (status = 401, description = "Signature, nonce or timestamp rejected"),
        (status = 404, description = "No challenge for this wallet"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn wallet_connect(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    Json(request): Json<WalletConnectRequest>,
) -> Result<Response, ApiError> {
    require("wallet_address", &request.wallet_address)?;
    require("signature", &request.signature)?;
    require("message", &request.message)?;
    let admission = state.rate_limiter.consume(Policy::Auth, &client)?;

    let wallet = state.challenges.verify(
        &request.wallet_address,
        &request.signature,
        &request.message,
    )?;
    let (user, is_new_user) = state.accounts.connect_wallet(&wallet)?;
    let issued = state.sessions.issue(&user.id, &wallet)?;

    tracing::info!(user_id = %user.id, wallet = %wallet, is_new_user, "Wallet connected");

    let mut response = Json(WalletConnectResponse {
        user,
        session_token: issued.token,
        expires_at: issued.session.expires_at,
        is_new_user,
    })
    .into_response();
    admission.info.apply_headers(response.headers_mut());
    Ok(response)
}

/// Revoke the session the request was made with.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Session revoked", body = LogoutResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let revoked = state.sessions.revoke(&user.session_id)?;
    Ok(Json(LogoutResponse { revoked }))
}

/// Revoke every other session of the caller.
#[utoipa::path(
    post,
    path = "/v1/auth/sessions/revoke-others",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Other sessions revoked", body = RevokeOthersResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn revoke_other_sessions(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<RevokeOthersResponse>, ApiError> {
    let revoked_count = state
        .sessions
        .revoke_all_except(&user.user_id, &user.session_id)?;
    Ok(Json(RevokeOthersResponse { revoked_count }))
}
