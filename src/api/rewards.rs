// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reward API endpoints.
//!
//! Amounts are integers in the token's smallest unit; `*_display` fields
//! carry the same value as a decimal string.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{Auth, OptionalAuth},
    error::ApiError,
    ratelimit::Policy,
    rewards::{ClaimError, ClaimStatus, ClaimTransaction, RewardAccount},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailableRewardsResponse {
    pub available_amount: u64,
    pub available_amount_display: String,
    pub can_claim: bool,
    /// Hours until the next claim is allowed
    pub next_claim_available_in: f64,
    pub next_claim_available_in_secs: u64,
    pub hours_since_last_claim: f64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClaimRequest {
    /// Amount the client expects to receive; rejected if it differs.
    #[serde(default)]
    pub expected_amount: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimResponse {
    pub transaction_id: String,
    pub reward_amount: u64,
    pub reward_amount_display: String,
    /// Settlement must be confirmed before this instant.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub transaction_id: String,
    /// Ledger signature of the settlement transfer.
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmResponse {
    pub status: ClaimStatus,
    pub transaction_id: String,
    pub reward_amount: u64,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoolResponse {
    pub active: bool,
    pub total_distributed: u64,
    pub participant_count: u64,
    pub rate_per_hour: u64,
    pub min_claim_interval_hours: u64,
    pub max_daily_reward: u64,
    pub decimals: u8,
    /// Caller's account, when a valid session token was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<RewardAccount>,
}

/// Load a claim the caller owns. Other users' claims look absent.
fn owned_claim(
    state: &AppState,
    user_id: &str,
    transaction_id: &str,
) -> Result<ClaimTransaction, ApiError> {
    let claim = state.claims.get(transaction_id)?;
    if claim.user_id != user_id {
        return Err(ClaimError::NotFound.into());
    }
    Ok(claim)
}

/// Rewards the caller could claim right now.
#[utoipa::path(
    get,
    path = "/v1/rewards/available",
    tag = "Rewards",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current accrual", body = AvailableRewardsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No reward account")
    )
)]
pub async fn available(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AvailableRewardsResponse>, ApiError> {
    let accrual = state.claims.available(&user.user_id)?;
    Ok(Json(AvailableRewardsResponse {
        available_amount: accrual.available_amount,
        available_amount_display: state.config.rewards.format_amount(accrual.available_amount),
        can_claim: accrual.can_claim,
        next_claim_available_in: accrual.next_claim_in_hours,
        next_claim_available_in_secs: accrual.next_claim_in_secs,
        hours_since_last_claim: accrual.hours_since_last,
    }))
}

/// Open a pending claim for the caller's accrued rewards.
#[utoipa::path(
    post,
    path = "/v1/rewards/claim",
    tag = "Rewards",
    security(("bearer_auth" = [])),
    request_body(content = ClaimRequest, description = "Optional"),
    responses(
        (status = 201, description = "Pending claim created", body = ClaimResponse),
        (status = 400, description = "Not eligible or nothing to claim"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Pool or account inactive"),
        (status = 409, description = "Claim in progress or amount mismatch"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn claim(
    Auth(user): Auth,
    State(state): State<AppState>,
    request: Option<Json<ClaimRequest>>,
) -> Result<Response, ApiError> {
    let admission = state
        .rate_limiter
        .consume(Policy::Claim, user.rate_limit_key())?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let claim = state.claims.create(&user.user_id, request.expected_amount)?;

    let body = ClaimResponse {
        expires_at: state.claims.confirmation_deadline(claim.created_at),
        reward_amount_display: state.config.rewards.format_amount(claim.amount),
        reward_amount: claim.amount,
        transaction_id: claim.id,
    };
    let mut response = (axum::http::StatusCode::CREATED, Json(body)).into_response();
    admission.info.apply_headers(response.headers_mut());
    Ok(response)
}

/// Report settlement of a pending claim.
///
/// Confirming again with the same signature returns the same result.
#[utoipa::path(
    post,
    path = "/v1/rewards/confirm",
    tag = "Rewards",
    security(("bearer_auth" = [])),
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Claim confirmed", body = ConfirmResponse),
        (status = 400, description = "Settlement signature rejected"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Conflicting signature or claim no longer pending")
    )
)]
pub async fn confirm(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    if request.transaction_id.trim().is_empty() || request.signature.trim().is_empty() {
        return Err(ApiError::bad_request("transaction_id and signature are required"));
    }
    owned_claim(&state, &user.user_id, &request.transaction_id)?;

    let confirmed = state
        .claims
        .confirm(&request.transaction_id, &request.signature)?;
    Ok(Json(ConfirmResponse {
        status: confirmed.status,
        transaction_id: confirmed.id,
        reward_amount: confirmed.amount,
        confirmed_at: confirmed.resolved_at,
    }))
}

/// Look up one of the caller's claims.
#[utoipa::path(
    get,
    path = "/v1/rewards/claims/{transaction_id}",
    tag = "Rewards",
    security(("bearer_auth" = [])),
    params(("transaction_id" = String, Path, description = "Claim transaction id")),
    responses(
        (status = 200, description = "Claim", body = ClaimTransaction),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_claim(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<ClaimTransaction>, ApiError> {
    Ok(Json(owned_claim(&state, &user.user_id, &transaction_id)?))
}

/// Pool parameters and statistics.
#[utoipa::path(
    get,
    path = "/v1/rewards/pool",
    tag = "Rewards",
    responses(
        (status = 200, description = "Pool information", body = PoolResponse),
        (status = 401, description = "Authorization header present but invalid")
    )
)]
pub async fn pool(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
) -> Result<Json<PoolResponse>, ApiError> {
    let pool = state.accounts.pool()?;
    let account = match user {
        Some(user) => state.accounts.account(&user.user_id)?,
        None => None,
    };

    Ok(Json(PoolResponse {
        active: pool.active,
        total_distributed: pool.total_distributed,
        participant_count: pool.participant_count,
        rate_per_hour: pool.rate_per_hour,
        min_claim_interval_hours: pool.min_claim_interval_hours,
        max_daily_reward: pool.max_daily_reward,
        decimals: state.config.rewards.decimals,
        account,
    }))
}
