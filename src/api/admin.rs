// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for the reward pool.
//!
//! These endpoints require the Admin role (a session opened with one of the
//! `ADMIN_WALLETS`) and provide:
//! - Pool activation and accrual parameters
//! - Account activation
//! - Manual failure of a pending claim whose settlement will never arrive

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::AdminOnly,
    error::ApiError,
    rewards::{ClaimError, ClaimTransaction, PoolState, PoolUpdate, RewardAccount},
    state::AppState,
};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AccountActivationRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FailClaimRequest {
    /// Recorded as the claim's failure reason.
    pub reason: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Current pool state, including accrual parameters.
#[utoipa::path(
    get,
    path = "/v1/admin/pool",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pool state", body = PoolState),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn get_pool(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<PoolState>, ApiError> {
    Ok(Json(state.accounts.pool()?))
}

/// Update the pool switch and accrual parameters.
///
/// Only the fields present in the body change.
#[utoipa::path(
    patch,
    path = "/v1/admin/pool",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = PoolUpdate,
    responses(
        (status = 200, description = "Updated pool state", body = PoolState),
        (status = 400, description = "Invalid pool configuration"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn update_pool(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(update): Json<PoolUpdate>,
) -> Result<Json<PoolState>, ApiError> {
    let pool = state.accounts.update_pool(&update)?;
    tracing::info!(admin = %admin.user_id, ?update, "Admin updated reward pool");
    Ok(Json(pool))
}

/// Look up any user's reward account.
#[utoipa::path(
    get,
    path = "/v1/admin/accounts/{user_id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Reward account", body = RewardAccount),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "No reward account")
    )
)]
pub async fn get_account(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RewardAccount>, ApiError> {
    match state.accounts.account(&user_id)? {
        Some(account) => Ok(Json(account)),
        None => Err(ClaimError::AccountNotFound(user_id).into()),
    }
}

/// Suspend or reinstate a reward account.
///
/// A suspended account keeps accruing but cannot open claims.
#[utoipa::path(
    put,
    path = "/v1/admin/accounts/{user_id}/active",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("user_id" = String, Path, description = "User id")),
    request_body = AccountActivationRequest,
    responses(
        (status = 200, description = "Updated account", body = RewardAccount),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "No reward account")
    )
)]
pub async fn set_account_active(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AccountActivationRequest>,
) -> Result<Json<RewardAccount>, ApiError> {
    let account = state.accounts.set_active(&user_id, request.active)?;
    tracing::info!(admin = %admin.user_id, user_id = %user_id, active = request.active, "Admin changed account activation");
    Ok(Json(account))
}

/// Fail a pending claim and free the owner's claim slot.
#[utoipa::path(
    post,
    path = "/v1/admin/claims/{transaction_id}/fail",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("transaction_id" = String, Path, description = "Claim transaction id")),
    request_body = FailClaimRequest,
    responses(
        (status = 200, description = "Claim failed", body = ClaimTransaction),
        (status = 400, description = "Missing reason"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Claim already confirmed")
    )
)]
pub async fn fail_claim(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(request): Json<FailClaimRequest>,
) -> Result<Json<ClaimTransaction>, ApiError> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }
    let claim = state.claims.fail(&transaction_id, reason)?;
    tracing::info!(admin = %admin.user_id, transaction_id = %transaction_id, "Admin failed claim");
    Ok(Json(claim))
}
