// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::http::StatusCode;

use super::claims::ClaimStatus;
use crate::error::ApiError;
use crate::storage::StoreError;

/// Failures of account and claim operations.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("No reward account for user {0}")]
    AccountNotFound(String),

    #[error("Reward pool is not active")]
    PoolInactive,

    #[error("Reward account is not active")]
    AccountInactive,

    #[error("Minimum claim interval not met")]
    NotEligible { retry_after_secs: u64 },

    #[error("No rewards available to claim")]
    NoRewardsAvailable,

    #[error("Expected amount {expected} does not match available amount {available}")]
    AmountMismatch { expected: u64, available: u64 },

    #[error("A claim is already pending")]
    InProgress { transaction_id: String },

    #[error("Claim was already confirmed with a different signature")]
    Conflict,

    #[error("Claim transaction not found")]
    NotFound,

    #[error("Claim is {status} and cannot be changed")]
    InvalidState { status: ClaimStatus },

    #[error("Settlement signature was rejected")]
    SettlementRejected,

    #[error("Invalid pool configuration: {0}")]
    InvalidPoolConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClaimError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ClaimError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ClaimError::PoolInactive => "POOL_INACTIVE",
            ClaimError::AccountInactive => "ACCOUNT_INACTIVE",
            ClaimError::NotEligible { .. } => "CLAIM_NOT_ELIGIBLE",
            ClaimError::NoRewardsAvailable => "NO_REWARDS_AVAILABLE",
            ClaimError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            ClaimError::InProgress { .. } => "CLAIM_IN_PROGRESS",
            ClaimError::Conflict => "CLAIM_CONFLICT",
            ClaimError::NotFound => "TRANSACTION_NOT_FOUND",
            ClaimError::InvalidState { .. } => "INVALID_STATE",
            ClaimError::SettlementRejected => "SETTLEMENT_REJECTED",
            ClaimError::InvalidPoolConfig(_) => "INVALID_POOL_CONFIG",
            ClaimError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ClaimError> for ApiError {
    fn from(e: ClaimError) -> Self {
        if let ClaimError::Store(inner) = e {
            return inner.into();
        }

        let status = match &e {
            ClaimError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ClaimError::AccountNotFound(_) | ClaimError::NotFound => StatusCode::NOT_FOUND,
            ClaimError::PoolInactive | ClaimError::AccountInactive => StatusCode::FORBIDDEN,
            ClaimError::NotEligible { .. }
            | ClaimError::NoRewardsAvailable
            | ClaimError::SettlementRejected
            | ClaimError::InvalidPoolConfig(_) => StatusCode::BAD_REQUEST,
            ClaimError::AmountMismatch { .. }
            | ClaimError::InProgress { .. }
            | ClaimError::Conflict
            | ClaimError::InvalidState { .. } => StatusCode::CONFLICT,
        };

        let api = ApiError::new(status, e.error_code(), e.to_string());
        match e {
            ClaimError::NotEligible { retry_after_secs } => api.with_retry_after(retry_after_secs),
            _ => api,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_eligible_carries_retry_after() {
        let api: ApiError = ClaimError::NotEligible {
            retry_after_secs: 50_400,
        }
        .into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, "CLAIM_NOT_ELIGIBLE");
        assert_eq!(api.retry_after, Some(50_400));
    }

    #[test]
    fn state_errors_are_conflicts() {
        let api: ApiError = ClaimError::InProgress {
            transaction_id: "tx".into(),
        }
        .into();
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code, "CLAIM_IN_PROGRESS");

        let api: ApiError = ClaimError::InvalidState {
            status: ClaimStatus::Failed,
        }
        .into();
        assert_eq!(api.code, "INVALID_STATE");
        assert!(api.message.contains("failed"));
    }

    #[test]
    fn store_errors_are_internal() {
        let api: ApiError = ClaimError::Store(StoreError::Poisoned).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "INTERNAL_ERROR");
    }
}
