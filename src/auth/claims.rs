// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated caller representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Caller identity resolved from a bearer session token.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (token `sub` claim)
    pub user_id: String,

    /// Session the token belongs to (token `sid` claim)
    pub session_id: String,

    /// Wallet the session was opened with
    pub wallet_address: String,

    /// Session expiry
    pub expires_at: DateTime<Utc>,

    /// Resolved per request from the admin wallet list
    #[serde(default)]
    pub role: Role,
}

impl AuthenticatedUser {
    /// Key for per-user rate limiting.
    pub fn rate_limit_key(&self) -> &str {
        &self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
