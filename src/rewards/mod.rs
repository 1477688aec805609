// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Rewards
//!
//! Time-based reward accrual and the claim lifecycle.
//!
//! - [`accrual`] - pure eligibility / amount computation
//! - [`accounts`] - users, reward accounts, pool switch and statistics
//! - [`claims`] - pending → confirmed | failed state machine
//! - [`settlement`] - acceptance of external settlement signatures

pub mod accounts;
pub mod accrual;
pub mod claims;
pub mod error;
pub mod settlement;

use chrono::TimeDelta;

pub use accounts::{AccountRegistry, PoolState, PoolUpdate, RewardAccount, User};
pub use accrual::{compute_available, Accrual};
pub use claims::{ClaimService, ClaimStatus, ClaimTransaction, CONFIRMATION_TIMEOUT};
pub use error::ClaimError;
pub use settlement::{SettlementVerifier, TransactionIdFormat};

/// Reward program parameters. Amounts are in smallest token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPoolConfig {
    pub rate_per_hour: u64,
    pub min_claim_interval_hours: u64,
    pub max_daily_reward: u64,
    /// Token decimals, used only to format amounts for display
    pub decimals: u8,
    /// How long a pending claim waits for settlement
    pub confirmation_ttl: TimeDelta,
    /// Seed values for the pool record, used before anything has been written
    pub active: bool,
}

impl Default for RewardPoolConfig {
    fn default() -> Self {
        Self {
            rate_per_hour: 100_000_000,
            min_claim_interval_hours: 24,
            max_daily_reward: 2_400_000_000,
            decimals: 9,
            confirmation_ttl: TimeDelta::minutes(10),
            active: true,
        }
    }
}

impl RewardPoolConfig {
    /// Render a smallest-unit amount as a decimal string.
    pub fn format_amount(&self, amount: u64) -> String {
        if self.decimals == 0 {
            return amount.to_string();
        }
        let scale = 10u128.pow(self.decimals as u32);
        let whole = amount as u128 / scale;
        let frac = amount as u128 % scale;
        let frac = format!("{frac:0width$}", width = self.decimals as usize);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            whole.to_string()
        } else {
            format!("{whole}.{frac}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_amount_trims_zeros() {
        let config = RewardPoolConfig::default();
        assert_eq!(config.format_amount(2_400_000_000), "2.4");
        assert_eq!(config.format_amount(1_000_000_000), "1");
        assert_eq!(config.format_amount(1), "0.000000001");
        assert_eq!(config.format_amount(0), "0");
    }
}
