// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reward accrual.
//!
//! Everything is integer arithmetic over whole seconds and smallest token
//! units, so the eligibility boundary cannot drift. The floating point
//! fields of [`Accrual`] are for display only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

const SECS_PER_HOUR: u64 = 3600;

/// Claimable amount and eligibility at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Accrual {
    /// Claimable amount in smallest units, capped at the daily maximum
    pub available_amount: u64,
    pub can_claim: bool,
    /// Seconds until `can_claim` becomes true (0 when it already is)
    pub next_claim_in_secs: u64,
    pub next_claim_in_hours: f64,
    pub hours_since_last: f64,
}

/// Compute what a user may claim.
///
/// `last_claim` is the last confirmed claim, or the registration time for
/// users who never claimed. Time running backwards counts as zero elapsed.
/// Accrual beyond `max_daily` is not carried over.
pub fn compute_available(
    last_claim: DateTime<Utc>,
    now: DateTime<Utc>,
    rate_per_hour: u64,
    min_interval_hours: u64,
    max_daily: u64,
) -> Accrual {
    let elapsed_secs = (now - last_claim).num_seconds().max(0) as u64;
    let min_interval_secs = min_interval_hours.saturating_mul(SECS_PER_HOUR);

    let accrued = elapsed_secs as u128 * rate_per_hour as u128 / SECS_PER_HOUR as u128;
    let available_amount = accrued.min(max_daily as u128) as u64;

    let next_claim_in_secs = min_interval_secs.saturating_sub(elapsed_secs);

    Accrual {
        available_amount,
        can_claim: elapsed_secs >= min_interval_secs,
        next_claim_in_secs,
        next_claim_in_hours: next_claim_in_secs as f64 / SECS_PER_HOUR as f64,
        hours_since_last: elapsed_secs as f64 / SECS_PER_HOUR as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    // 0.1 token per hour, 24h interval, 2.4 token cap (9 decimals)
    const RATE: u64 = 100_000_000;
    const MAX_DAILY: u64 = 2_400_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn two_days_is_capped_and_claimable() {
        let accrual = compute_available(now() - TimeDelta::hours(48), now(), RATE, 24, MAX_DAILY);
        assert_eq!(accrual.available_amount, 2_400_000_000);
        assert!(accrual.can_claim);
        assert_eq!(accrual.next_claim_in_secs, 0);
        assert_eq!(accrual.next_claim_in_hours, 0.0);
        assert_eq!(accrual.hours_since_last, 48.0);
    }

    #[test]
    fn ten_hours_waits_fourteen_more() {
        let accrual = compute_available(now() - TimeDelta::hours(10), now(), RATE, 24, MAX_DAILY);
        assert!(!accrual.can_claim);
        assert_eq!(accrual.next_claim_in_secs, 14 * 3600);
        assert_eq!(accrual.next_claim_in_hours, 14.0);
        assert_eq!(accrual.available_amount, 1_000_000_000);
    }

    #[test]
    fn boundary_is_exact_to_the_second() {
        let one_short = now() - TimeDelta::hours(24) + TimeDelta::seconds(1);
        let accrual = compute_available(one_short, now(), RATE, 24, MAX_DAILY);
        assert!(!accrual.can_claim);
        assert_eq!(accrual.next_claim_in_secs, 1);

        let exact = compute_available(now() - TimeDelta::hours(24), now(), RATE, 24, MAX_DAILY);
        assert!(exact.can_claim);
    }

    #[test]
    fn clock_skew_counts_as_zero() {
        let accrual = compute_available(now() + TimeDelta::minutes(5), now(), RATE, 24, MAX_DAILY);
        assert_eq!(accrual.available_amount, 0);
        assert_eq!(accrual.hours_since_last, 0.0);
        assert_eq!(accrual.next_claim_in_secs, 24 * 3600);
    }

    #[test]
    fn partial_hours_accrue_in_smallest_units() {
        let accrual = compute_available(now() - TimeDelta::seconds(90), now(), RATE, 0, MAX_DAILY);
        // 90s * 1e8 / 3600 = 2_500_000
        assert_eq!(accrual.available_amount, 2_500_000);
        assert!(accrual.can_claim);
    }
}
