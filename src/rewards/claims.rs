// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Claim Transactions
//!
//! ```text
//! create ──► pending ──confirm──► confirmed
//!               │
//!               └──fail / timeout──► failed
//! ```
//!
//! `confirmed` and `failed` are terminal.
//!
//! ## Invariants
//!
//! - At most one pending claim per user. The `pending_claims/{user_id}` slot
//!   is written with `Expect::Absent` in the same commit as the claim.
//! - A confirmed claim credits the account exactly once. The claim
//!   transition, the account update, the pool statistics and the slot
//!   release are one commit guarded by the versions they were read at.
//! - A pending claim older than the confirmation TTL is failed with
//!   `ConfirmationTimeout`, either by the sweeper or lazily when it is next
//!   touched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::accounts::{load_pool, PoolState, RewardAccount, POOL_KEY};
use super::accrual::{compute_available, Accrual};
use super::error::ClaimError;
use super::settlement::SettlementVerifier;
use super::RewardPoolConfig;
use crate::storage::{
    encode, get_record, scan_records, Expect, KvStore, Record, StoreError, Table, WriteOp,
};

/// Failure reason recorded by the timeout path.
pub const CONFIRMATION_TIMEOUT: &str = "ConfirmationTimeout";

const MAX_CAS_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Confirmed,
    Failed,
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Confirmed => "confirmed",
            ClaimStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClaimTransaction {
    pub id: String,
    pub user_id: String,
    /// Amount in smallest units
    pub amount: u64,
    pub status: ClaimStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Per-user marker pointing at the pending claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PendingSlot {
    transaction_id: String,
    created_at: DateTime<Utc>,
}

/// Claim lifecycle over a shared store.
#[derive(Clone)]
pub struct ClaimService {
    store: Arc<dyn KvStore>,
    settlement: Arc<dyn SettlementVerifier>,
    config: RewardPoolConfig,
}

impl ClaimService {
    pub fn new(
        store: Arc<dyn KvStore>,
        settlement: Arc<dyn SettlementVerifier>,
        config: RewardPoolConfig,
    ) -> Self {
        Self {
            store,
            settlement,
            config,
        }
    }

    pub fn config(&self) -> &RewardPoolConfig {
        &self.config
    }

    /// When a claim created at `created_at` stops being confirmable.
    pub fn confirmation_deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + self.config.confirmation_ttl
    }

    fn is_stale(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now > self.confirmation_deadline(created_at)
    }

    fn load_account(&self, user_id: &str) -> Result<Record<RewardAccount>, ClaimError> {
        get_record::<RewardAccount>(self.store.as_ref(), Table::Accounts, user_id)?
            .ok_or_else(|| ClaimError::AccountNotFound(user_id.to_string()))
    }

    fn accrual_for(&self, account: &RewardAccount, pool: &PoolState, now: DateTime<Utc>) -> Accrual {
        compute_available(
            account.accrual_start(),
            now,
            pool.rate_per_hour,
            pool.min_claim_interval_hours,
            pool.max_daily_reward,
        )
    }

    /// Current accrual for `user_id`.
    pub fn available(&self, user_id: &str) -> Result<Accrual, ClaimError> {
        self.available_at(user_id, Utc::now())
    }

    pub fn available_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<Accrual, ClaimError> {
        let account = self.load_account(user_id)?;
        let (pool, _) = load_pool(self.store.as_ref(), &self.config)?;
        Ok(self.accrual_for(&account.value, &pool, now))
    }

    // =========================================================================
    // create
    // =========================================================================

    /// Open a pending claim for everything `user_id` may claim right now.
    pub fn create(
        &self,
        user_id: &str,
        expected_amount: Option<u64>,
    ) -> Result<ClaimTransaction, ClaimError> {
        self.create_at(user_id, expected_amount, Utc::now())
    }

    pub fn create_at(
        &self,
        user_id: &str,
        expected_amount: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ClaimTransaction, ClaimError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let account = self.load_account(user_id)?;
            let (pool, pool_version) = load_pool(self.store.as_ref(), &self.config)?;
            if !pool.active {
                return Err(ClaimError::PoolInactive);
            }
            if !account.value.active {
                return Err(ClaimError::AccountInactive);
            }

            let slot = get_record::<PendingSlot>(self.store.as_ref(), Table::PendingClaims, user_id)?;
            if let Some(slot) = &slot {
                if self.is_stale(slot.value.created_at, now) {
                    self.release_stale_slot(user_id, slot, now)?;
                    continue;
                }
            }

            let accrual = self.accrual_for(&account.value, &pool, now);
            if !accrual.can_claim {
                return Err(ClaimError::NotEligible {
                    retry_after_secs: accrual.next_claim_in_secs,
                });
            }
            if let Some(expected) = expected_amount {
                if expected != accrual.available_amount {
                    return Err(ClaimError::AmountMismatch {
                        expected,
                        available: accrual.available_amount,
                    });
                }
            }
            if accrual.available_amount == 0 {
                return Err(ClaimError::NoRewardsAvailable);
            }
            if let Some(slot) = slot {
                return Err(ClaimError::InProgress {
                    transaction_id: slot.value.transaction_id,
                });
            }

            let claim = ClaimTransaction {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                amount: accrual.available_amount,
                status: ClaimStatus::Pending,
                signature: None,
                failure_reason: None,
                created_at: now,
                resolved_at: None,
            };
            let marker = PendingSlot {
                transaction_id: claim.id.clone(),
                created_at: now,
            };

            let ops = vec![
                WriteOp::check(Table::Accounts, user_id, account.expect()),
                WriteOp::check(Table::Pool, POOL_KEY, Expect::from_read(pool_version)),
                WriteOp::put(Table::PendingClaims, user_id, Expect::Absent, encode(&marker)?),
                WriteOp::put(Table::Claims, claim.id.as_str(), Expect::Absent, encode(&claim)?),
            ];
            if self.store.commit(ops)?.is_applied() {
                tracing::info!(
                    transaction_id = %claim.id,
                    user_id,
                    amount = claim.amount,
                    "Claim created"
                );
                return Ok(claim);
            }
        }
        Err(StoreError::Contention(format!("claim slot {user_id}")).into())
    }

    /// Fail the claim a stale slot points at, or drop the slot if the claim is gone.
    fn release_stale_slot(
        &self,
        user_id: &str,
        slot: &Record<PendingSlot>,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        match self.fail_inner(&slot.value.transaction_id, CONFIRMATION_TIMEOUT, now) {
            Ok(_) | Err(ClaimError::InvalidState { .. }) => Ok(()),
            Err(ClaimError::NotFound) => {
                tracing::warn!(user_id, transaction_id = %slot.value.transaction_id, "Dropping orphaned claim slot");
                self.store.commit(vec![WriteOp::delete(
                    Table::PendingClaims,
                    user_id,
                    slot.expect(),
                )])?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // confirm
    // =========================================================================

    /// Record external settlement of a pending claim and credit the account.
    pub fn confirm(
        &self,
        transaction_id: &str,
        signature: &str,
    ) -> Result<ClaimTransaction, ClaimError> {
        self.confirm_at(transaction_id, signature, Utc::now())
    }

    pub fn confirm_at(
        &self,
        transaction_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimTransaction, ClaimError> {
        let signature = signature.trim();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let record = get_record::<ClaimTransaction>(self.store.as_ref(), Table::Claims, transaction_id)?
                .ok_or(ClaimError::NotFound)?;
            let claim = &record.value;

            match claim.status {
                ClaimStatus::Confirmed if claim.signature.as_deref() == Some(signature) => {
                    return Ok(record.value);
                }
                ClaimStatus::Confirmed => return Err(ClaimError::Conflict),
                ClaimStatus::Failed => {
                    return Err(ClaimError::InvalidState {
                        status: ClaimStatus::Failed,
                    })
                }
                ClaimStatus::Pending => {}
            }

            if self.is_stale(claim.created_at, now) {
                self.fail_inner(transaction_id, CONFIRMATION_TIMEOUT, now)?;
                return Err(ClaimError::InvalidState {
                    status: ClaimStatus::Failed,
                });
            }
            if !self.settlement.verify(claim, signature) {
                tracing::info!(transaction_id, "Settlement signature rejected");
                return Err(ClaimError::SettlementRejected);
            }

            let account = self.load_account(&claim.user_id)?;
            let slot =
                get_record::<PendingSlot>(self.store.as_ref(), Table::PendingClaims, &claim.user_id)?;
            let (mut pool, pool_version) = load_pool(self.store.as_ref(), &self.config)?;

            let mut confirmed = claim.clone();
            confirmed.status = ClaimStatus::Confirmed;
            confirmed.signature = Some(signature.to_string());
            confirmed.resolved_at = Some(now);

            let mut credited = account.value.clone();
            credited.last_claim_timestamp = Some(
                credited
                    .last_claim_timestamp
                    .map_or(now, |previous| previous.max(now)),
            );
            credited.total_earned = credited.total_earned.saturating_add(claim.amount);
            credited.total_claims += 1;
            pool.total_distributed = pool.total_distributed.saturating_add(claim.amount);

            let mut ops = vec![
                WriteOp::put(Table::Claims, transaction_id, record.expect(), encode(&confirmed)?),
                WriteOp::put(
                    Table::Accounts,
                    claim.user_id.as_str(),
                    account.expect(),
                    encode(&credited)?,
                ),
                WriteOp::put(Table::Pool, POOL_KEY, Expect::from_read(pool_version), encode(&pool)?),
            ];
            if let Some(slot) = slot.filter(|s| s.value.transaction_id == claim.id) {
                ops.push(WriteOp::delete(
                    Table::PendingClaims,
                    claim.user_id.as_str(),
                    slot.expect(),
                ));
            }

            if self.store.commit(ops)?.is_applied() {
                tracing::info!(
                    transaction_id,
                    user_id = %confirmed.user_id,
                    amount = confirmed.amount,
                    "Claim confirmed"
                );
                return Ok(confirmed);
            }
        }
        Err(StoreError::Contention(format!("claim {transaction_id}")).into())
    }

    // =========================================================================
    // fail / expire
    // =========================================================================

    /// Fail a pending claim and release the user's slot.
    ///
    /// Failing an already failed claim is a no-op.
    pub fn fail(&self, transaction_id: &str, reason: &str) -> Result<ClaimTransaction, ClaimError> {
        self.fail_at(transaction_id, reason, Utc::now())
    }

    pub fn fail_at(
        &self,
        transaction_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimTransaction, ClaimError> {
        self.fail_inner(transaction_id, reason, now).map(|(claim, _)| claim)
    }

    /// Returns the claim and whether this call moved it to `failed`.
    fn fail_inner(
        &self,
        transaction_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(ClaimTransaction, bool), ClaimError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let record = get_record::<ClaimTransaction>(self.store.as_ref(), Table::Claims, transaction_id)?
                .ok_or(ClaimError::NotFound)?;
            match record.value.status {
                ClaimStatus::Failed => return Ok((record.value, false)),
                ClaimStatus::Confirmed => {
                    return Err(ClaimError::InvalidState {
                        status: ClaimStatus::Confirmed,
                    })
                }
                ClaimStatus::Pending => {}
            }

            let user_id = record.value.user_id.clone();
            let slot = get_record::<PendingSlot>(self.store.as_ref(), Table::PendingClaims, &user_id)?;

            let mut failed = record.value.clone();
            failed.status = ClaimStatus::Failed;
            failed.failure_reason = Some(reason.to_string());
            failed.resolved_at = Some(now);

            let mut ops = vec![WriteOp::put(
                Table::Claims,
                transaction_id,
                record.expect(),
                encode(&failed)?,
            )];
            if let Some(slot) = slot.filter(|s| s.value.transaction_id == transaction_id) {
                ops.push(WriteOp::delete(Table::PendingClaims, user_id.as_str(), slot.expect()));
            }

            if self.store.commit(ops)?.is_applied() {
                tracing::info!(transaction_id, user_id = %user_id, reason, "Claim failed");
                return Ok((failed, true));
            }
        }
        Err(StoreError::Contention(format!("claim {transaction_id}")).into())
    }

    /// Fail every pending claim past its confirmation TTL. Returns the count.
    pub fn expire_stale(&self) -> Result<usize, ClaimError> {
        self.expire_stale_at(Utc::now())
    }

    pub fn expire_stale_at(&self, now: DateTime<Utc>) -> Result<usize, ClaimError> {
        let mut expired = 0;
        for (id, record) in scan_records::<ClaimTransaction>(self.store.as_ref(), Table::Claims)? {
            if record.value.status != ClaimStatus::Pending || !self.is_stale(record.value.created_at, now) {
                continue;
            }
            match self.fail_inner(&id, CONFIRMATION_TIMEOUT, now) {
                Ok((_, true)) => expired += 1,
                // Resolved concurrently
                Ok((_, false)) | Err(ClaimError::InvalidState { .. }) | Err(ClaimError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    /// Read a claim, failing it first if it timed out.
    pub fn get(&self, transaction_id: &str) -> Result<ClaimTransaction, ClaimError> {
        self.get_at(transaction_id, Utc::now())
    }

    pub fn get_at(&self, transaction_id: &str, now: DateTime<Utc>) -> Result<ClaimTransaction, ClaimError> {
        let claim = get_record::<ClaimTransaction>(self.store.as_ref(), Table::Claims, transaction_id)?
            .ok_or(ClaimError::NotFound)?
            .value;
        if claim.status == ClaimStatus::Pending && self.is_stale(claim.created_at, now) {
            return match self.fail_inner(transaction_id, CONFIRMATION_TIMEOUT, now) {
                Ok((claim, _)) => Ok(claim),
                // Confirmed in the meantime
                Err(ClaimError::InvalidState { .. }) => self.get_at(transaction_id, now),
                Err(e) => Err(e),
            };
        }
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::accounts::AccountRegistry;
    use crate::rewards::settlement::TransactionIdFormat;
    use crate::storage::MemoryStore;
    use chrono::TimeDelta;

    struct Fixture {
        registry: AccountRegistry,
        claims: ClaimService,
        user_id: String,
        store: Arc<dyn KvStore>,
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fixture_with(config: RewardPoolConfig) -> Fixture {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let registry = AccountRegistry::new(store.clone(), config);
        let claims = ClaimService::new(store.clone(), Arc::new(TransactionIdFormat), config);
        let (user, _) = registry.connect_wallet_at("wallet-1", t0()).unwrap();
        Fixture {
            registry,
            claims,
            user_id: user.id,
            store,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RewardPoolConfig::default())
    }

    fn sig(n: u8) -> String {
        bs58::encode([n; 64]).into_string()
    }

    fn claim_count(store: &Arc<dyn KvStore>) -> usize {
        store.scan(Table::Claims).unwrap().len()
    }

    #[test]
    fn create_uses_accrual_amount() {
        let f = fixture();
        let claim = f.claims.create_at(&f.user_id, None, t0() + TimeDelta::hours(48)).unwrap();
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert_eq!(claim.amount, 2_400_000_000);
    }

    #[test]
    fn second_pending_claim_is_rejected_without_new_row() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(30);
        let first = f.claims.create_at(&f.user_id, None, now).unwrap();

        let second = f.claims.create_at(&f.user_id, None, now + TimeDelta::minutes(1));
        match second {
            Err(ClaimError::InProgress { transaction_id }) => assert_eq!(transaction_id, first.id),
            other => panic!("expected InProgress, got {other:?}"),
        }
        assert_eq!(claim_count(&f.store), 1);
    }

    #[test]
    fn concurrent_creates_admit_one() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(30);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let claims = f.claims.clone();
                let user_id = f.user_id.clone();
                std::thread::spawn(move || claims.create_at(&user_id, None, now).is_ok())
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(created, 1);
        assert_eq!(claim_count(&f.store), 1);
    }

    #[test]
    fn confirm_credits_exactly_once() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();

        let confirmed = f.claims.confirm_at(&claim.id, &sig(1), now + TimeDelta::minutes(2)).unwrap();
        assert_eq!(confirmed.status, ClaimStatus::Confirmed);
        let again = f.claims.confirm_at(&claim.id, &sig(1), now + TimeDelta::minutes(3)).unwrap();
        assert_eq!(again, confirmed);

        let account = f.registry.account(&f.user_id).unwrap().unwrap();
        assert_eq!(account.total_earned, 2_400_000_000);
        assert_eq!(account.total_claims, 1);
        assert_eq!(account.last_claim_timestamp, Some(now + TimeDelta::minutes(2)));
        assert_eq!(f.registry.pool().unwrap().total_distributed, 2_400_000_000);

        let different = f.claims.confirm_at(&claim.id, &sig(2), now + TimeDelta::minutes(4));
        assert!(matches!(different, Err(ClaimError::Conflict)));
    }

    #[test]
    fn concurrent_confirms_credit_once() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let claims = f.claims.clone();
                let id = claim.id.clone();
                std::thread::spawn(move || claims.confirm_at(&id, &sig(1), now).is_ok())
            })
            .collect();
        assert!(handles.into_iter().all(|h| h.join().unwrap()));

        let account = f.registry.account(&f.user_id).unwrap().unwrap();
        assert_eq!(account.total_earned, 2_400_000_000);
        assert_eq!(account.total_claims, 1);
    }

    #[test]
    fn confirmed_claim_resets_eligibility() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();
        f.claims.confirm_at(&claim.id, &sig(1), now).unwrap();

        let result = f.claims.create_at(&f.user_id, None, now + TimeDelta::hours(1));
        match result {
            Err(ClaimError::NotEligible { retry_after_secs }) => assert_eq!(retry_after_secs, 23 * 3600),
            other => panic!("expected NotEligible, got {other:?}"),
        }
    }

    #[test]
    fn rejected_settlement_leaves_claim_pending() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();

        let result = f.claims.confirm_at(&claim.id, "not-a-signature", now);
        assert!(matches!(result, Err(ClaimError::SettlementRejected)));
        assert_eq!(f.claims.get_at(&claim.id, now).unwrap().status, ClaimStatus::Pending);
    }

    #[test]
    fn sweep_expires_stale_claim_and_frees_slot() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();

        assert_eq!(f.claims.expire_stale_at(now + TimeDelta::minutes(5)).unwrap(), 0);
        let later = now + TimeDelta::minutes(11);
        assert_eq!(f.claims.expire_stale_at(later).unwrap(), 1);

        let expired = f.claims.get_at(&claim.id, later).unwrap();
        assert_eq!(expired.status, ClaimStatus::Failed);
        assert_eq!(expired.failure_reason.as_deref(), Some(CONFIRMATION_TIMEOUT));

        let next = f.claims.create_at(&f.user_id, None, later).unwrap();
        assert_ne!(next.id, claim.id);
    }

    #[test]
    fn stale_claim_expires_lazily() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();
        let later = now + TimeDelta::minutes(15);

        // A new create fails the stale claim without a sweep
        let next = f.claims.create_at(&f.user_id, None, later).unwrap();
        assert_eq!(next.status, ClaimStatus::Pending);
        assert_eq!(f.claims.get_at(&claim.id, later).unwrap().status, ClaimStatus::Failed);
    }

    #[test]
    fn confirming_a_timed_out_claim_fails_it() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();

        let result = f.claims.confirm_at(&claim.id, &sig(1), now + TimeDelta::minutes(11));
        assert!(matches!(
            result,
            Err(ClaimError::InvalidState {
                status: ClaimStatus::Failed
            })
        ));
        assert_eq!(f.registry.account(&f.user_id).unwrap().unwrap().total_earned, 0);
    }

    #[test]
    fn fail_transitions() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let claim = f.claims.create_at(&f.user_id, None, now).unwrap();

        let failed = f.claims.fail_at(&claim.id, "user cancelled", now).unwrap();
        assert_eq!(failed.status, ClaimStatus::Failed);
        // no-op on repeat, reason unchanged
        let again = f.claims.fail_at(&claim.id, "other", now).unwrap();
        assert_eq!(again.failure_reason.as_deref(), Some("user cancelled"));

        assert!(matches!(
            f.claims.confirm_at(&claim.id, &sig(1), now),
            Err(ClaimError::InvalidState { .. })
        ));

        let second = f.claims.create_at(&f.user_id, None, now).unwrap();
        f.claims.confirm_at(&second.id, &sig(3), now).unwrap();
        assert!(matches!(
            f.claims.fail_at(&second.id, "late", now),
            Err(ClaimError::InvalidState {
                status: ClaimStatus::Confirmed
            })
        ));
        assert!(matches!(f.claims.fail_at("missing", "x", now), Err(ClaimError::NotFound)));
    }

    #[test]
    fn pool_and_account_switches_block_claims() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);

        f.registry.set_pool_active(false).unwrap();
        assert!(matches!(
            f.claims.create_at(&f.user_id, None, now),
            Err(ClaimError::PoolInactive)
        ));
        f.registry.set_pool_active(true).unwrap();

        f.registry.set_active(&f.user_id, false).unwrap();
        assert!(matches!(
            f.claims.create_at(&f.user_id, None, now),
            Err(ClaimError::AccountInactive)
        ));

        assert!(matches!(
            f.claims.create_at("stranger", None, now),
            Err(ClaimError::AccountNotFound(_))
        ));
    }

    #[test]
    fn expected_amount_must_match() {
        let f = fixture();
        let now = t0() + TimeDelta::hours(48);
        let result = f.claims.create_at(&f.user_id, Some(1), now);
        assert!(matches!(
            result,
            Err(ClaimError::AmountMismatch {
                expected: 1,
                available: 2_400_000_000
            })
        ));
        assert!(f.claims.create_at(&f.user_id, Some(2_400_000_000), now).is_ok());
    }

    #[test]
    fn zero_accrual_is_not_claimable() {
        let f = fixture_with(RewardPoolConfig {
            rate_per_hour: 0,
            min_claim_interval_hours: 0,
            ..RewardPoolConfig::default()
        });
        let result = f.claims.create_at(&f.user_id, None, t0() + TimeDelta::hours(1));
        assert!(matches!(result, Err(ClaimError::NoRewardsAvailable)));
    }

    #[test]
    fn pool_parameters_come_from_the_pool_record() {
        let f = fixture();
        f.registry
            .update_pool(&crate::rewards::PoolUpdate {
                rate_per_hour: Some(10),
                min_claim_interval_hours: Some(1),
                max_daily_reward: Some(25),
                ..Default::default()
            })
            .unwrap();

        let now = t0() + TimeDelta::hours(2);
        let accrual = f.claims.available_at(&f.user_id, now).unwrap();
        assert!(accrual.can_claim);
        assert_eq!(accrual.available_amount, 20);

        let claim = f.claims.create_at(&f.user_id, None, t0() + TimeDelta::hours(5)).unwrap();
        assert_eq!(claim.amount, 25);
    }
}
