// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Users, reward accounts and pool state.
//!
//! A user is created on the first successful wallet login. The user record,
//! its reward account and the pool's participant count are written in one
//! commit, so `participant_count` always equals the number of accounts.
//!
//! The pool record also carries the accrual parameters. It is seeded from
//! [`RewardPoolConfig`] on first write and afterwards only changes through
//! [`AccountRegistry::update_pool`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::ClaimError;
use super::RewardPoolConfig;
use crate::storage::{
    encode, get_record, Expect, KvStore, Record, StoreError, StoreResult, Table, WriteOp,
};

const MAX_CAS_ATTEMPTS: usize = 8;
pub(crate) const POOL_KEY: &str = "stats";

/// A wallet owner known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user reward bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RewardAccount {
    pub user_id: String,
    /// Sum of confirmed claims in smallest units
    pub total_earned: u64,
    pub total_claims: u64,
    pub last_claim_timestamp: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}

impl RewardAccount {
    fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_earned: 0,
            total_claims: 0,
            last_claim_timestamp: None,
            registered_at: now,
            active: true,
        }
    }

    /// Start of the current accrual period.
    pub fn accrual_start(&self) -> DateTime<Utc> {
        self.last_claim_timestamp.unwrap_or(self.registered_at)
    }
}

/// Pool switch, accrual parameters and statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolState {
    pub active: bool,
    /// Smallest units accrued per hour
    pub rate_per_hour: u64,
    pub min_claim_interval_hours: u64,
    /// Cap on a single claim
    pub max_daily_reward: u64,
    pub total_distributed: u64,
    pub participant_count: u64,
}

impl PoolState {
    fn seeded(defaults: &RewardPoolConfig) -> Self {
        Self {
            active: defaults.active,
            rate_per_hour: defaults.rate_per_hour,
            min_claim_interval_hours: defaults.min_claim_interval_hours,
            max_daily_reward: defaults.max_daily_reward,
            total_distributed: 0,
            participant_count: 0,
        }
    }
}

/// Partial pool change. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolUpdate {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub rate_per_hour: Option<u64>,
    #[serde(default)]
    pub min_claim_interval_hours: Option<u64>,
    #[serde(default)]
    pub max_daily_reward: Option<u64>,
}

impl PoolUpdate {
    fn is_empty(&self) -> bool {
        self.active.is_none()
            && self.rate_per_hour.is_none()
            && self.min_claim_interval_hours.is_none()
            && self.max_daily_reward.is_none()
    }

    fn apply(&self, pool: &mut PoolState) {
        if let Some(active) = self.active {
            pool.active = active;
        }
        if let Some(rate) = self.rate_per_hour {
            pool.rate_per_hour = rate;
        }
        if let Some(interval) = self.min_claim_interval_hours {
            pool.min_claim_interval_hours = interval;
        }
        if let Some(cap) = self.max_daily_reward {
            pool.max_daily_reward = cap;
        }
    }
}

/// Read the pool record, falling back to a fresh pool seeded from `defaults`.
pub(crate) fn load_pool(
    store: &dyn KvStore,
    defaults: &RewardPoolConfig,
) -> StoreResult<(PoolState, Option<u64>)> {
    Ok(match get_record::<PoolState>(store, Table::Pool, POOL_KEY)? {
        Some(Record { value, version }) => (value, Some(version)),
        None => (PoolState::seeded(defaults), None),
    })
}

#[derive(Clone)]
pub struct AccountRegistry {
    store: Arc<dyn KvStore>,
    pool_defaults: RewardPoolConfig,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn KvStore>, pool_defaults: RewardPoolConfig) -> Self {
        Self {
            store,
            pool_defaults,
        }
    }

    /// Find or create the user owning `wallet_address`.
    ///
    /// Returns the user and whether it was created by this call.
    pub fn connect_wallet(&self, wallet_address: &str) -> Result<(User, bool), StoreError> {
        self.connect_wallet_at(wallet_address, Utc::now())
    }

    pub fn connect_wallet_at(
        &self,
        wallet_address: &str,
        now: DateTime<Utc>,
    ) -> Result<(User, bool), StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            if let Some(existing) = get_record::<User>(self.store.as_ref(), Table::Users, wallet_address)? {
                return Ok((existing.value, false));
            }

            let user = User {
                id: Uuid::new_v4().to_string(),
                wallet_address: wallet_address.to_string(),
                created_at: now,
            };
            let (mut pool, pool_version) = load_pool(self.store.as_ref(), &self.pool_defaults)?;
            pool.participant_count += 1;

            let ops = vec![
                WriteOp::put(Table::Users, wallet_address, Expect::Absent, encode(&user)?),
                WriteOp::put(
                    Table::Accounts,
                    user.id.as_str(),
                    Expect::Absent,
                    encode(&RewardAccount::new(&user.id, now))?,
                ),
                WriteOp::put(Table::Pool, POOL_KEY, Expect::from_read(pool_version), encode(&pool)?),
            ];
            if self.store.commit(ops)?.is_applied() {
                tracing::info!(user_id = %user.id, wallet = wallet_address, "Registered new user");
                return Ok((user, true));
            }
        }
        Err(StoreError::Contention(format!("user {wallet_address}")))
    }

    /// Create a reward account for an existing user id (idempotent).
    pub fn register(&self, user_id: &str) -> Result<RewardAccount, StoreError> {
        self.register_at(user_id, Utc::now())
    }

    pub fn register_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<RewardAccount, StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            if let Some(existing) = self.account(user_id)? {
                return Ok(existing);
            }

            let account = RewardAccount::new(user_id, now);
            let (mut pool, pool_version) = load_pool(self.store.as_ref(), &self.pool_defaults)?;
            pool.participant_count += 1;

            let ops = vec![
                WriteOp::put(Table::Accounts, user_id, Expect::Absent, encode(&account)?),
                WriteOp::put(Table::Pool, POOL_KEY, Expect::from_read(pool_version), encode(&pool)?),
            ];
            if self.store.commit(ops)?.is_applied() {
                return Ok(account);
            }
        }
        Err(StoreError::Contention(format!("account {user_id}")))
    }

    pub fn account(&self, user_id: &str) -> Result<Option<RewardAccount>, StoreError> {
        Ok(get_record::<RewardAccount>(self.store.as_ref(), Table::Accounts, user_id)?.map(|r| r.value))
    }

    /// Activate or deactivate one account.
    pub fn set_active(&self, user_id: &str, active: bool) -> Result<RewardAccount, ClaimError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let record = get_record::<RewardAccount>(self.store.as_ref(), Table::Accounts, user_id)?
                .ok_or_else(|| ClaimError::AccountNotFound(user_id.to_string()))?;
            if record.value.active == active {
                return Ok(record.value);
            }

            let mut account = record.value.clone();
            account.active = active;
            if self
                .store
                .update_if(Table::Accounts, user_id, Some(record.version), encode(&account)?)?
                .is_applied()
            {
                tracing::info!(user_id, active, "Reward account activation changed");
                return Ok(account);
            }
        }
        Err(StoreError::Contention(format!("account {user_id}")).into())
    }

    pub fn pool(&self) -> Result<PoolState, StoreError> {
        Ok(load_pool(self.store.as_ref(), &self.pool_defaults)?.0)
    }

    /// Open or close the pool for new claims.
    pub fn set_pool_active(&self, active: bool) -> Result<PoolState, ClaimError> {
        self.update_pool(&PoolUpdate {
            active: Some(active),
            ..PoolUpdate::default()
        })
    }

    /// Change the pool switch and accrual parameters.
    ///
    /// New parameters apply to every later accrual computation, including
    /// time already accrued since an account's last claim. Pending claims
    /// keep the amount they were created with.
    pub fn update_pool(&self, update: &PoolUpdate) -> Result<PoolState, ClaimError> {
        if update.is_empty() {
            return Err(ClaimError::InvalidPoolConfig(
                "at least one field must be set".to_string(),
            ));
        }
        if update.max_daily_reward == Some(0) {
            return Err(ClaimError::InvalidPoolConfig(
                "max_daily_reward must be positive".to_string(),
            ));
        }

        for _ in 0..MAX_CAS_ATTEMPTS {
            let (mut pool, version) = load_pool(self.store.as_ref(), &self.pool_defaults)?;
            update.apply(&mut pool);
            if self
                .store
                .update_if(Table::Pool, POOL_KEY, version, encode(&pool)?)?
                .is_applied()
            {
                tracing::info!(
                    active = pool.active,
                    rate_per_hour = pool.rate_per_hour,
                    min_claim_interval_hours = pool.min_claim_interval_hours,
                    max_daily_reward = pool.max_daily_reward,
                    "Reward pool updated"
                );
                return Ok(pool);
            }
        }
        Err(StoreError::Contention("pool".to_string()).into())
    }
}
