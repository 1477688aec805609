// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token-Bucket Rate Limiter
//!
//! One bucket per `(policy, key)`. A bucket holds up to `capacity` points and
//! refills continuously at `capacity / window`. Each admitted request costs one
//! point. When a request finds the bucket empty and the policy has a block
//! duration, the key is blocked outright until the block elapses, regardless
//! of how many points have refilled in the meantime.
//!
//! ## Policies
//!
//! | Policy | Capacity | Window | Block |
//! |--------|----------|--------|-------|
//! | `general` | 100 | 15 min | - |
//! | `auth` | 10 | 15 min | 15 min |
//! | `claim` | 5 | 1 h | 1 h |
//!
//! ## Atomicity
//!
//! Check, refill and decrement happen on a snapshot of the bucket that is
//! written back with [`KvStore::update_if`] against the version it was read
//! at. A lost race re-reads and re-decides, so concurrent callers can never
//! be admitted more often than the bucket allows.

pub mod middleware;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::storage::{encode, get_record, scan_records, KvStore, StoreError, Table, WriteOp};

pub use middleware::{client_key, client_key_from_parts, general_rate_limit, ClientKey};

/// Upper bound on conditional-update attempts per call.
const MAX_CAS_ATTEMPTS: usize = 16;

// =============================================================================
// Policies
// =============================================================================

/// Named rate-limit policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    General,
    Auth,
    Claim,
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::General => "general",
            Policy::Auth => "auth",
            Policy::Claim => "claim",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Capacity, refill window and optional block for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub capacity: u32,
    pub window: TimeDelta,
    pub block: Option<TimeDelta>,
}

impl PolicyConfig {
    pub fn new(capacity: u32, window: TimeDelta, block: Option<TimeDelta>) -> Self {
        Self {
            capacity: capacity.max(1),
            window: window.max(TimeDelta::milliseconds(1)),
            block,
        }
    }

    /// Milliseconds needed to refill `points` points (rounded up).
    fn refill_millis(&self, points: u32) -> i64 {
        let window_ms = self.window.num_milliseconds() as i128;
        let numerator = window_ms * points as i128;
        let capacity = self.capacity as i128;
        ((numerator + capacity - 1) / capacity) as i64
    }
}

/// The configured set of policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicies {
    pub general: PolicyConfig,
    pub auth: PolicyConfig,
    pub claim: PolicyConfig,
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            general: PolicyConfig::new(100, TimeDelta::minutes(15), None),
            auth: PolicyConfig::new(10, TimeDelta::minutes(15), Some(TimeDelta::minutes(15))),
            claim: PolicyConfig::new(5, TimeDelta::hours(1), Some(TimeDelta::hours(1))),
        }
    }
}

impl RateLimitPolicies {
    pub fn get(&self, policy: Policy) -> PolicyConfig {
        match policy {
            Policy::General => self.general,
            Policy::Auth => self.auth,
            Policy::Claim => self.claim,
        }
    }
}

// =============================================================================
// Bucket
// =============================================================================

/// Persisted bucket state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBucket {
    pub policy: Policy,
    pub key: String,
    pub remaining: u32,
    /// Instant from which un-credited refill is measured.
    pub window_start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitBucket {
    fn fresh(policy: Policy, key: &str, config: &PolicyConfig, now: DateTime<Utc>) -> Self {
        Self {
            policy,
            key: key.to_string(),
            remaining: config.capacity,
            window_start: now,
            blocked_until: None,
        }
    }

    /// Credit whole points for the time elapsed since `window_start`.
    fn refill(&mut self, config: &PolicyConfig, now: DateTime<Utc>) {
        if self.remaining >= config.capacity {
            self.remaining = config.capacity;
            self.window_start = now;
            return;
        }
        if now <= self.window_start {
            return;
        }

        let elapsed_ms = (now - self.window_start).num_milliseconds() as i128;
        let window_ms = config.window.num_milliseconds() as i128;
        let earned = (elapsed_ms * config.capacity as i128 / window_ms)
            .min(config.capacity as i128) as u32;
        if earned == 0 {
            return;
        }

        let total = self.remaining.saturating_add(earned);
        if total >= config.capacity {
            self.remaining = config.capacity;
            self.window_start = now;
        } else {
            self.remaining = total;
            // Advance by exactly the time the credited points represent
            let credited_ms = (earned as i128 * window_ms / config.capacity as i128) as i64;
            self.window_start += TimeDelta::milliseconds(credited_ms);
        }
    }

    /// When the bucket will be full again.
    fn reset_at(&self, config: &PolicyConfig, now: DateTime<Utc>) -> DateTime<Utc> {
        let missing = config.capacity.saturating_sub(self.remaining);
        if missing == 0 {
            return now;
        }
        self.window_start + TimeDelta::milliseconds(config.refill_millis(missing))
    }

    /// When the next single point becomes available.
    fn next_point_at(&self, config: &PolicyConfig) -> DateTime<Utc> {
        self.window_start + TimeDelta::milliseconds(config.refill_millis(1))
    }
}

// =============================================================================
// Results & Errors
// =============================================================================

/// Values for the `X-RateLimit-*` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from(self.reset_at.timestamp().max(0) as u64),
        );
    }
}

/// A successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub info: RateLimitInfo,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Too many requests for policy {policy}")]
    Exceeded {
        policy: Policy,
        retry_after: TimeDelta,
        info: RateLimitInfo,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whole seconds to wait, rounded up and at least one.
pub fn retry_after_secs(delta: TimeDelta) -> u64 {
    let ms = delta.num_milliseconds().max(0) as u64;
    ms.div_ceil(1000).max(1)
}

impl From<RateLimitError> for ApiError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Exceeded {
                retry_after, info, ..
            } => ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", e.to_string())
                .with_retry_after(retry_after_secs(retry_after))
                .with_rate_limit(info),
            RateLimitError::Store(inner) => inner.into(),
        }
    }
}

// =============================================================================
// RateLimiter
// =============================================================================

/// Token-bucket admission control over a shared [`KvStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    policies: RateLimitPolicies,
}

fn bucket_key(policy: Policy, key: &str) -> String {
    format!("{}:{}", policy.name(), key)
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, policies: RateLimitPolicies) -> Self {
        Self { store, policies }
    }

    pub fn policies(&self) -> &RateLimitPolicies {
        &self.policies
    }

    /// Consume one point for `key` under `policy`.
    pub fn consume(&self, policy: Policy, key: &str) -> Result<Admission, RateLimitError> {
        self.consume_at(policy, key, Utc::now())
    }

    /// [`consume`](Self::consume) at an explicit instant.
    pub fn consume_at(
        &self,
        policy: Policy,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, RateLimitError> {
        let config = self.policies.get(policy);
        let store_key = bucket_key(policy, key);

        for _ in 0..MAX_CAS_ATTEMPTS {
            let record = get_record::<RateLimitBucket>(self.store.as_ref(), Table::Buckets, &store_key)?;
            let version = record.as_ref().map(|r| r.version);
            let original = record.map(|r| r.value);
            let mut bucket = original
                .clone()
                .unwrap_or_else(|| RateLimitBucket::fresh(policy, key, &config, now));

            // An active block dominates any refill
            if let Some(blocked_until) = bucket.blocked_until {
                if blocked_until > now {
                    return Err(RateLimitError::Exceeded {
                        policy,
                        retry_after: blocked_until - now,
                        info: RateLimitInfo {
                            limit: config.capacity,
                            remaining: 0,
                            reset_at: blocked_until,
                        },
                    });
                }
                bucket.blocked_until = None;
                bucket.remaining = config.capacity;
                bucket.window_start = now;
            }

            bucket.refill(&config, now);

            let outcome = if bucket.remaining > 0 {
                bucket.remaining -= 1;
                let reset_at = bucket.reset_at(&config, now);
                Ok(Admission {
                    remaining: bucket.remaining,
                    reset_at,
                    info: RateLimitInfo {
                        limit: config.capacity,
                        remaining: bucket.remaining,
                        reset_at,
                    },
                })
            } else {
                let (retry_at, reset_at) = match config.block {
                    Some(block) => {
                        let until = now + block;
                        bucket.blocked_until = Some(until);
                        (until, until)
                    }
                    None => (bucket.next_point_at(&config), bucket.reset_at(&config, now)),
                };
                Err(RateLimitError::Exceeded {
                    policy,
                    retry_after: retry_at - now,
                    info: RateLimitInfo {
                        limit: config.capacity,
                        remaining: 0,
                        reset_at,
                    },
                })
            };

            if original.as_ref() == Some(&bucket) {
                return outcome;
            }

            if self
                .store
                .update_if(Table::Buckets, &store_key, version, encode(&bucket)?)?
                .is_applied()
            {
                if outcome.is_err() {
                    tracing::info!(%policy, key, blocked_until = ?bucket.blocked_until, "Rate limit exceeded");
                }
                return outcome;
            }
        }

        Err(StoreError::Contention(store_key).into())
    }

    /// Remove buckets that have fully refilled and are not blocked.
    pub fn purge_idle(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut purged = 0;
        for (key, record) in scan_records::<RateLimitBucket>(self.store.as_ref(), Table::Buckets)? {
            let config = self.policies.get(record.value.policy);
            let mut bucket = record.value.clone();
            if bucket.blocked_until.is_some_and(|until| until > now) {
                continue;
            }
            bucket.refill(&config, now);
            if bucket.remaining < config.capacity {
                continue;
            }
            if self
                .store
                .commit(vec![WriteOp::delete(Table::Buckets, key, record.expect())])?
                .is_applied()
            {
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), RateLimitPolicies::default())
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn admits_up_to_capacity_then_rejects() {
        let limiter = limiter();
        let now = t0();
        for i in 0..10 {
            let admission = limiter.consume_at(Policy::Auth, "1.2.3.4", now).unwrap();
            assert_eq!(admission.remaining, 9 - i);
        }
        let err = limiter.consume_at(Policy::Auth, "1.2.3.4", now).unwrap_err();
        match err {
            RateLimitError::Exceeded { retry_after, .. } => {
                assert_eq!(retry_after, TimeDelta::minutes(15));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn block_dominates_refill_and_lifts_after_duration() {
        let limiter = limiter();
        let now = t0();
        for _ in 0..5 {
            limiter.consume_at(Policy::Claim, "user-1", now).unwrap();
        }
        assert!(limiter.consume_at(Policy::Claim, "user-1", now).is_err());

        // Plenty of refill time has passed, but the block is still active
        let later = now + TimeDelta::minutes(59);
        match limiter.consume_at(Policy::Claim, "user-1", later).unwrap_err() {
            RateLimitError::Exceeded { retry_after, .. } => {
                assert_eq!(retry_after, TimeDelta::minutes(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let after_block = now + TimeDelta::hours(1) + TimeDelta::seconds(1);
        let admission = limiter.consume_at(Policy::Claim, "user-1", after_block).unwrap();
        assert_eq!(admission.remaining, 4);
    }

    #[test]
    fn general_policy_has_no_block_and_refills_proportionally() {
        let limiter = limiter();
        let now = t0();
        for _ in 0..100 {
            limiter.consume_at(Policy::General, "ip", now).unwrap();
        }
        match limiter.consume_at(Policy::General, "ip", now).unwrap_err() {
            // one point every 9 seconds
            RateLimitError::Exceeded { retry_after, .. } => {
                assert_eq!(retry_after, TimeDelta::seconds(9));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let admission = limiter
            .consume_at(Policy::General, "ip", now + TimeDelta::seconds(18))
            .unwrap();
        assert_eq!(admission.remaining, 1);
    }

    #[test]
    fn keys_and_policies_are_isolated() {
        let limiter = limiter();
        let now = t0();
        for _ in 0..10 {
            limiter.consume_at(Policy::Auth, "a", now).unwrap();
        }
        assert!(limiter.consume_at(Policy::Auth, "a", now).is_err());
        assert!(limiter.consume_at(Policy::Auth, "b", now).is_ok());
        assert!(limiter.consume_at(Policy::General, "a", now).is_ok());
    }

    #[test]
    fn concurrent_consumers_never_exceed_capacity() {
        let limiter = limiter();
        let now = t0();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| limiter.consume_at(Policy::Auth, "shared", now).is_ok())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn purge_idle_drops_refilled_buckets_only() {
        let limiter = limiter();
        let now = t0();
        limiter.consume_at(Policy::General, "idle", now).unwrap();
        for _ in 0..6 {
            let _ = limiter.consume_at(Policy::Claim, "blocked", now);
        }

        let purged = limiter.purge_idle(now + TimeDelta::minutes(30)).unwrap();
        assert_eq!(purged, 1);
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(TimeDelta::milliseconds(1)), 1);
        assert_eq!(retry_after_secs(TimeDelta::milliseconds(1500)), 2);
        assert_eq!(retry_after_secs(TimeDelta::seconds(900)), 900);
    }
}
