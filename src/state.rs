// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{ChallengeService, SessionManager};
use crate::config::{AppConfig, StoreBackend};
use crate::ratelimit::RateLimiter;
use crate::rewards::{AccountRegistry, ClaimService, SettlementVerifier, TransactionIdFormat};
use crate::storage::{KvStore, MemoryStore, RedbStore, StoreError};

/// Shared handles for every request.
///
/// All services share one [`KvStore`] and keep no state of their own. With
/// the embedded backends that means one process; several instances need a
/// networked [`KvStore`] implementation behind the same trait.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub rate_limiter: RateLimiter,
    pub challenges: ChallengeService,
    pub sessions: SessionManager,
    pub accounts: AccountRegistry,
    pub claims: ClaimService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire every service over `store`.
    pub fn new(
        store: Arc<dyn KvStore>,
        settlement: Arc<dyn SettlementVerifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(store.clone(), config.rate_limits),
            challenges: ChallengeService::new(
                store.clone(),
                config.wallet_scheme.verifier(),
                config.challenge.clone(),
            ),
            sessions: SessionManager::new(store.clone(), config.session.clone()),
            accounts: AccountRegistry::new(store.clone(), config.rewards),
            claims: ClaimService::new(store.clone(), settlement, config.rewards),
            store,
            config: Arc::new(config),
        }
    }

    /// Open the configured backend and wire the services.
    pub fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn KvStore> = match &config.store {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Redb(path) => Arc::new(RedbStore::open(path)?),
        };
        Ok(Self::new(store, Arc::new(TransactionIdFormat), config))
    }

    /// In-memory state, mainly for tests.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TransactionIdFormat),
            config,
        )
    }
}
