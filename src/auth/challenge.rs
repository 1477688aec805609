// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet login challenges.
//!
//! ## Flow
//!
//! 1. `issue_challenge(wallet)` stores a fresh 32-byte nonce for the wallet,
//!    replacing (and thereby cancelling) any earlier challenge.
//! 2. The wallet signs the returned message.
//! 3. `verify(wallet, signature, message)` checks the challenge and the
//!    signature and marks the challenge consumed.
//!
//! The consume step is a conditional update against the version read in
//! step 3, so two concurrent verifies of the same challenge cannot both win.
//! The consumed record stays behind as a tombstone so that a replay is
//! reported as `NonceAlreadyUsed`.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{NonceError, SignatureError, VerifyError};
use super::message::ChallengeMessage;
use super::wallet::WalletVerifier;
use crate::storage::{
    encode, get_record, scan_records, Expect, KvStore, StoreError, Table, WriteOp,
};

/// Default challenge lifetime.
pub const DEFAULT_CHALLENGE_TTL: TimeDelta = TimeDelta::minutes(5);

/// Default maximum age of the signed message timestamp.
pub const DEFAULT_MAX_MESSAGE_AGE: TimeDelta = TimeDelta::minutes(5);

const NONCE_BYTES: usize = 32;
const MAX_CAS_ATTEMPTS: usize = 4;

/// Stored challenge for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceChallenge {
    pub wallet_address: String,
    pub nonce: String,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub consumed_at: Option<DateTime<Utc>>,
}

/// What the client needs to sign.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedChallenge {
    /// Hex-encoded 32-byte nonce
    pub nonce: String,
    /// Exact message to sign
    pub message: String,
    /// When the challenge stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Timing knobs for challenges.
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Domain shown in the first line of the message.
    pub domain: String,
    pub ttl: TimeDelta,
    pub max_message_age: TimeDelta,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            ttl: DEFAULT_CHALLENGE_TTL,
            max_message_age: DEFAULT_MAX_MESSAGE_AGE,
        }
    }
}

/// Issues and consumes login challenges.
#[derive(Clone)]
pub struct ChallengeService {
    store: Arc<dyn KvStore>,
    verifier: Arc<dyn WalletVerifier>,
    config: ChallengeConfig,
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl ChallengeService {
    pub fn new(
        store: Arc<dyn KvStore>,
        verifier: Arc<dyn WalletVerifier>,
        config: ChallengeConfig,
    ) -> Self {
        Self {
            store,
            verifier,
            config,
        }
    }

    pub fn verifier(&self) -> &Arc<dyn WalletVerifier> {
        &self.verifier
    }

    /// Issue a fresh challenge for `wallet_address`.
    pub fn issue_challenge(&self, wallet_address: &str) -> Result<IssuedChallenge, VerifyError> {
        self.issue_challenge_at(wallet_address, Utc::now())
    }

    pub fn issue_challenge_at(
        &self,
        wallet_address: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, VerifyError> {
        let wallet = self.verifier.normalize_address(wallet_address)?;
        // Second precision so the stored timestamp equals the rendered one
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);

        let message = ChallengeMessage {
            domain: self.config.domain.clone(),
            wallet_address: wallet.clone(),
            nonce: generate_nonce(),
            issued_at,
        };
        let challenge = NonceChallenge {
            wallet_address: wallet.clone(),
            nonce: message.nonce.clone(),
            message: message.render(),
            issued_at,
            expires_at: issued_at + self.config.ttl,
            consumed_at: None,
        };

        self.store.commit(vec![WriteOp::put(
            Table::Challenges,
            wallet.as_str(),
            Expect::Any,
            encode(&challenge)?,
        )])?;

        tracing::info!(wallet = %wallet, expires_at = %challenge.expires_at, "Issued login challenge");

        Ok(IssuedChallenge {
            nonce: challenge.nonce,
            message: challenge.message,
            expires_at: challenge.expires_at,
        })
    }

    /// Verify a signed challenge and consume it. Returns the normalised wallet.
    pub fn verify(
        &self,
        wallet_address: &str,
        signature: &str,
        message: &str,
    ) -> Result<String, VerifyError> {
        self.verify_at(wallet_address, signature, message, Utc::now())
    }

    pub fn verify_at(
        &self,
        wallet_address: &str,
        signature: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<String, VerifyError> {
        let wallet = self.verifier.normalize_address(wallet_address)?;
        let parsed = ChallengeMessage::parse(message)?;
        if parsed.domain != self.config.domain
            || self.verifier.normalize_address(&parsed.wallet_address)? != wallet
        {
            return Err(SignatureError::Invalid.into());
        }

        for _ in 0..MAX_CAS_ATTEMPTS {
            let record = get_record::<NonceChallenge>(self.store.as_ref(), Table::Challenges, &wallet)?
                .ok_or(NonceError::NotFound)?;
            let mut challenge = record.value.clone();

            if challenge.nonce != parsed.nonce {
                return Err(NonceError::NotFound.into());
            }
            if challenge.consumed_at.is_some() {
                return Err(NonceError::AlreadyUsed.into());
            }
            if now > challenge.expires_at {
                return Err(NonceError::Expired.into());
            }
            let age = now - parsed.issued_at;
            if age < TimeDelta::zero() || age > self.config.max_message_age {
                return Err(SignatureError::TimestampOutOfRange.into());
            }
            // Only the exact text that was issued may be signed.
            if message != challenge.message {
                return Err(SignatureError::Invalid.into());
            }
            if !self.verifier.verify(&wallet, message.as_bytes(), signature) {
                tracing::info!(wallet = %wallet, "Wallet signature rejected");
                return Err(SignatureError::Invalid.into());
            }

            challenge.consumed_at = Some(now);
            let outcome = self.store.commit(vec![WriteOp::put(
                Table::Challenges,
                wallet.as_str(),
                record.expect(),
                encode(&challenge)?,
            )])?;
            if outcome.is_applied() {
                return Ok(wallet);
            }
            // Lost the race: re-read and report whatever state won.
        }

        Err(StoreError::Contention(format!("challenge {wallet}")).into())
    }

    /// Drop challenges past their expiry (consumed or not).
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut purged = 0;
        for (key, record) in scan_records::<NonceChallenge>(self.store.as_ref(), Table::Challenges)? {
            if record.value.expires_at >= now {
                continue;
            }
            if self
                .store
                .commit(vec![WriteOp::delete(Table::Challenges, key, record.expect())])?
                .is_applied()
            {
                purged += 1;
            }
        }
        Ok(purged)
    }
}
