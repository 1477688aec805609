// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer session tokens.
//!
//! Tokens are HS256 JWTs carrying `{sub, sid, wallet, iss, aud, iat, exp}`.
//! A valid signature is necessary but not sufficient: the session record
//! stored under `sid` is authoritative, so revoking a session invalidates
//! every token minted for it.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{
    decode, encode as encode_jwt, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::claims::AuthenticatedUser;
use super::error::AuthError;
use super::roles::Role;
use crate::storage::{
    encode, get_record, scan_records, Expect, KvStore, StoreError, Table, WriteOp,
};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: TimeDelta = TimeDelta::days(7);

const MAX_CAS_ATTEMPTS: usize = 4;

/// Persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub wallet_address: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub sid: String,
    pub wallet: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub ttl: TimeDelta,
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// Issues, validates and revokes sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KvStore>,
    issuer: String,
    audience: String,
    ttl: TimeDelta,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KvStore>, config: SessionConfig) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            issuer: config.issuer,
            audience: config.audience,
            ttl: config.ttl,
        }
    }

    pub fn issue(&self, user_id: &str, wallet_address: &str) -> Result<IssuedSession, AuthError> {
        self.issue_at(user_id, wallet_address, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: &str,
        wallet_address: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            wallet_address: wallet_address.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
            active: true,
            revoked_at: None,
        };
        let claims = SessionClaims {
            sub: session.user_id.clone(),
            sid: session.session_id.clone(),
            wallet: session.wallet_address.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: session.expires_at.timestamp(),
        };

        let token = encode_jwt(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        self.store.commit(vec![WriteOp::put(
            Table::Sessions,
            session.session_id.as_str(),
            Expect::Absent,
            encode(&session)?,
        )])?;

        tracing::info!(user_id, session_id = %session.session_id, "Session issued");
        Ok(IssuedSession { token, session })
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Check the token signature, then the session record.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AuthenticatedUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        // Expiry is checked against `now` below so tests can pin the clock
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        let session = get_record::<Session>(self.store.as_ref(), Table::Sessions, &claims.sid)?
            .map(|r| r.value)
            .ok_or(AuthError::InvalidToken)?;
        if !session.active || session.user_id != claims.sub {
            return Err(AuthError::InvalidToken);
        }
        if session.expires_at <= now {
            return Err(AuthError::TokenExpired);
        }

        Ok(AuthenticatedUser {
            user_id: session.user_id,
            session_id: session.session_id,
            wallet_address: session.wallet_address,
            role: Role::User,
            expires_at: session.expires_at,
        })
    }

    /// Mark one session inactive. Returns whether anything changed.
    pub fn revoke(&self, session_id: &str) -> Result<bool, StoreError> {
        self.revoke_at(session_id, Utc::now())
    }

    pub fn revoke_at(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(record) = get_record::<Session>(self.store.as_ref(), Table::Sessions, session_id)?
            else {
                return Ok(false);
            };
            if !record.value.active {
                return Ok(false);
            }

            let mut session = record.value.clone();
            session.active = false;
            session.revoked_at = Some(now);
            if self
                .store
                .update_if(Table::Sessions, session_id, Some(record.version), encode(&session)?)?
                .is_applied()
            {
                tracing::info!(session_id, user_id = %session.user_id, "Session revoked");
                return Ok(true);
            }
        }
        Err(StoreError::Contention(format!("session {session_id}")))
    }

    /// Revoke every active session of `user_id` except `current_session_id`.
    pub fn revoke_all_except(
        &self,
        user_id: &str,
        current_session_id: &str,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for (session_id, record) in scan_records::<Session>(self.store.as_ref(), Table::Sessions)? {
            let session = &record.value;
            if session.user_id != user_id || session.session_id == current_session_id || !session.active
            {
                continue;
            }
            if self.revoke_at(&session_id, now)? {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    /// Remove sessions past expiry.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut purged = 0;
        for (key, record) in scan_records::<Session>(self.store.as_ref(), Table::Sessions)? {
            if record.value.expires_at > now {
                continue;
            }
            if self
                .store
                .commit(vec![WriteOp::delete(Table::Sessions, key, record.expect())])?
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

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(MemoryStore::new()),
            SessionConfig {
                secret: b"test-secret-test-secret-test-secret".to_vec(),
                issuer: "rewards-test".to_string(),
                audience: "rewards-clients".to_string(),
                ttl: DEFAULT_SESSION_TTL,
            },
        )
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-04-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn issued_token_verifies() {
        let m = manager();
        let issued = m.issue_at("user-1", "wallet-1", t0()).unwrap();
        let user = m.verify_at(&issued.token, t0() + TimeDelta::hours(1)).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.session_id, issued.session.session_id);
        assert_eq!(user.expires_at, t0() + TimeDelta::days(7));
    }

    #[test]
    fn expired_token_is_rejected() {
        let m = manager();
        let issued = m.issue_at("user-1", "wallet-1", t0()).unwrap();
        let result = m.verify_at(&issued.token, t0() + TimeDelta::days(8));
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn tampered_or_foreign_token_is_invalid() {
        let m = manager();
        let issued = m.issue_at("user-1", "wallet-1", t0()).unwrap();

        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert!(matches!(m.verify_at(&tampered, t0()), Err(AuthError::InvalidToken)));

        let other = SessionManager::new(
            Arc::new(MemoryStore::new()),
            SessionConfig {
                secret: b"another-secret-another-secret-000".to_vec(),
                issuer: "rewards-test".to_string(),
                audience: "rewards-clients".to_string(),
                ttl: DEFAULT_SESSION_TTL,
            },
        );
        assert!(matches!(other.verify_at(&issued.token, t0()), Err(AuthError::InvalidToken)));
        assert!(matches!(m.verify_at("not.a.jwt", t0()), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn revoked_session_fails_despite_valid_signature() {
        let m = manager();
        let issued = m.issue_at("user-1", "wallet-1", t0()).unwrap();
        assert!(m.revoke_at(&issued.session.session_id, t0()).unwrap());
        assert!(!m.revoke_at(&issued.session.session_id, t0()).unwrap());

        let result = m.verify_at(&issued.token, t0());
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn revoke_all_except_keeps_current() {
        let m = manager();
        let now = Utc::now();
        let current = m.issue_at("user-1", "wallet-1", now).unwrap();
        let other_a = m.issue_at("user-1", "wallet-1", now).unwrap();
        let other_b = m.issue_at("user-1", "wallet-1", now).unwrap();
        let stranger = m.issue_at("user-2", "wallet-2", now).unwrap();

        let revoked = m
            .revoke_all_except("user-1", &current.session.session_id)
            .unwrap();
        assert_eq!(revoked, 2);

        assert!(m.verify_at(&current.token, now).is_ok());
        assert!(m.verify_at(&stranger.token, now).is_ok());
        assert!(m.verify_at(&other_a.token, now).is_err());
        assert!(m.verify_at(&other_b.token, now).is_err());
    }

    #[test]
    fn purge_drops_expired_sessions() {
        let m = manager();
        m.issue_at("user-1", "wallet-1", t0()).unwrap();
        assert_eq!(m.purge_expired(t0() + TimeDelta::days(1)).unwrap(), 0);
        assert_eq!(m.purge_expired(t0() + TimeDelta::days(7)).unwrap(), 1);
    }
}
