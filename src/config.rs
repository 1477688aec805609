// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `STORE_BACKEND` | `memory` or `redb` | `memory` |
//! | `DATA_DIR` | Directory holding the redb file | `./data` |
//! | `SESSION_SECRET` | HS256 key for session tokens (>= 32 bytes) | random per process |
//! | `SESSION_ISSUER` | Token `iss` claim | `relational-rewards` |
//! | `SESSION_AUDIENCE` | Token `aud` claim | `relational-rewards-clients` |
//! | `SESSION_TTL_SECS` | Session lifetime | `604800` (7 days) |
//! | `WALLET_SCHEME` | `ed25519` (Solana) or `evm` | `ed25519` |
//! | `LOGIN_DOMAIN` | Domain in the challenge message | `localhost` |
//! | `CHALLENGE_TTL_SECS` | Challenge lifetime | `300` |
//! | `MESSAGE_MAX_AGE_SECS` | Accepted age of a signed message | `300` |
//! | `REWARD_RATE_PER_HOUR` | Accrual per hour (smallest units) | `100000000` |
//! | `REWARD_MIN_CLAIM_INTERVAL_HOURS` | Hours between claims | `24` |
//! | `REWARD_MAX_DAILY` | Cap per claim (smallest units) | `2400000000` |
//! | `REWARD_DECIMALS` | Token decimals | `9` |
//! | `REWARD_POOL_ACTIVE` | Initial pool state | `true` |
//! | `CLAIM_CONFIRMATION_TTL_SECS` | Pending claim timeout | `600` |
//! | `RATE_LIMIT_{GENERAL,AUTH,CLAIM}_CAPACITY` | Bucket capacity | `100` / `10` / `5` |
//! | `RATE_LIMIT_{GENERAL,AUTH,CLAIM}_WINDOW_SECS` | Refill window | `900` / `900` / `3600` |
//! | `RATE_LIMIT_{GENERAL,AUTH,CLAIM}_BLOCK_SECS` | Block after exhaustion (`0` = none) | `0` / `900` / `3600` |
//! | `SWEEP_INTERVAL_SECS` | Background sweep interval | `60` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated origins; unset allows any | unset |
//! | `TRUST_FORWARDED_HEADERS` | Key rate limits on `X-Forwarded-For` / `X-Real-IP` | `false` |
//! | `ADMIN_WALLETS` | Comma-separated wallets granted the admin role | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use rand::RngCore;

use crate::auth::{ChallengeConfig, Role, SessionConfig, WalletScheme};
use crate::ratelimit::{PolicyConfig, RateLimitPolicies};
use crate::rewards::RewardPoolConfig;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Directory for the redb database file (`rewards.redb`).
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// HS256 signing key. When unset a random key is generated, so sessions do
/// not survive a restart and are not shared between instances.
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const SESSION_ISSUER_ENV: &str = "SESSION_ISSUER";
pub const SESSION_AUDIENCE_ENV: &str = "SESSION_AUDIENCE";
pub const SESSION_TTL_SECS_ENV: &str = "SESSION_TTL_SECS";

pub const WALLET_SCHEME_ENV: &str = "WALLET_SCHEME";
pub const LOGIN_DOMAIN_ENV: &str = "LOGIN_DOMAIN";
pub const CHALLENGE_TTL_SECS_ENV: &str = "CHALLENGE_TTL_SECS";
pub const MESSAGE_MAX_AGE_SECS_ENV: &str = "MESSAGE_MAX_AGE_SECS";

pub const REWARD_RATE_PER_HOUR_ENV: &str = "REWARD_RATE_PER_HOUR";
pub const REWARD_MIN_CLAIM_INTERVAL_HOURS_ENV: &str = "REWARD_MIN_CLAIM_INTERVAL_HOURS";
pub const REWARD_MAX_DAILY_ENV: &str = "REWARD_MAX_DAILY";
pub const REWARD_DECIMALS_ENV: &str = "REWARD_DECIMALS";
pub const REWARD_POOL_ACTIVE_ENV: &str = "REWARD_POOL_ACTIVE";
pub const CLAIM_CONFIRMATION_TTL_SECS_ENV: &str = "CLAIM_CONFIRMATION_TTL_SECS";

pub const SWEEP_INTERVAL_SECS_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";

/// Only enable behind a reverse proxy that overwrites these headers;
/// otherwise any client can pick its own rate-limit key.
pub const TRUST_FORWARDED_HEADERS_ENV: &str = "TRUST_FORWARDED_HEADERS";

/// Wallets (in the configured scheme) allowed to call `/v1/admin`.
pub const ADMIN_WALLETS_ENV: &str = "ADMIN_WALLETS";

/// `json` for structured logs, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const MIN_SECRET_LEN: usize = 32;
const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be at least 32 bytes")]
    WeakSecret(&'static str),

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    PartialTls,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    /// redb database file
    Redb(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub session: SessionConfig,
    /// Whether the session key was generated because none was configured.
    pub ephemeral_secret: bool,
    pub wallet_scheme: WalletScheme,
    pub challenge: ChallengeConfig,
    pub rewards: RewardPoolConfig,
    pub rate_limits: RateLimitPolicies,
    pub sweep_interval: Duration,
    pub tls: Option<TlsPaths>,
    pub cors_origins: Option<Vec<String>>,
    pub trust_forwarded_headers: bool,
    /// Normalised admin wallet addresses.
    pub admin_wallets: Vec<String>,
}

/// Typed access to a variable source.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.raw(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(var) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn secs(&self, var: &'static str, default: TimeDelta) -> Result<TimeDelta, ConfigError> {
        let secs = self.parse::<i64>(var, default.num_seconds())?;
        if secs < 0 {
            return Err(ConfigError::Invalid {
                var,
                value: secs.to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(TimeDelta::seconds(secs))
    }

    fn policy(
        &self,
        capacity_var: &'static str,
        window_var: &'static str,
        block_var: &'static str,
        default: PolicyConfig,
    ) -> Result<PolicyConfig, ConfigError> {
        let capacity = self.parse::<u32>(capacity_var, default.capacity)?;
        let window = self.secs(window_var, default.window)?;
        let block = self.secs(block_var, default.block.unwrap_or(TimeDelta::zero()))?;
        Ok(PolicyConfig::new(
            capacity,
            window,
            (block > TimeDelta::zero()).then_some(block),
        ))
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; MIN_SECRET_LEN];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let store = match env.string(STORE_BACKEND_ENV, "memory").to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "redb" => StoreBackend::Redb(
                PathBuf::from(env.string(DATA_DIR_ENV, DEFAULT_DATA_DIR)).join("rewards.redb"),
            ),
            other => {
                return Err(ConfigError::Invalid {
                    var: STORE_BACKEND_ENV,
                    value: other.to_string(),
                    reason: "expected 'memory' or 'redb'".to_string(),
                })
            }
        };

        let (secret, ephemeral_secret) = match env.raw(SESSION_SECRET_ENV) {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(ConfigError::WeakSecret(SESSION_SECRET_ENV))
            }
            Some(secret) => (secret.into_bytes(), false),
            None => (random_secret(), true),
        };

        let session = SessionConfig {
            secret,
            issuer: env.string(SESSION_ISSUER_ENV, "relational-rewards"),
            audience: env.string(SESSION_AUDIENCE_ENV, "relational-rewards-clients"),
            ttl: env.secs(SESSION_TTL_SECS_ENV, crate::auth::session::DEFAULT_SESSION_TTL)?,
        };

        let wallet_scheme = env.parse(WALLET_SCHEME_ENV, WalletScheme::Ed25519)?;

        let challenge = ChallengeConfig {
            domain: env.string(LOGIN_DOMAIN_ENV, "localhost"),
            ttl: env.secs(CHALLENGE_TTL_SECS_ENV, crate::auth::challenge::DEFAULT_CHALLENGE_TTL)?,
            max_message_age: env.secs(
                MESSAGE_MAX_AGE_SECS_ENV,
                crate::auth::challenge::DEFAULT_MAX_MESSAGE_AGE,
            )?,
        };

        let defaults = RewardPoolConfig::default();
        let rewards = RewardPoolConfig {
            rate_per_hour: env.parse(REWARD_RATE_PER_HOUR_ENV, defaults.rate_per_hour)?,
            min_claim_interval_hours: env.parse(
                REWARD_MIN_CLAIM_INTERVAL_HOURS_ENV,
                defaults.min_claim_interval_hours,
            )?,
            max_daily_reward: env.parse(REWARD_MAX_DAILY_ENV, defaults.max_daily_reward)?,
            decimals: env.parse(REWARD_DECIMALS_ENV, defaults.decimals)?,
            confirmation_ttl: env.secs(CLAIM_CONFIRMATION_TTL_SECS_ENV, defaults.confirmation_ttl)?,
            active: env.parse(REWARD_POOL_ACTIVE_ENV, defaults.active)?,
        };

        let default_policies = RateLimitPolicies::default();
        let rate_limits = RateLimitPolicies {
            general: env.policy(
                "RATE_LIMIT_GENERAL_CAPACITY",
                "RATE_LIMIT_GENERAL_WINDOW_SECS",
                "RATE_LIMIT_GENERAL_BLOCK_SECS",
                default_policies.general,
            )?,
            auth: env.policy(
                "RATE_LIMIT_AUTH_CAPACITY",
                "RATE_LIMIT_AUTH_WINDOW_SECS",
                "RATE_LIMIT_AUTH_BLOCK_SECS",
                default_policies.auth,
            )?,
            claim: env.policy(
                "RATE_LIMIT_CLAIM_CAPACITY",
                "RATE_LIMIT_CLAIM_WINDOW_SECS",
                "RATE_LIMIT_CLAIM_BLOCK_SECS",
                default_policies.claim,
            )?,
        };

        let tls = match (env.raw(TLS_CERT_PATH_ENV), env.raw(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        let cors_origins = env.raw(CORS_ALLOWED_ORIGINS_ENV).map(|origins| {
            origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect()
        });

        let verifier = wallet_scheme.verifier();
        let admin_wallets = env
            .raw(ADMIN_WALLETS_ENV)
            .map(|wallets| {
                wallets
                    .split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(|w| {
                        verifier
                            .normalize_address(w)
                            .map_err(|e| ConfigError::Invalid {
                                var: ADMIN_WALLETS_ENV,
                                value: w.to_string(),
                                reason: e.to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            host: env.string(HOST_ENV, "0.0.0.0"),
            port: env.parse(PORT_ENV, 8080)?,
            store,
            session,
            ephemeral_secret,
            wallet_scheme,
            challenge,
            rewards,
            rate_limits,
            sweep_interval: Duration::from_secs(env.parse(SWEEP_INTERVAL_SECS_ENV, 60u64)?.max(1)),
            tls,
            cors_origins,
            trust_forwarded_headers: env.parse(TRUST_FORWARDED_HEADERS_ENV, false)?,
            admin_wallets,
        })
    }

    /// Role granted to sessions opened with `wallet_address`.
    pub fn role_for(&self, wallet_address: &str) -> Role {
        if self.admin_wallets.iter().any(|w| w == wallet_address) {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Defaults with a fixed session key, for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let mut config = Self::from_lookup(|_| None).expect("default config");
        config.session.secret = b"test-secret-test-secret-test-secret!".to_vec();
        config.ephemeral_secret = false;
        config
    }
}
