// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet challenge-response login and bearer sessions.
//!
//! ## Auth Flow
//!
//! 1. Client requests a challenge for its wallet address
//! 2. Wallet signs the challenge message
//! 3. Server:
//!    - Checks the challenge is current, unused and fresh
//!    - Verifies the signature for the configured wallet scheme
//!    - Consumes the challenge and issues a session token
//! 4. Client sends `Authorization: Bearer <session token>`
//!
//! ## Security
//!
//! - Challenges are single-use; consumption is a conditional store update
//! - Sessions are authoritative: revocation beats a valid token signature
//! - Signed message timestamps older than five minutes are rejected

pub mod challenge;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod message;
pub mod roles;
pub mod session;
pub mod wallet;

pub use challenge::{ChallengeConfig, ChallengeService, IssuedChallenge, NonceChallenge};
pub use claims::AuthenticatedUser;
pub use error::{AuthError, NonceError, SignatureError, VerifyError};
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use message::ChallengeMessage;
pub use roles::Role;
pub use session::{IssuedSession, Session, SessionConfig, SessionManager};
pub use wallet::{Ed25519Wallets, EvmWallets, WalletScheme, WalletVerifier};
