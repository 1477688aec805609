// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature schemes.
//!
//! The login flow is agnostic of the chain; it only needs to normalise an
//! address and check that a signature over the challenge message was made
//! by that address's key.
//!
//! - [`Ed25519Wallets`] - base58 32-byte public keys as addresses (Solana
//!   style); signatures base58 or hex encoded.
//! - [`EvmWallets`] - `0x` addresses; EIP-191 `personal_sign` signatures
//!   (65 bytes hex), verified by public key recovery.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, Signature as EvmSignature};
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};

use super::error::SignatureError;

/// Address normalisation and signature verification for one wallet family.
pub trait WalletVerifier: Send + Sync {
    /// Canonical form of `address`, or an error if it is not a valid address.
    fn normalize_address(&self, address: &str) -> Result<String, SignatureError>;

    /// Whether `signature` over `message` was produced by `address`.
    fn verify(&self, address: &str, message: &[u8], signature: &str) -> bool;
}

/// Supported wallet families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletScheme {
    Ed25519,
    Evm,
}

impl WalletScheme {
    pub fn verifier(&self) -> Arc<dyn WalletVerifier> {
        match self {
            WalletScheme::Ed25519 => Arc::new(Ed25519Wallets),
            WalletScheme::Evm => Arc::new(EvmWallets),
        }
    }
}

impl FromStr for WalletScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ed25519" | "solana" => Ok(WalletScheme::Ed25519),
            "evm" | "ethereum" | "secp256k1" => Ok(WalletScheme::Evm),
            other => Err(format!("unknown wallet scheme '{other}'")),
        }
    }
}

// =============================================================================
// Ed25519
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Wallets;

fn ed25519_key(address: &str) -> Option<VerifyingKey> {
    let bytes = bs58::decode(address).into_vec().ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn decode_signature_bytes(signature: &str) -> Option<Vec<u8>> {
    let trimmed = signature.trim();
    if let Some(hex_part) = trimmed.strip_prefix("0x") {
        return hex::decode(hex_part).ok();
    }
    bs58::decode(trimmed)
        .into_vec()
        .ok()
        .filter(|b| b.len() == 64)
        .or_else(|| hex::decode(trimmed).ok())
}

impl WalletVerifier for Ed25519Wallets {
    fn normalize_address(&self, address: &str) -> Result<String, SignatureError> {
        let address = address.trim();
        ed25519_key(address)
            .map(|_| address.to_string())
            .ok_or_else(|| SignatureError::MalformedAddress(address.to_string()))
    }

    fn verify(&self, address: &str, message: &[u8], signature: &str) -> bool {
        let Some(key) = ed25519_key(address.trim()) else {
            return false;
        };
        let Some(bytes) = decode_signature_bytes(signature) else {
            tracing::debug!("Undecodable ed25519 signature");
            return false;
        };
        let Ok(signature) = Ed25519Signature::from_slice(&bytes) else {
            tracing::debug!(len = bytes.len(), "Invalid ed25519 signature length");
            return false;
        };
        key.verify_strict(message, &signature).is_ok()
    }
}

// =============================================================================
// EVM (EIP-191)
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct EvmWallets;

impl WalletVerifier for EvmWallets {
    fn normalize_address(&self, address: &str) -> Result<String, SignatureError> {
        Address::from_str(address.trim())
            .map(|a| a.to_checksum(None))
            .map_err(|_| SignatureError::MalformedAddress(address.to_string()))
    }

    fn verify(&self, address: &str, message: &[u8], signature: &str) -> bool {
        let Ok(expected) = Address::from_str(address.trim()) else {
            return false;
        };
        let sig_hex = signature.trim();
        let Ok(bytes) = hex::decode(sig_hex.strip_prefix("0x").unwrap_or(sig_hex)) else {
            return false;
        };
        let Ok(signature) = EvmSignature::try_from(bytes.as_slice()) else {
            tracing::debug!(len = bytes.len(), "Invalid EVM signature encoding");
            return false;
        };
        match signature.recover_address_from_msg(message) {
            Ok(recovered) => recovered == expected,
            Err(e) => {
                tracing::debug!(error = %e, "EVM signature recovery failed");
                false
            }
        }
    }
}
