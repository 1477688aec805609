// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login challenge message template.
//!
//! ```text
//! {domain} wants you to sign in with your wallet:
//! {wallet_address}
//!
//! Nonce: {nonce}
//! Issued At: {rfc3339 timestamp}
//! ```
//!
//! The template is deterministic so that the server can recover the nonce
//! and timestamp from whatever the wallet signed.

use chrono::{DateTime, SecondsFormat, Utc};

use super::error::SignatureError;

const HEADER_SUFFIX: &str = " wants you to sign in with your wallet:";
const NONCE_PREFIX: &str = "Nonce: ";
const ISSUED_AT_PREFIX: &str = "Issued At: ";

/// Fields carried by a challenge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub domain: String,
    pub wallet_address: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl ChallengeMessage {
    /// Render the message a wallet is asked to sign.
    pub fn render(&self) -> String {
        format!(
            "{domain}{HEADER_SUFFIX}\n{wallet}\n\n{NONCE_PREFIX}{nonce}\n{ISSUED_AT_PREFIX}{issued_at}",
            domain = self.domain,
            wallet = self.wallet_address,
            nonce = self.nonce,
            issued_at = self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    /// Recover the fields from a signed message.
    pub fn parse(message: &str) -> Result<Self, SignatureError> {
        let mut lines = message.lines();

        let domain = lines
            .next()
            .and_then(|line| line.strip_suffix(HEADER_SUFFIX))
            .filter(|d| !d.is_empty())
            .ok_or(SignatureError::MalformedMessage)?;

        let wallet_address = lines
            .next()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or(SignatureError::MalformedMessage)?;

        let mut nonce = None;
        let mut issued_at = None;
        for line in lines {
            if let Some(value) = line.strip_prefix(NONCE_PREFIX) {
                nonce = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(ISSUED_AT_PREFIX) {
                let parsed = DateTime::parse_from_rfc3339(value.trim())
                    .map_err(|_| SignatureError::MalformedMessage)?;
                issued_at = Some(parsed.with_timezone(&Utc));
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            wallet_address: wallet_address.to_string(),
            nonce: nonce
                .filter(|n| !n.is_empty())
                .ok_or(SignatureError::MalformedMessage)?,
            issued_at: issued_at.ok_or(SignatureError::MalformedMessage)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChallengeMessage {
        ChallengeMessage {
            domain: "rewards.example.com".to_string(),
            wallet_address: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string(),
            nonce: "ab".repeat(32),
            issued_at: DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn render_is_deterministic() {
        let rendered = sample().render();
        assert_eq!(rendered, sample().render());
        assert!(rendered.starts_with("rewards.example.com wants you to sign in"));
        assert!(rendered.ends_with("Issued At: 2026-03-01T12:00:00Z"));
    }

    #[test]
    fn parse_recovers_fields() {
        let message = sample();
        assert_eq!(ChallengeMessage::parse(&message.render()).unwrap(), message);
    }

    #[test]
    fn parse_rejects_foreign_text() {
        assert_eq!(
            ChallengeMessage::parse("hello world"),
            Err(SignatureError::MalformedMessage)
        );

        let without_nonce = sample().render().replace("Nonce: ", "Nonsense: ");
        assert_eq!(
            ChallengeMessage::parse(&without_nonce),
            Err(SignatureError::MalformedMessage)
        );

        let bad_time = sample().render().replace("2026-03-01T12:00:00Z", "yesterday");
        assert_eq!(
            ChallengeMessage::parse(&bad_time),
            Err(SignatureError::MalformedMessage)
        );
    }
}
