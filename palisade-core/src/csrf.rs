use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use palisade_common::Secret;

/// Anti-forgery token state for one session. At most one token is live:
/// issuing overwrites any prior token, and expiry is enforced lazily on
/// the next verification rather than by a timer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum CsrfState {
    #[default]
    NoToken,
    Issued {
        token: Secret<String>,
        issued_at: DateTime<Utc>,
    },
}

impl CsrfState {
    pub fn issue(&mut self) -> Secret<String> {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&mut self, now: DateTime<Utc>) -> Secret<String> {
        let token = Secret::random();
        *self = CsrfState::Issued {
            token: token.clone(),
            issued_at: now,
        };
        token
    }

    pub fn verify(&mut self, candidate: &str, ttl: Duration) -> bool {
        self.verify_at(candidate, ttl, Utc::now())
    }

    /// Constant-time comparison against the stored token; a token older
    /// than `ttl` invalidates the state before answering.
    pub fn verify_at(&mut self, candidate: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
        let (token, issued_at) = match &*self {
            CsrfState::NoToken => return false,
            CsrfState::Issued { token, issued_at } => (token.clone(), *issued_at),
        };

        let age = now.signed_duration_since(issued_at);
        if age > chrono::Duration::from_std(ttl).unwrap_or_default() {
            *self = CsrfState::NoToken;
            return false;
        }

        token
            .expose_secret()
            .as_bytes()
            .ct_eq(candidate.as_bytes())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3600);

    #[test]
    fn fresh_token_verifies() {
        let mut state = CsrfState::default();
        let now = Utc::now();
        let token = state.issue_at(now);
        assert!(state.verify_at(token.expose_secret(), TTL, now));
    }

    #[test]
    fn no_token_never_verifies() {
        let mut state = CsrfState::default();
        assert!(!state.verify_at("anything", TTL, Utc::now()));
    }

    #[test]
    fn issuing_invalidates_previous_token() {
        let mut state = CsrfState::default();
        let now = Utc::now();
        let first = state.issue_at(now);
        let second = state.issue_at(now);
        assert!(!state.verify_at(first.expose_secret(), TTL, now));
        assert!(state.verify_at(second.expose_secret(), TTL, now));
    }

    #[test]
    fn token_expires_after_ttl() {
        let mut state = CsrfState::default();
        let now = Utc::now();
        let token = state.issue_at(now);

        let just_within = now + chrono::Duration::seconds(3600);
        assert!(state.verify_at(token.expose_secret(), TTL, just_within));

        let expired = now + chrono::Duration::seconds(3601);
        assert!(!state.verify_at(token.expose_secret(), TTL, expired));
        // Expiry resets the state entirely
        assert!(matches!(state, CsrfState::NoToken));
    }

    #[test]
    fn wrong_token_rejected() {
        let mut state = CsrfState::default();
        let now = Utc::now();
        let _ = state.issue_at(now);
        assert!(!state.verify_at(&"0".repeat(64), TTL, now));
        assert!(!state.verify_at("short", TTL, now));
    }

    #[test]
    fn token_is_64_hex_chars() {
        let mut state = CsrfState::default();
        let token = state.issue_at(Utc::now());
        assert_eq!(token.expose_secret().len(), 64);
        assert!(token
            .expose_secret()
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }
}
