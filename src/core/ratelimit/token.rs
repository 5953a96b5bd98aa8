//! Registry bearer tokens.
//!
//! Docker Hub hands out short-lived bearer tokens from its auth service. The
//! checker keeps at most one of them and refreshes it once it gets close to
//! expiry, see [`AuthToken::expires_soon`].

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::core::ratelimit::types::CheckError;

/// Refresh margin subtracted from a token's expiry time
pub const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token response omits `expires_in`
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 60;

/// Raw token endpoint payload
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    issued_at: Option<DateTime<Utc>>,
}

/// A bearer token with its validity window
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    token: String,
    issued_at: DateTime<Utc>,
    expires_in: Duration,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token_len", &self.token.len())
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl AuthToken {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_in,
        }
    }

    /// Decode a token endpoint response body.
    ///
    /// `token` wins over `access_token`. A missing `issued_at` is taken to be
    /// `received_at`, a missing `expires_in` falls back to
    /// [`DEFAULT_TOKEN_TTL_SECS`].
    pub fn from_json(body: &[u8], received_at: DateTime<Utc>) -> Result<Self, CheckError> {
        let raw: TokenResponse = serde_json::from_slice(body)?;

        let token = if !raw.token.is_empty() {
            raw.token
        } else {
            raw.access_token
        };
        if token.is_empty() {
            return Err(CheckError::EmptyToken);
        }

        Ok(Self {
            token,
            issued_at: raw.issued_at.unwrap_or(received_at),
            expires_in: Duration::from_secs(raw.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS)),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at
            .checked_add_signed(to_chrono(self.expires_in))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// True when less than [`TOKEN_EXPIRY_SKEW`] of validity is left at `now`
    pub fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() - now < to_chrono(TOKEN_EXPIRY_SKEW)
    }

    /// Value for the `Authorization` header
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}
