//! Access token value object
//!
//! The token-exchange response carries `expires_in` as a delta in seconds.
//! It is converted to an absolute timestamp at construction time so the
//! stored record stays meaningful across requests. A token with no string
//! is considered absent regardless of its expiry.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A bearer access token and its expiry, if known.
///
/// Immutable once handed to the facade's in-memory cache: a new token
/// replaces the cached value, never mutates it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    token: Option<String>,
    /// Expiration as a unix timestamp in seconds (absolute, not a delta)
    expires_at: Option<u64>,
}

impl AccessToken {
    /// A token with no expiry information, e.g. one read back from storage
    /// in its legacy bare-string form.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            expires_at: None,
        }
    }

    /// A token that expires `expires_in` seconds from now. This is the
    /// constructor used for token-exchange responses.
    pub fn with_expires_in(token: impl Into<String>, expires_in: u64) -> Self {
        let expires_at = unix_now() + expires_in;
        Self {
            token: Some(token.into()),
            expires_at: Some(expires_at),
        }
    }

    /// No token at all. `has_token()` is false.
    pub fn absent() -> Self {
        Self {
            token: None,
            expires_at: None,
        }
    }

    /// Does a non-empty token string exist?
    pub fn has_token(&self) -> bool {
        matches!(self.token.as_deref(), Some(t) if !t.is_empty())
    }

    /// The token string, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Absolute expiration time, if the provider reported one.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Parse a stored record. Current records are JSON; a value that does
    /// not parse is treated as a legacy bare token string with no expiry.
    pub fn from_stored(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| AccessToken::new(raw))
    }

    /// Serialize for storage.
    pub fn to_stored(&self) -> String {
        // A struct of two scalar options cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        AccessToken::new(token)
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        AccessToken::new(token)
    }
}

impl fmt::Display for AccessToken {
    /// Renders the token string, or an empty string if absent. Used when
    /// building `Authorization` headers; never fails.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token.as_deref().unwrap_or(""))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
