//! Error types for the client and the protocol state machine

/// Errors surfaced by the login flow and API calls.
///
/// The authenticator never retries internally: each variant is raised once
/// per attempt and the application decides whether to restart the login flow
/// or show a failure page. `Protocol` and `TokenExchange` both mean the user
/// should be treated as logged out; in the `TokenExchange` case the stored
/// protocol state has already been reset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage key outside the closed set, a programming error. Fail fast.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// CSRF state missing or mismatched, or a code presented with no prior
    /// state. Signals a forged or replayed redirect; never swallowed.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The provider rejected the code or returned an unusable response.
    /// All stored protocol state has been cleared before this is raised.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Network-level failure (DNS, connect, TLS, timeout), wrapped so
    /// callers never need to handle transport-library errors.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Caller-contract violation (empty code, incompatible format pairing).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The API rejected a cached token (401). Stored state is left intact;
    /// the caller decides whether to restart the login flow.
    #[error("access token rejected by the API: {0}")]
    TokenExpired(String),

    /// A storage backend failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
