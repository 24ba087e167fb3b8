//! Persistent key-value storage between requests
//!
//! The login flow spans at least two independent HTTP requests, so the CSRF
//! state, the last redeemed code, the access token, and the redirect URI
//! must survive outside the process. The host application decides where
//! (session, cookie, database); this module fixes the contract.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// The closed set of protocol slots. Anything else is a programming error;
/// string-keyed backends go through [`StorageKey::parse`], which rejects
/// unknown names loudly instead of silently storing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Pending CSRF state token, single-use
    State,
    /// Most recently redeemed authorization code
    Code,
    /// Stored access-token record
    AccessToken,
    /// Redirect URI used on the authorize leg, required again on exchange
    RedirectUri,
}

impl StorageKey {
    /// All four slots, in clearing order.
    pub const ALL: [StorageKey; 4] = [
        StorageKey::State,
        StorageKey::Code,
        StorageKey::AccessToken,
        StorageKey::RedirectUri,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::State => "state",
            StorageKey::Code => "code",
            StorageKey::AccessToken => "access_token",
            StorageKey::RedirectUri => "redirect_uri",
        }
    }

    /// Namespaced name for backends that share a keyspace with the rest of
    /// the application, e.g. a session map.
    pub fn session_name(&self) -> String {
        format!("linkedin_{}", self.as_str())
    }

    /// Resolve a wire name back to a slot. Unknown names fail with
    /// [`Error::InvalidKey`].
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "state" => Ok(StorageKey::State),
            "code" => Ok(StorageKey::Code),
            "access_token" => Ok(StorageKey::AccessToken),
            "redirect_uri" => Ok(StorageKey::RedirectUri),
            other => Err(Error::InvalidKey(other.to_string())),
        }
    }
}

/// Storage contract for the four protocol slots, scoped per end-user
/// session. Implementations must be usable from a shared reference; the
/// library holds them behind `Arc<dyn DataStorage>`.
///
/// `set`/`clear` return `Err(Error::Storage)` when the backend itself
/// fails. `get` reports absence as `None`, never as an error.
pub trait DataStorage: Send + Sync {
    fn set(&self, key: StorageKey, value: String) -> Result<()>;
    fn get(&self, key: StorageKey) -> Option<String>;
    fn clear(&self, key: StorageKey) -> Result<()>;

    /// Clear every slot. The default clears each key in turn.
    fn clear_all(&self) -> Result<()> {
        for key in StorageKey::ALL {
            self.clear(key)?;
        }
        Ok(())
    }
}

/// Map-backed storage. Suitable for tests and for single-process demo
/// applications; real deployments back this with their session layer.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    values: Mutex<HashMap<StorageKey, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStorage for InMemoryStorage {
    fn set(&self, key: StorageKey, value: String) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Storage("storage mutex poisoned".into()))?;
        values.insert(key, value);
        Ok(())
    }

    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.lock().ok()?.get(&key).cloned()
    }

    fn clear(&self, key: StorageKey) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Storage("storage mutex poisoned".into()))?;
        values.remove(&key);
        Ok(())
    }
}
