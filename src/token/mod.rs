//! Token cache shared between sessions.
//!
//! A single bearer token is cached per location. Empty content is treated the
//! same as no token at all, which is how a forced refresh invalidates it.
//! There is no locking: two processes refreshing at once race, and the last
//! writer wins.

mod file;
mod os_keyring;

pub use self::file::FileTokenStore;
pub use self::os_keyring::KeyringTokenStore;

use crate::error::Result;
use std::sync::Mutex;

/// Storage backend for the cached Data API token.
pub trait TokenStore: Send + Sync {
    /// Returns the cached token, or `None` when absent or empty.
    fn get(&self) -> Result<Option<String>>;

    /// Overwrites the cached token.
    fn put(&self, token: &str) -> Result<()>;

    /// Invalidates the cached token.
    fn clear(&self) -> Result<()>;
}

/// In-memory token store for tests and single-process use.
///
/// Does not persist across restarts.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a usable Option<String>.
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.slot().clone().filter(|t| !t.is_empty()))
    }

    fn put(&self, token: &str) -> Result<()> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = Some(String::new());
        Ok(())
    }
}
