//! Token cache in the OS keyring.
//!
//! Useful when the temp directory is shared between users. The keyring entry
//! is keyed by the database address, so different databases do not evict
//! each other's tokens.

use keyring::Entry;

use super::TokenStore;
use crate::error::{FmError, Result};

const SERVICE_NAME: &str = "fmdata-sql";

/// Stores the token under a keyring entry.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    /// Creates a store for the database at `base_address`.
    pub fn new(base_address: &str) -> Self {
        Self {
            account: Self::account_key(base_address),
        }
    }

    /// Keyring account name used for a database address.
    pub fn account_key(base_address: &str) -> String {
        format!("token:{}", base_address)
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account)
            .map_err(|e| FmError::token_store(format!("Failed to access keyring: {e}")))
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) if token.is_empty() => Ok(None),
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(FmError::token_store(format!("Failed to read token: {e}"))),
        }
    }

    fn put(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .map_err(|e| FmError::token_store(format!("Failed to store token: {e}")))
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(FmError::token_store(format!("Failed to delete token: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_key_includes_address() {
        assert_eq!(
            KeyringTokenStore::account_key("https://fms/fmi/data/v1/databases/Contacts/"),
            "token:https://fms/fmi/data/v1/databases/Contacts/"
        );
    }
}
