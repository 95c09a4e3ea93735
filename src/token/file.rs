//! File-backed token cache in the process temp directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::TokenStore;
use crate::error::{FmError, Result};

const TOKEN_FILE_NAME: &str = "fmp-token.txt";

/// Stores the token as plain text in a single file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTokenStore {
    /// Creates a store at the well-known location `<temp dir>/fmp-token.txt`.
    pub fn new() -> Self {
        Self::at(std::env::temp_dir().join(TOKEN_FILE_NAME))
    }

    /// Creates a store at a custom path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FmError::token_store(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn put(&self, token: &str) -> Result<()> {
        fs::write(&self.path, token).map_err(|e| {
            FmError::token_store(format!("Failed to write {}: {e}", self.path.display()))
        })
    }

    fn clear(&self) -> Result<()> {
        self.put("")
    }
}
