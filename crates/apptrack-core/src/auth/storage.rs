//! Durable storage for the refresh token.

use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::APP_NAME;

/// A single named slot holding the long-lived refresh token.
pub trait RefreshTokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, token: &str) -> Result<()>;

    /// Removing a token that is not there is not an error.
    fn remove(&self) -> Result<()>;
}

/// Refresh token kept in the OS keychain.
pub struct KeyringStore {
    slot: String,
}

impl KeyringStore {
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(APP_NAME, &self.slot).context("Failed to create keyring entry")
    }
}

impl RefreshTokenStore for KeyringStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store refresh token in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete refresh token from keychain"),
        }
    }
}

/// Refresh token held in process memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    token: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl RefreshTokenStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save("R1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("R1"));

        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Removing twice is fine
        store.remove().unwrap();
    }
}
