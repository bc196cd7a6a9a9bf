//! Durable storage for the access/refresh token pair.
//!
//! The store is the only mutable state shared between concurrent calls.
//! Multi-key writes go through [`CredentialStore::set_many`] and
//! [`CredentialStore::remove_many`] so readers never observe half a pair.

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use async_trait::async_trait;
use thiserror::Error;

pub const ACCESS_TOKEN_KEY: &str = "userToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Tokens as read from the store in a single snapshot.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoredTokens {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_len", &self.access.as_ref().map(String::len))
            .field("refresh_len", &self.refresh.as_ref().map(String::len))
            .finish()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    async fn remove(&self, key: &str) -> Result<(), CredentialError>;

    /// Read several keys under one lock.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, CredentialError>;
    /// Write several keys as one atomic update.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), CredentialError>;
    /// Remove several keys as one atomic update.
    async fn remove_many(&self, keys: &[&str]) -> Result<(), CredentialError>;

    async fn tokens(&self) -> Result<StoredTokens, CredentialError> {
        let mut values = self
            .get_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
            .await?
            .into_iter();
        Ok(StoredTokens {
            access: values.next().flatten(),
            refresh: values.next().flatten(),
        })
    }

    async fn access_token(&self) -> Result<Option<String>, CredentialError> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    async fn refresh_token(&self) -> Result<Option<String>, CredentialError> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    /// Persist a token pair. Without a new refresh token the stored one is
    /// kept.
    async fn store_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), CredentialError> {
        match refresh {
            Some(refresh) => {
                self.set_many(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)])
                    .await
            }
            None => self.set(ACCESS_TOKEN_KEY, access).await,
        }
    }

    async fn clear_tokens(&self) -> Result<(), CredentialError> {
        self.remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]).await
    }
}
