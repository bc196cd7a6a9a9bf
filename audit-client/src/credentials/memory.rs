use super::{CredentialError, CredentialStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store; tokens are lost on exit.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CredentialError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, CredentialError> {
        let entries = self.entries.read().await;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    async fn set_many(&self, pairs: &[(&str, &str)]) -> Result<(), CredentialError> {
        let mut entries = self.entries.write().await;
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), CredentialError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

    #[tokio::test]
    async fn store_and_clear_tokens() {
        let store = MemoryCredentialStore::new();
        store.store_tokens("access-1", Some("refresh-1")).await.unwrap();

        let tokens = store.tokens().await.unwrap();
        assert_eq!(tokens.access.as_deref(), Some("access-1"));
        assert_eq!(tokens.refresh.as_deref(), Some("refresh-1"));

        store.clear_tokens().await.unwrap();
        assert_eq!(store.tokens().await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn access_only_update_keeps_refresh_token() {
        let store = MemoryCredentialStore::new();
        store.store_tokens("access-1", Some("refresh-1")).await.unwrap();
        store.store_tokens("access-2", None).await.unwrap();

        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("access-2")
        );
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("refresh-1")
        );
    }
}
