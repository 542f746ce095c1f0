use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::{Storage, DEFAULT_PROFILE};

use crate::token_store::{CredentialPersistence, Credentials};

/// Credential persistence backed by the local SQLite store, keyed by profile
/// so several API environments can keep separate sessions.
pub struct DurableCredentialStore {
    store: Storage,
    profile: String,
}

impl DurableCredentialStore {
    pub async fn initialize(database_url: &str, profile: Option<&str>) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize credential storage at '{database_url}'"))?;
        Ok(Arc::new(Self::new(store, profile.unwrap_or(DEFAULT_PROFILE))))
    }

    pub fn new(store: Storage, profile: impl Into<String>) -> Self {
        Self {
            store,
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

#[async_trait]
impl CredentialPersistence for DurableCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(self
            .store
            .load_credentials(&self.profile)
            .await?
            .map(|stored| Credentials::new(stored.access_token, stored.refresh_token)))
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        self.store
            .save_credentials(
                &self.profile,
                &credentials.access_token,
                &credentials.refresh_token,
            )
            .await
    }

    async fn erase(&self) -> Result<()> {
        self.store.clear_credentials(&self.profile).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/durable_credentials_tests.rs"]
mod tests;
