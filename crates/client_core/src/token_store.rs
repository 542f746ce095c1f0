use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;
use zeroize::Zeroize;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

/// Durable mirror of the credential pair, read at process start.
#[async_trait]
pub trait CredentialPersistence: Send + Sync {
    async fn load(&self) -> Result<Option<Credentials>>;
    async fn save(&self, credentials: &Credentials) -> Result<()>;
    async fn erase(&self) -> Result<()>;
}

pub struct NoPersistence;

#[async_trait]
impl CredentialPersistence for NoPersistence {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(None)
    }

    async fn save(&self, _credentials: &Credentials) -> Result<()> {
        Ok(())
    }

    async fn erase(&self) -> Result<()> {
        Ok(())
    }
}

/// Point-in-time view used by the gateway to detect rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub generation: u64,
}

struct Slot {
    credentials: Option<Credentials>,
    generation: u64,
}

/// Session-scoped holder of the access/refresh pair.
///
/// Mutations are crate-private: only the gateway (refresh cycle) and the
/// session (login/logout through the gateway) change credentials. Every
/// mutation bumps `generation`.
pub struct TokenStore {
    slot: RwLock<Slot>,
    persistence: Arc<dyn CredentialPersistence>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        Self::with_persistence(Arc::new(NoPersistence))
    }

    pub fn with_persistence(persistence: Arc<dyn CredentialPersistence>) -> Self {
        Self {
            slot: RwLock::new(Slot {
                credentials: None,
                generation: 0,
            }),
            persistence,
        }
    }

    pub async fn get(&self) -> Option<Credentials> {
        self.slot.read().await.credentials.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.slot.read().await.credentials.is_none()
    }

    pub async fn generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    pub(crate) async fn snapshot(&self) -> TokenSnapshot {
        let slot = self.slot.read().await;
        TokenSnapshot {
            access_token: slot.credentials.as_ref().map(|c| c.access_token.clone()),
            refresh_token: slot.credentials.as_ref().map(|c| c.refresh_token.clone()),
            generation: slot.generation,
        }
    }

    /// Loads persisted credentials into memory. Returns whether any were found.
    pub async fn restore(&self) -> Result<bool> {
        let Some(credentials) = self.persistence.load().await? else {
            return Ok(false);
        };
        let mut slot = self.slot.write().await;
        slot.credentials = Some(credentials);
        slot.generation += 1;
        Ok(true)
    }

    pub(crate) async fn set(&self, credentials: Credentials) {
        {
            let mut slot = self.slot.write().await;
            slot.credentials = Some(credentials.clone());
            slot.generation += 1;
        }
        if let Err(err) = self.persistence.save(&credentials).await {
            warn!(error = %err, "failed to persist credentials");
        }
    }

    /// Swaps in a refreshed access token (and a rotated refresh token when
    /// the server issued one). Returns false when the store was cleared
    /// in the meantime.
    pub(crate) async fn replace_access(
        &self,
        access_token: String,
        rotated_refresh: Option<String>,
    ) -> bool {
        let updated = {
            let mut slot = self.slot.write().await;
            let Some(credentials) = slot.credentials.as_mut() else {
                return false;
            };
            credentials.access_token = access_token;
            if let Some(refresh_token) = rotated_refresh {
                credentials.refresh_token = refresh_token;
            }
            let updated = credentials.clone();
            slot.generation += 1;
            updated
        };
        if let Err(err) = self.persistence.save(&updated).await {
            warn!(error = %err, "failed to persist refreshed credentials");
        }
        true
    }

    pub(crate) async fn clear(&self) {
        {
            let mut slot = self.slot.write().await;
            slot.credentials = None;
            slot.generation += 1;
        }
        if let Err(err) = self.persistence.erase().await {
            warn!(error = %err, "failed to erase persisted credentials");
        }
    }
}

#[cfg(test)]
#[path = "tests/token_store_tests.rs"]
mod tests;
