//! Authenticated request execution with a single coordinated refresh cycle.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use shared::protocol::{RefreshRequest, RefreshResponse};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    token_store::{Credentials, TokenStore},
    transport::{ApiRequest, ApiResponse, HttpTransport},
};

pub const REFRESH_PATH: &str = "/auth/refresh/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    TokenRefreshed,
    Expired,
    SignedOut,
}

/// A request that may be replayed at most once after a 401.
///
/// `into_replay` consumes the first attempt and yields the replay; a replay
/// has no successor, so a second 401 can never loop back into a refresh.
enum Attempt {
    First(ApiRequest),
    Replay(ApiRequest),
}

impl Attempt {
    fn request(&self) -> &ApiRequest {
        match self {
            Self::First(request) | Self::Replay(request) => request,
        }
    }

    fn into_replay(self) -> Option<Self> {
        match self {
            Self::First(request) => Some(Self::Replay(request)),
            Self::Replay(_) => None,
        }
    }
}

pub struct AuthGateway {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthGateway {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: Arc<TokenStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            transport,
            tokens,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Executes `request` with the current bearer token.
    ///
    /// Any non-401 response is returned unmodified, error statuses included.
    /// A 401 triggers one refresh (shared with every other request that hit
    /// 401 under the same token) and a single replay whose outcome is final.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let mut attempt = Attempt::First(request);
        loop {
            let snapshot = self.tokens.snapshot().await;
            let response = self
                .transport
                .send(attempt.request(), snapshot.access_token.as_deref())
                .await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }

            let path = attempt.request().path.clone();
            attempt = match attempt.into_replay() {
                Some(replay) => replay,
                None => {
                    warn!(%path, "request rejected again after token refresh");
                    self.expire().await;
                    return Err(ClientError::SessionExpired);
                }
            };

            debug!(%path, generation = snapshot.generation, "unauthorized; recovering session");
            self.recover(snapshot.generation).await?;
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        self.send(request).await?.error_for_status()?.json()
    }

    pub async fn send_empty(&self, request: ApiRequest) -> ClientResult<()> {
        self.send(request).await?.error_for_status()?;
        Ok(())
    }

    /// Sends without a bearer token and without the refresh cycle. Used for
    /// login and the refresh call itself, where a 401 means bad credentials.
    pub async fn send_public(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.transport.send(&request, None).await
    }

    pub(crate) async fn install_credentials(&self, credentials: Credentials) {
        let _guard = self.refresh_lock.lock().await;
        self.tokens.set(credentials).await;
        let _ = self.events.send(SessionEvent::SignedIn);
    }

    pub(crate) async fn end_session(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.tokens.clear().await;
        let _ = self.events.send(SessionEvent::SignedOut);
    }

    /// Brings the token store past `seen_generation`, refreshing at most once
    /// per generation. Callers that lose the race for the lock observe the
    /// winner's outcome instead of issuing their own refresh.
    async fn recover(&self, seen_generation: u64) -> ClientResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.tokens.snapshot().await;

        if current.generation != seen_generation {
            return if current.access_token.is_some() {
                debug!(generation = current.generation, "token already rotated; replaying");
                Ok(())
            } else {
                Err(ClientError::SessionExpired)
            };
        }

        let Some(refresh_token) = current.refresh_token else {
            warn!("unauthorized with no refresh token available");
            self.expire_locked().await;
            return Err(ClientError::SessionExpired);
        };

        match self.call_refresh(refresh_token).await {
            Ok(refreshed) => {
                if !self
                    .tokens
                    .replace_access(refreshed.access, refreshed.refresh)
                    .await
                {
                    return Err(ClientError::SessionExpired);
                }
                info!("access token refreshed");
                let _ = self.events.send(SessionEvent::TokenRefreshed);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; clearing session");
                self.expire_locked().await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn call_refresh(&self, refresh: String) -> ClientResult<RefreshResponse> {
        let request = ApiRequest::post(REFRESH_PATH).with_json(&RefreshRequest { refresh })?;
        self.send_public(request).await?.error_for_status()?.json()
    }

    async fn expire(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.expire_locked().await;
    }

    async fn expire_locked(&self) {
        self.tokens.clear().await;
        let _ = self.events.send(SessionEvent::Expired);
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
