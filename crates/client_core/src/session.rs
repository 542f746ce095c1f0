use std::{sync::Arc, time::Duration};

use shared::{
    domain::{InventoryItem, PurchaseOrder, Requisition, UserProfile},
    protocol::{LoginRequest, TokenPairResponse},
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    aggregator::DashboardAggregator,
    api::{InventoryApi, LocationApi, PurchaseOrderApi, RequisitionApi},
    error::{ClientError, ClientResult},
    gateway::{AuthGateway, SessionEvent},
    list_controller::{
        ListController, INVENTORY_ITEMS_PATH, PURCHASE_ORDERS_PATH, REQUISITIONS_PATH,
    },
    query_state::QueryState,
    token_store::{CredentialPersistence, Credentials, TokenStore},
    transport::{ApiRequest, HttpTransport, ReqwestTransport},
};

pub const LOGIN_PATH: &str = "/auth/login/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const PROFILE_PATH: &str = "/auth/profile/";

/// Owns the token store and gateway for one signed-in lifetime and hands
/// out the views that share them.
pub struct Session {
    gateway: Arc<AuthGateway>,
}

impl Session {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        persistence: Arc<dyn CredentialPersistence>,
    ) -> Self {
        let tokens = Arc::new(TokenStore::with_persistence(persistence));
        Self {
            gateway: Arc::new(AuthGateway::new(transport, tokens)),
        }
    }

    pub fn connect(
        api_base_url: &str,
        request_timeout: Option<Duration>,
        persistence: Arc<dyn CredentialPersistence>,
    ) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(api_base_url, request_timeout)?;
        Ok(Self::new(Arc::new(transport), persistence))
    }

    pub fn gateway(&self) -> &Arc<AuthGateway> {
        &self.gateway
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.gateway.tokens()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.gateway.subscribe_events()
    }

    pub async fn is_authenticated(&self) -> bool {
        !self.tokens().is_empty().await
    }

    /// Loads credentials persisted by an earlier run.
    pub async fn restore(&self) -> ClientResult<bool> {
        self.tokens().restore().await.map_err(|err| {
            warn!(error = %err, "failed to read persisted credentials");
            ClientError::Storage(format!("failed to read persisted credentials: {err:#}"))
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<()> {
        let request = ApiRequest::post(LOGIN_PATH).with_json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let tokens: TokenPairResponse = self
            .gateway
            .send_public(request)
            .await?
            .error_for_status()?
            .json()?;
        self.gateway
            .install_credentials(Credentials::new(tokens.access, tokens.refresh))
            .await;
        info!(%username, "signed in");
        Ok(())
    }

    /// Tells the server (best effort) and drops local credentials either way.
    pub async fn logout(&self) {
        if self.is_authenticated().await {
            if let Err(err) = self.gateway.send_empty(ApiRequest::post(LOGOUT_PATH)).await {
                warn!(error = %err, "server-side logout failed");
            }
        }
        self.gateway.end_session().await;
        info!("signed out");
    }

    pub async fn profile(&self) -> ClientResult<UserProfile> {
        self.gateway.send_json(ApiRequest::get(PROFILE_PATH)).await
    }

    pub fn inventory_items(&self, initial: QueryState) -> ListController<InventoryItem> {
        ListController::new(Arc::clone(&self.gateway), INVENTORY_ITEMS_PATH, initial)
    }

    pub fn purchase_orders(&self, initial: QueryState) -> ListController<PurchaseOrder> {
        ListController::new(Arc::clone(&self.gateway), PURCHASE_ORDERS_PATH, initial)
    }

    pub fn requisitions(&self, initial: QueryState) -> ListController<Requisition> {
        ListController::new(Arc::clone(&self.gateway), REQUISITIONS_PATH, initial)
    }

    pub fn dashboard(&self, limit: u32) -> DashboardAggregator {
        DashboardAggregator::new(Arc::clone(&self.gateway), limit)
    }

    pub fn inventory(&self) -> InventoryApi {
        InventoryApi::new(Arc::clone(&self.gateway))
    }

    pub fn purchase_order_api(&self) -> PurchaseOrderApi {
        PurchaseOrderApi::new(Arc::clone(&self.gateway))
    }

    pub fn requisition_api(&self) -> RequisitionApi {
        RequisitionApi::new(Arc::clone(&self.gateway))
    }

    pub fn locations(&self) -> LocationApi {
        LocationApi::new(Arc::clone(&self.gateway))
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
