//! Dashboard fan-out with an all-or-nothing result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use shared::protocol::{
    ActivityEntry, ListPayload, LocationSummary, PendingRequisitionSummary, StockMovement,
    StockSummary,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{error::ClientResult, gateway::AuthGateway, transport::ApiRequest};

pub const DEFAULT_DASHBOARD_LIMIT: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub stock_summary: StockSummary,
    pub recent_movements: Vec<StockMovement>,
    pub pending_requisitions: Vec<PendingRequisitionSummary>,
    pub location_summary: Vec<LocationSummary>,
    pub activity: Vec<ActivityEntry>,
    pub fetched_at: DateTime<Utc>,
}

pub struct DashboardAggregator {
    gateway: Arc<AuthGateway>,
    limit: u32,
    latest: RwLock<Option<Arc<DashboardSnapshot>>>,
}

impl DashboardAggregator {
    pub fn new(gateway: Arc<AuthGateway>, limit: u32) -> Self {
        Self {
            gateway,
            limit: limit.max(1),
            latest: RwLock::new(None),
        }
    }

    pub async fn latest(&self) -> Option<Arc<DashboardSnapshot>> {
        self.latest.read().await.clone()
    }

    /// Fetches every dashboard section concurrently. The first failing call
    /// cancels the rest and fails the whole load; the previous snapshot is
    /// kept in that case. On success the snapshot is replaced wholesale.
    pub async fn load(&self) -> ClientResult<Arc<DashboardSnapshot>> {
        let limit = self.limit.to_string();
        let result = tokio::try_join!(
            self.gateway
                .send_json::<StockSummary>(ApiRequest::get("/dashboard/stock-summary/")),
            self.fetch_list::<StockMovement>(
                ApiRequest::get("/dashboard/recent-movements/").with_query("limit", limit.clone())
            ),
            self.fetch_list::<PendingRequisitionSummary>(ApiRequest::get(
                "/dashboard/pending-requisitions/"
            )),
            self.fetch_list::<LocationSummary>(ApiRequest::get("/dashboard/location-summary/")),
            self.fetch_list::<ActivityEntry>(
                ApiRequest::get("/dashboard/activity/").with_query("limit", limit)
            ),
        );

        let (stock_summary, recent_movements, pending_requisitions, location_summary, activity) =
            match result {
                Ok(parts) => parts,
                Err(err) => {
                    warn!(error = %err, "failed to load dashboard");
                    return Err(err);
                }
            };

        let snapshot = Arc::new(DashboardSnapshot {
            stock_summary,
            recent_movements,
            pending_requisitions,
            location_summary,
            activity,
            fetched_at: Utc::now(),
        });
        *self.latest.write().await = Some(Arc::clone(&snapshot));
        info!(
            movements = snapshot.recent_movements.len(),
            pending = snapshot.pending_requisitions.len(),
            "dashboard loaded"
        );
        Ok(snapshot)
    }

    async fn fetch_list<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<Vec<T>> {
        let payload: ListPayload<T> = self.gateway.send_json(request).await?;
        Ok(payload.into_parts().0)
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
