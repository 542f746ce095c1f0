//! Typed wrappers for the record endpoints outside the list views.

use std::sync::Arc;

use shared::{
    domain::{InventoryItem, Location, PurchaseOrder, RecordId, Requisition},
    protocol::{
        DispatchRequisitionRequest, ListPayload, NewInventoryItem, NewPurchaseOrder,
        NewRequisition, ReceivePurchaseOrderRequest, StockAdjustmentRequest, StockMovement,
    },
};

use crate::{error::ClientResult, gateway::AuthGateway, transport::ApiRequest};

#[derive(Clone)]
pub struct InventoryApi {
    gateway: Arc<AuthGateway>,
}

impl InventoryApi {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    pub async fn get_item(&self, id: RecordId) -> ClientResult<InventoryItem> {
        self.gateway
            .send_json(ApiRequest::get(format!("/inventory/items/{id}/")))
            .await
    }

    pub async fn create_item(&self, item: &NewInventoryItem) -> ClientResult<InventoryItem> {
        self.gateway
            .send_json(ApiRequest::post("/inventory/items/").with_json(item)?)
            .await
    }

    pub async fn update_item(
        &self,
        id: RecordId,
        item: &NewInventoryItem,
    ) -> ClientResult<InventoryItem> {
        self.gateway
            .send_json(ApiRequest::put(format!("/inventory/items/{id}/")).with_json(item)?)
            .await
    }

    pub async fn delete_item(&self, id: RecordId) -> ClientResult<()> {
        self.gateway
            .send_empty(ApiRequest::delete(format!("/inventory/items/{id}/")))
            .await
    }

    pub async fn adjust_stock(
        &self,
        id: RecordId,
        adjustment: &StockAdjustmentRequest,
    ) -> ClientResult<InventoryItem> {
        self.gateway
            .send_json(
                ApiRequest::post(format!("/inventory/items/{id}/adjust/")).with_json(adjustment)?,
            )
            .await
    }

    pub async fn low_stock_items(&self) -> ClientResult<Vec<InventoryItem>> {
        let payload: ListPayload<InventoryItem> = self
            .gateway
            .send_json(ApiRequest::get("/inventory/items/low-stock/"))
            .await?;
        Ok(payload.into_parts().0)
    }

    pub async fn movements(&self, item: Option<RecordId>) -> ClientResult<Vec<StockMovement>> {
        let mut request = ApiRequest::get("/inventory/movements/");
        if let Some(item) = item {
            request = request.with_query("item", item.to_string());
        }
        let payload: ListPayload<StockMovement> = self.gateway.send_json(request).await?;
        Ok(payload.into_parts().0)
    }
}

#[derive(Clone)]
pub struct PurchaseOrderApi {
    gateway: Arc<AuthGateway>,
}

impl PurchaseOrderApi {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(&self, order: &NewPurchaseOrder) -> ClientResult<PurchaseOrder> {
        self.gateway
            .send_json(ApiRequest::post("/purchase-orders/").with_json(order)?)
            .await
    }

    pub async fn approve(&self, id: RecordId) -> ClientResult<PurchaseOrder> {
        self.gateway
            .send_json(ApiRequest::post(format!("/purchase-orders/{id}/approve/")))
            .await
    }

    pub async fn receive(
        &self,
        id: RecordId,
        received: &ReceivePurchaseOrderRequest,
    ) -> ClientResult<PurchaseOrder> {
        self.gateway
            .send_json(
                ApiRequest::post(format!("/purchase-orders/{id}/receive/")).with_json(received)?,
            )
            .await
    }
}

#[derive(Clone)]
pub struct RequisitionApi {
    gateway: Arc<AuthGateway>,
}

impl RequisitionApi {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(&self, requisition: &NewRequisition) -> ClientResult<Requisition> {
        self.gateway
            .send_json(ApiRequest::post("/requisitions/").with_json(requisition)?)
            .await
    }

    pub async fn approve(&self, id: RecordId) -> ClientResult<Requisition> {
        self.gateway
            .send_json(ApiRequest::post(format!("/requisitions/{id}/approve/")))
            .await
    }

    pub async fn dispatch(
        &self,
        id: RecordId,
        dispatch: &DispatchRequisitionRequest,
    ) -> ClientResult<Requisition> {
        self.gateway
            .send_json(
                ApiRequest::post(format!("/requisitions/{id}/dispatch/")).with_json(dispatch)?,
            )
            .await
    }
}

#[derive(Clone)]
pub struct LocationApi {
    gateway: Arc<AuthGateway>,
}

impl LocationApi {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    pub async fn list_locations(&self) -> ClientResult<Vec<Location>> {
        let payload: ListPayload<Location> =
            self.gateway.send_json(ApiRequest::get("/locations/")).await?;
        Ok(payload.into_parts().0)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
