use rust_decimal::Decimal;
use serde_json::json;
use shared::{
    domain::{LocationId, PurchaseOrderStatus, RequisitionStatus},
    protocol::{AdjustmentKind, ReceivedLine, RequisitionLine},
};

use super::*;
use crate::{
    error::ClientError,
    test_support::{item_json, ScriptedTransport},
    token_store::{Credentials, TokenStore},
    transport::HttpMethod,
};

async fn gateway_for(transport: Arc<ScriptedTransport>) -> Arc<AuthGateway> {
    let tokens = Arc::new(TokenStore::new());
    tokens.set(Credentials::new("access-1", "refresh-1")).await;
    Arc::new(AuthGateway::new(transport, tokens))
}

#[tokio::test]
async fn adjust_stock_posts_to_item_action() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, item_json(3, "Hammer")).await;
    let api = InventoryApi::new(gateway_for(transport.clone()).await);

    let item = api
        .adjust_stock(
            RecordId(3),
            &StockAdjustmentRequest {
                adjustment_type: AdjustmentKind::Remove,
                quantity: 4,
                reason: Some("damaged".to_string()),
            },
        )
        .await
        .expect("adjust");

    assert_eq!(item.id, RecordId(3));
    let requests = transport.requests().await;
    assert_eq!(requests[0].request.method, HttpMethod::Post);
    assert_eq!(requests[0].request.path, "/inventory/items/3/adjust/");
    assert_eq!(
        requests[0].request.body,
        Some(json!({ "adjustment_type": "remove", "quantity": 4, "reason": "damaged" }))
    );
}

#[tokio::test]
async fn create_and_update_item_send_full_record() {
    let transport = ScriptedTransport::new();
    transport.push_json(201, item_json(9, "Saw")).await;
    transport.push_json(200, item_json(9, "Saw")).await;
    let api = InventoryApi::new(gateway_for(transport.clone()).await);
    let draft = NewInventoryItem {
        name: "Saw".to_string(),
        sku: "SKU-009".to_string(),
        category: "Tools".to_string(),
        location: "Warehouse A".to_string(),
        current_stock: 10,
        reorder_level: 5,
        unit_price: Decimal::new(450, 2),
    };

    api.create_item(&draft).await.expect("create");
    api.update_item(RecordId(9), &draft).await.expect("update");

    let requests = transport.requests().await;
    assert_eq!(requests[0].request.method, HttpMethod::Post);
    assert_eq!(requests[0].request.path, "/inventory/items/");
    assert_eq!(requests[1].request.method, HttpMethod::Put);
    assert_eq!(requests[1].request.path, "/inventory/items/9/");
    let body = requests[1].request.body.clone().expect("body");
    assert_eq!(body["unit_price"], "4.50");
    assert_eq!(body["sku"], "SKU-009");
}

#[tokio::test]
async fn get_item_maps_not_found_to_server_error() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(404, json!({ "detail": "Not found." }))
        .await;
    let api = InventoryApi::new(gateway_for(transport).await);

    let err = api.get_item(RecordId(404)).await.expect_err("missing");

    assert_eq!(
        err,
        ClientError::Server {
            status: 404,
            message: "Not found.".to_string()
        }
    );
}

#[tokio::test]
async fn movements_filter_by_item_when_given() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(
            200,
            json!([{
                "id": 1,
                "item_name": "Hammer",
                "movement_type": "out",
                "quantity": -2,
                "timestamp": "2024-06-12T10:30:00Z"
            }]),
        )
        .await;
    transport.push_json(200, json!({ "count": 0, "results": [] })).await;
    let api = InventoryApi::new(gateway_for(transport.clone()).await);

    let filtered = api.movements(Some(RecordId(1))).await.expect("movements");
    let all = api.movements(None).await.expect("movements");

    assert_eq!(filtered[0].quantity, -2);
    assert!(all.is_empty());
    let requests = transport.requests().await;
    assert_eq!(requests[0].request.query_param("item"), Some("1"));
    assert_eq!(requests[1].request.query_param("item"), None);
}

#[tokio::test]
async fn purchase_order_workflow_hits_action_endpoints() {
    let order = json!({ "id": 12, "po_number": "PO-0012", "supplier": "Acme", "status": "approved" });
    let received = json!({ "id": 12, "po_number": "PO-0012", "supplier": "Acme", "status": "received" });
    let transport = ScriptedTransport::new();
    transport.push_json(200, order).await;
    transport.push_json(200, received).await;
    let api = PurchaseOrderApi::new(gateway_for(transport.clone()).await);

    let approved = api.approve(RecordId(12)).await.expect("approve");
    let done = api
        .receive(
            RecordId(12),
            &ReceivePurchaseOrderRequest {
                lines: vec![ReceivedLine {
                    item: RecordId(3),
                    quantity_received: 10,
                }],
            },
        )
        .await
        .expect("receive");

    assert_eq!(approved.status, PurchaseOrderStatus::Approved);
    assert_eq!(done.status, PurchaseOrderStatus::Received);
    let requests = transport.requests().await;
    assert_eq!(requests[0].request.path, "/purchase-orders/12/approve/");
    assert_eq!(requests[0].request.body, None);
    assert_eq!(requests[1].request.path, "/purchase-orders/12/receive/");
    assert_eq!(
        requests[1].request.body,
        Some(json!({ "lines": [{ "item": 3, "quantity_received": 10 }] }))
    );
}

#[tokio::test]
async fn requisition_create_and_dispatch() {
    let pending = json!({ "id": 4, "requisition_number": "REQ-0004", "status": "pending" });
    let dispatched = json!({ "id": 4, "requisition_number": "REQ-0004", "status": "dispatched" });
    let transport = ScriptedTransport::new();
    transport.push_json(201, pending).await;
    transport.push_json(200, dispatched).await;
    let api = RequisitionApi::new(gateway_for(transport.clone()).await);

    let created = api
        .create(&NewRequisition {
            location: LocationId(2),
            lines: vec![RequisitionLine {
                item: RecordId(3),
                quantity: 5,
            }],
            notes: None,
        })
        .await
        .expect("create");
    let sent = api
        .dispatch(
            created.id,
            &DispatchRequisitionRequest {
                from_location: LocationId(1),
                notes: None,
            },
        )
        .await
        .expect("dispatch");

    assert_eq!(created.status, RequisitionStatus::Pending);
    assert_eq!(sent.status, RequisitionStatus::Dispatched);
    let requests = transport.requests().await;
    assert_eq!(requests[0].request.path, "/requisitions/");
    assert_eq!(
        requests[0].request.body,
        Some(json!({ "location": 2, "lines": [{ "item": 3, "quantity": 5 }] }))
    );
    assert_eq!(requests[1].request.path, "/requisitions/4/dispatch/");
}

#[tokio::test]
async fn list_locations_accepts_paginated_payload() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(
            200,
            json!({
                "count": 2,
                "next": null,
                "previous": null,
                "results": [
                    { "id": 1, "name": "Warehouse A", "code": "WH-A" },
                    { "id": 2, "name": "Site Office" }
                ]
            }),
        )
        .await;
    let api = LocationApi::new(gateway_for(transport).await);

    let locations = api.list_locations().await.expect("locations");

    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0].code.as_deref(), Some("WH-A"));
    assert_eq!(locations[1].code, None);
}
