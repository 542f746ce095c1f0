use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{LocationId, RecordId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// List payload as returned by list endpoints: either DRF page-number
/// pagination or a bare array when pagination is disabled server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Paginated {
        count: u64,
        results: Vec<T>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<String>,
    },
    Bare(Vec<T>),
}

impl<T> ListPayload<T> {
    pub fn into_parts(self) -> (Vec<T>, u64) {
        match self {
            Self::Paginated { count, results, .. } => (results, count),
            Self::Bare(items) => {
                let count = items.len() as u64;
                (items, count)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub sku: String,
    pub category: String,
    pub location: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocateRequest {
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Add,
    Remove,
    Set,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentRequest {
    pub adjustment_type: AdjustmentKind,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub item: RecordId,
    pub quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier: String,
    pub lines: Vec<PurchaseOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub item: RecordId,
    pub quantity_received: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivePurchaseOrderRequest {
    pub lines: Vec<ReceivedLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequisitionLine {
    pub item: RecordId,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequisition {
    pub location: LocationId,
    pub lines: Vec<RequisitionLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequisitionRequest {
    pub from_location: LocationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    #[serde(default, alias = "total_items")]
    pub total_items: u64,
    #[serde(default, alias = "low_stock")]
    pub low_stock: u64,
    #[serde(default, alias = "out_of_stock")]
    pub out_of_stock: u64,
    #[serde(default, alias = "total_value")]
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: RecordId,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub movement_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequisitionSummary {
    pub id: RecordId,
    #[serde(default)]
    pub requisition_number: String,
    #[serde(default)]
    pub requested_by: String,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub location: String,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default)]
    pub user: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}
