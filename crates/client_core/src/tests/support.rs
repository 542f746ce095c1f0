//! Shared fixtures for the client_core unit tests.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use crate::{
    error::{ClientError, ClientResult},
    transport::{ApiRequest, ApiResponse, HttpTransport},
};

pub(crate) async fn spawn_api(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

pub(crate) fn item_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "sku": format!("SKU-{id:03}"),
        "category": "Tools",
        "location": "Warehouse A",
        "current_stock": 10,
        "reorder_level": 5,
        "unit_price": "4.50",
        "total_value": "45.00",
        "last_updated": "2024-06-12T10:30:00Z"
    })
}

pub(crate) fn page_json(ids: &[i64], count: u64) -> Value {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| item_json(*id, &format!("item-{id}")))
        .collect();
    json!({ "count": count, "results": results })
}

pub(crate) enum Reply {
    Now(ApiResponse),
    Gated(oneshot::Receiver<ApiResponse>),
    Fail(ClientError),
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub request: ApiRequest,
    pub bearer: Option<String>,
}

/// In-memory transport answering from a scripted queue, so tests control
/// exactly when each response resolves.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn push_json(&self, status: u16, body: Value) {
        self.replies
            .lock()
            .await
            .push_back(Reply::Now(ApiResponse::json_body(status, &body)));
    }

    pub(crate) async fn push_fail(&self, err: ClientError) {
        self.replies.lock().await.push_back(Reply::Fail(err));
    }

    /// Queues a reply that resolves only when the returned sender fires.
    pub(crate) async fn push_gate(&self) -> oneshot::Sender<ApiResponse> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().await.push_back(Reply::Gated(rx));
        tx
    }

    pub(crate) async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub(crate) async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub(crate) async fn wait_for_requests(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.request_count().await < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} requests"
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> ClientResult<ApiResponse> {
        let reply = {
            let mut requests = self.requests.lock().await;
            requests.push(RecordedRequest {
                request: request.clone(),
                bearer: bearer.map(str::to_string),
            });
            self.replies.lock().await.pop_front()
        };
        match reply {
            Some(Reply::Now(response)) => Ok(response),
            Some(Reply::Gated(rx)) => rx
                .await
                .map_err(|_| ClientError::Transport("gate dropped".to_string())),
            Some(Reply::Fail(err)) => Err(err),
            None => Ok(ApiResponse::new(500, b"unscripted request".to_vec())),
        }
    }
}
