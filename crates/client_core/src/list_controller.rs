//! Fetch/reconcile cycle for one list view.

use std::{collections::BTreeSet, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Record, RecordId},
    protocol::{ListPayload, RelocateRequest},
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, warn};

use crate::{
    error::{ClientError, ClientResult},
    gateway::AuthGateway,
    query_state::{FilterKey, QueryAction, QueryState, QueryStateSync},
    transport::ApiRequest,
};

pub const INVENTORY_ITEMS_PATH: &str = "/inventory/items/";
pub const PURCHASE_ORDERS_PATH: &str = "/purchase-orders/";
pub const REQUISITIONS_PATH: &str = "/requisitions/";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage<R> {
    pub items: Vec<R>,
    pub total_count: u64,
    pub page_count: u64,
}

impl<R: Record> ResultPage<R> {
    pub fn from_payload(payload: ListPayload<R>, page_size: u32) -> Self {
        let (items, total_count) = payload.into_parts();
        let page_size = u64::from(page_size.max(1));
        Self {
            items,
            total_count,
            page_count: total_count.div_ceil(page_size),
        }
    }

    pub fn ids(&self) -> BTreeSet<RecordId> {
        self.items.iter().map(Record::record_id).collect()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.items.iter().any(|item| item.record_id() == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome<R> {
    Applied(Arc<ResultPage<R>>),
    /// A newer refresh was issued while this one was in flight; its result
    /// was dropped without touching the view.
    Stale,
}

impl<R> RefreshOutcome<R> {
    pub fn page(&self) -> Option<&Arc<ResultPage<R>>> {
        match self {
            Self::Applied(page) => Some(page),
            Self::Stale => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    PageReplaced { total_count: u64, page_count: u64 },
    SelectionChanged { selected: usize },
    Notice(String),
    SessionExpired,
}

/// Builds the list request for `query`: non-empty filters, `low_stock` only
/// when on, pagination, and `ordering` as `field` or `-field`.
pub fn list_request(path: &str, query: &QueryState) -> ApiRequest {
    let mut request = ApiRequest::get(path);
    if !query.search.is_empty() {
        request = request.with_query("search", query.search.clone());
    }
    for key in FilterKey::ALL {
        if let Some(value) = query.filter(key).filter(|v| !v.is_empty()) {
            request = request.with_query(key.api_param(), value);
        }
    }
    request
        .with_query("page", query.page.to_string())
        .with_query("page_size", query.page_size.to_string())
        .with_query("ordering", query.ordering())
}

struct ListState<R> {
    page: Option<Arc<ResultPage<R>>>,
    selection: BTreeSet<RecordId>,
    latest_ticket: u64,
}

pub struct ListController<R> {
    gateway: Arc<AuthGateway>,
    path: String,
    query: QueryStateSync,
    state: Mutex<ListState<R>>,
    events: broadcast::Sender<ListEvent>,
}

impl<R> ListController<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    pub fn new(gateway: Arc<AuthGateway>, path: impl Into<String>, initial: QueryState) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            gateway,
            path: path.into(),
            query: QueryStateSync::new(initial),
            state: Mutex::new(ListState {
                page: None,
                selection: BTreeSet::new(),
                latest_ticket: 0,
            }),
            events,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> QueryState {
        self.query.current()
    }

    pub fn current_url_query(&self) -> String {
        self.query.current_query()
    }

    pub fn subscribe_query(&self) -> watch::Receiver<QueryState> {
        self.query.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn page(&self) -> Option<Arc<ResultPage<R>>> {
        self.state.lock().await.page.clone()
    }

    pub async fn selection(&self) -> BTreeSet<RecordId> {
        self.state.lock().await.selection.clone()
    }

    /// Applies a user action to the query state and fetches the resulting page.
    /// Page moves never go past the last page of the loaded result set.
    pub async fn dispatch(&self, action: QueryAction) -> ClientResult<RefreshOutcome<R>> {
        let page_count = self
            .state
            .lock()
            .await
            .page
            .as_ref()
            .map(|page| page.page_count);
        let next = self.query.dispatch_within(action, page_count);
        self.refresh(next).await
    }

    /// Re-syncs from a navigated URL and fetches it.
    pub async fn navigate(&self, raw_query: &str) -> ClientResult<RefreshOutcome<R>> {
        let next = self.query.replace_from_query(raw_query);
        self.refresh(next).await
    }

    pub async fn reload(&self) -> ClientResult<RefreshOutcome<R>> {
        self.refresh(self.query.current()).await
    }

    /// Fetches the page for `query`. Only the most recently issued refresh
    /// may touch the view; anything older resolves as [`RefreshOutcome::Stale`].
    pub async fn refresh(&self, query: QueryState) -> ClientResult<RefreshOutcome<R>> {
        let ticket = {
            let mut state = self.state.lock().await;
            state.latest_ticket += 1;
            state.latest_ticket
        };

        let request = list_request(&self.path, &query);
        debug!(path = %self.path, ticket, query = %request.query_string(), "fetching list page");
        let result = self
            .gateway
            .send_json::<ListPayload<R>>(request)
            .await
            .map(|payload| ResultPage::from_payload(payload, query.page_size));

        let mut state = self.state.lock().await;
        if state.latest_ticket != ticket {
            debug!(
                path = %self.path,
                ticket,
                latest = state.latest_ticket,
                "dropping stale list response"
            );
            return Ok(RefreshOutcome::Stale);
        }

        match result {
            Ok(page) => {
                let page = Arc::new(page);
                let ids = page.ids();
                let before = state.selection.len();
                state.selection.retain(|id| ids.contains(id));
                let selected = state.selection.len();
                state.page = Some(Arc::clone(&page));
                self.query.replace(query);
                drop(state);

                let _ = self.events.send(ListEvent::PageReplaced {
                    total_count: page.total_count,
                    page_count: page.page_count,
                });
                if selected != before {
                    let _ = self.events.send(ListEvent::SelectionChanged { selected });
                }
                Ok(RefreshOutcome::Applied(page))
            }
            Err(err) => {
                drop(state);
                warn!(path = %self.path, error = %err, "failed to load list page");
                self.notify_failure(&err);
                Err(err)
            }
        }
    }

    /// Toggles `id` in the selection. Ids not on the loaded page are ignored.
    /// Returns whether `id` is selected afterwards.
    pub async fn toggle_selection(&self, id: RecordId) -> bool {
        let (selected_now, count) = {
            let mut state = self.state.lock().await;
            let on_page = state.page.as_ref().is_some_and(|page| page.contains(id));
            if !on_page {
                return false;
            }
            let selected_now = if state.selection.remove(&id) {
                false
            } else {
                state.selection.insert(id);
                true
            };
            (selected_now, state.selection.len())
        };
        let _ = self
            .events
            .send(ListEvent::SelectionChanged { selected: count });
        selected_now
    }

    /// Selects every loaded record, or clears the selection when every
    /// loaded record is already selected.
    pub async fn select_all(&self) -> usize {
        let count = {
            let mut state = self.state.lock().await;
            let ids = state
                .page
                .as_ref()
                .map(|page| page.ids())
                .unwrap_or_default();
            if !ids.is_empty() && state.selection == ids {
                state.selection.clear();
            } else {
                state.selection = ids;
            }
            state.selection.len()
        };
        let _ = self
            .events
            .send(ListEvent::SelectionChanged { selected: count });
        count
    }

    pub async fn clear_selection(&self) {
        self.state.lock().await.selection.clear();
        let _ = self
            .events
            .send(ListEvent::SelectionChanged { selected: 0 });
    }

    /// Deletes every selected record, then re-fetches the current query so
    /// the page reflects server state.
    pub async fn delete_selected(&self) -> ClientResult<usize> {
        let ids = self.require_selection().await?;
        let outcome = self
            .for_each_selected(&ids, |id| ApiRequest::delete(self.record_path(id)))
            .await;
        self.finish_bulk(outcome).await
    }

    /// Moves every selected record to `location`, then re-fetches.
    pub async fn relocate_selected(&self, location: &str) -> ClientResult<usize> {
        let ids = self.require_selection().await?;
        let location = location.trim();
        if location.is_empty() {
            return Err(ClientError::InvalidRequest(
                "target location must not be empty".to_string(),
            ));
        }
        let body = RelocateRequest {
            location: location.to_string(),
        };
        let template = ApiRequest::patch("").with_json(&body)?;
        let outcome = self
            .for_each_selected(&ids, |id| ApiRequest {
                path: self.record_path(id),
                ..template.clone()
            })
            .await;
        self.finish_bulk(outcome).await
    }

    /// Serializes the selected records of the loaded page as a JSON array.
    pub async fn export_selected(&self) -> ClientResult<String> {
        let ids = self.require_selection().await?;
        let selected: Vec<R> = {
            let state = self.state.lock().await;
            state
                .page
                .as_ref()
                .map(|page| {
                    page.items
                        .iter()
                        .filter(|item| ids.contains(&item.record_id()))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        serde_json::to_string_pretty(&selected).map_err(|e| ClientError::Encode(e.to_string()))
    }

    fn record_path(&self, id: RecordId) -> String {
        format!("{}{}/", self.path, id.0)
    }

    async fn require_selection(&self) -> ClientResult<BTreeSet<RecordId>> {
        let ids = self.selection().await;
        if ids.is_empty() {
            self.notify_failure(&ClientError::NoSelection);
            return Err(ClientError::NoSelection);
        }
        Ok(ids)
    }

    /// Issues one mutating call per id, stopping at the first failure.
    async fn for_each_selected<F>(
        &self,
        ids: &BTreeSet<RecordId>,
        build: F,
    ) -> ClientResult<usize>
    where
        F: Fn(RecordId) -> ApiRequest,
    {
        let mut done = 0;
        for id in ids {
            self.gateway.send_empty(build(*id)).await?;
            done += 1;
        }
        Ok(done)
    }

    /// Mutations always end with a fresh fetch, even after a partial failure.
    async fn finish_bulk(&self, outcome: ClientResult<usize>) -> ClientResult<usize> {
        match outcome {
            Ok(done) => {
                self.reload().await?;
                Ok(done)
            }
            Err(err) => {
                self.notify_failure(&err);
                if !err.is_session_expired() {
                    let _ = self.reload().await;
                }
                Err(err)
            }
        }
    }

    fn notify_failure(&self, err: &ClientError) {
        let event = match err {
            ClientError::SessionExpired => ListEvent::SessionExpired,
            other => ListEvent::Notice(other.user_notice()),
        };
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/list_controller_tests.rs"]
mod tests;
