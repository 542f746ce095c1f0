//! List query state, its reducer, and the URL query-string mirror.

use std::collections::BTreeMap;

use tokio::sync::watch;
use url::form_urlencoded;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SORT_FIELD: &str = "name";

const SEARCH_KEY: &str = "search";
const PAGE_KEY: &str = "page";
const PAGE_SIZE_KEY: &str = "pageSize";
const SORT_KEY: &str = "sort";
const ORDER_KEY: &str = "order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    Category,
    Location,
    Status,
    LowStock,
}

impl FilterKey {
    pub const ALL: [FilterKey; 4] = [
        FilterKey::Category,
        FilterKey::Location,
        FilterKey::Status,
        FilterKey::LowStock,
    ];

    /// Key used in the browser-facing query string.
    pub fn url_key(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Location => "location",
            Self::Status => "status",
            Self::LowStock => "lowStock",
        }
    }

    /// Key used in requests to the list endpoints.
    pub fn api_param(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Location => "location",
            Self::Status => "status",
            Self::LowStock => "low_stock",
        }
    }

    pub fn from_url_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.url_key() == key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub search: String,
    /// Only non-empty values; `LowStock` is present (as `"true"`) only when on.
    pub filters: BTreeMap<FilterKey, String>,
    pub sort_field: String,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub page_size: u32,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search: String::new(),
            filters: BTreeMap::new(),
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_direction: SortDirection::Asc,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAction {
    SetSearch(String),
    SetFilter(FilterKey, Option<String>),
    SetLowStock(bool),
    ClearFilters,
    SortBy(String),
    SetPage(u32),
    NextPage,
    PreviousPage,
    SetPageSize(u32),
}

impl QueryState {
    pub fn filter(&self, key: FilterKey) -> Option<&str> {
        self.filters.get(&key).map(String::as_str)
    }

    pub fn low_stock(&self) -> bool {
        self.filters.contains_key(&FilterKey::LowStock)
    }

    /// Pure state transition. Changing what the result set contains sends the
    /// view back to page 1; sorting keeps the page position.
    pub fn apply(mut self, action: QueryAction) -> Self {
        match action {
            QueryAction::SetSearch(search) => {
                self.search = search;
                self.page = DEFAULT_PAGE;
            }
            QueryAction::SetFilter(FilterKey::LowStock, value) => {
                self.set_low_stock(value.as_deref() == Some("true"));
                self.page = DEFAULT_PAGE;
            }
            QueryAction::SetFilter(key, value) => {
                match value.filter(|v| !v.is_empty()) {
                    Some(value) => {
                        self.filters.insert(key, value);
                    }
                    None => {
                        self.filters.remove(&key);
                    }
                }
                self.page = DEFAULT_PAGE;
            }
            QueryAction::SetLowStock(enabled) => {
                self.set_low_stock(enabled);
                self.page = DEFAULT_PAGE;
            }
            QueryAction::ClearFilters => {
                self.search.clear();
                self.filters.clear();
                self.page = DEFAULT_PAGE;
            }
            QueryAction::SortBy(field) => {
                if field.is_empty() {
                    return self;
                }
                if field == self.sort_field {
                    self.sort_direction = self.sort_direction.flipped();
                } else {
                    self.sort_field = field;
                    self.sort_direction = SortDirection::Asc;
                }
            }
            QueryAction::SetPage(page) => self.page = page.max(1),
            QueryAction::NextPage => self.page = self.page.saturating_add(1),
            QueryAction::PreviousPage => self.page = self.page.saturating_sub(1).max(1),
            QueryAction::SetPageSize(size) => {
                self.page_size = size.max(1);
                self.page = DEFAULT_PAGE;
            }
        }
        self
    }

    /// Like [`apply`](Self::apply), but page moves (`NextPage`, `SetPage`)
    /// stop at the last page of the currently loaded result set.
    pub fn apply_within(self, action: QueryAction, page_count: Option<u64>) -> Self {
        let moves_page = matches!(action, QueryAction::NextPage | QueryAction::SetPage(_));
        let mut next = self.apply(action);
        if let (true, Some(page_count)) = (moves_page, page_count) {
            let last = u32::try_from(page_count.max(1)).unwrap_or(u32::MAX);
            next.page = next.page.min(last);
        }
        next
    }

    fn set_low_stock(&mut self, enabled: bool) {
        if enabled {
            self.filters.insert(FilterKey::LowStock, "true".to_string());
        } else {
            self.filters.remove(&FilterKey::LowStock);
        }
    }

    /// Parses a URL query string (with or without the leading `?`).
    /// Unknown keys are ignored; missing, empty, or malformed values fall
    /// back to their defaults.
    pub fn from_query(raw: &str) -> Self {
        let mut state = Self::default();
        let raw = raw.strip_prefix('?').unwrap_or(raw);

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                SEARCH_KEY => state.search = value.into_owned(),
                PAGE_KEY => {
                    state.page = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .unwrap_or(DEFAULT_PAGE)
                }
                PAGE_SIZE_KEY => {
                    state.page_size = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .unwrap_or(DEFAULT_PAGE_SIZE)
                }
                SORT_KEY => state.sort_field = value.into_owned(),
                ORDER_KEY => {
                    state.sort_direction = if value == "desc" {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    }
                }
                other => match FilterKey::from_url_key(other) {
                    Some(FilterKey::LowStock) => state.set_low_stock(value == "true"),
                    Some(filter) => {
                        state.filters.insert(filter, value.into_owned());
                    }
                    None => {}
                },
            }
        }

        state
    }

    /// Emits only the fields that differ from their defaults, in a fixed
    /// key order. `from_query(to_query(s)) == s` for every state the reducer
    /// can produce.
    pub fn to_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if !self.search.is_empty() {
            out.append_pair(SEARCH_KEY, &self.search);
        }
        for key in FilterKey::ALL {
            if let Some(value) = self.filters.get(&key).filter(|v| !v.is_empty()) {
                out.append_pair(key.url_key(), value);
            }
        }
        if self.page != DEFAULT_PAGE {
            out.append_pair(PAGE_KEY, &self.page.to_string());
        }
        if self.page_size != DEFAULT_PAGE_SIZE {
            out.append_pair(PAGE_SIZE_KEY, &self.page_size.to_string());
        }
        if self.sort_field != DEFAULT_SORT_FIELD {
            out.append_pair(SORT_KEY, &self.sort_field);
        }
        if self.sort_direction != SortDirection::Asc {
            out.append_pair(ORDER_KEY, self.sort_direction.as_str());
        }
        out.finish()
    }

    /// `ordering` parameter for the list endpoints: `field` or `-field`.
    pub fn ordering(&self) -> String {
        match self.sort_direction {
            SortDirection::Asc => self.sort_field.clone(),
            SortDirection::Desc => format!("-{}", self.sort_field),
        }
    }
}

/// Current query state of one mounted list view plus change notification.
pub struct QueryStateSync {
    tx: watch::Sender<QueryState>,
}

impl QueryStateSync {
    pub fn new(initial: QueryState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn from_query(raw: &str) -> Self {
        Self::new(QueryState::from_query(raw))
    }

    pub fn current(&self) -> QueryState {
        self.tx.borrow().clone()
    }

    pub fn current_query(&self) -> String {
        self.tx.borrow().to_query()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.tx.subscribe()
    }

    /// Applies `action` and notifies subscribers when the state changed.
    pub fn dispatch(&self, action: QueryAction) -> QueryState {
        self.update(|state| state.apply(action))
    }

    /// [`dispatch`](Self::dispatch) with page moves bounded by `page_count`.
    pub fn dispatch_within(&self, action: QueryAction, page_count: Option<u64>) -> QueryState {
        self.update(|state| state.apply_within(action, page_count))
    }

    /// Re-syncs from a navigated URL (back/forward, pasted link).
    pub fn replace_from_query(&self, raw: &str) -> QueryState {
        self.replace(QueryState::from_query(raw))
    }

    pub fn replace(&self, next: QueryState) -> QueryState {
        self.update(|_| next)
    }

    /// Read-modify-write under the channel's lock, so concurrent updates
    /// cannot drop each other's changes.
    fn update(&self, transition: impl FnOnce(QueryState) -> QueryState) -> QueryState {
        let mut next = QueryState::default();
        self.tx.send_if_modified(|state| {
            next = transition(state.clone());
            if *state == next {
                false
            } else {
                *state = next.clone();
                true
            }
        });
        next
    }
}

#[cfg(test)]
#[path = "tests/query_state_tests.rs"]
mod tests;
