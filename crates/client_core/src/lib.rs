//! Client-side query/session engine for the inventory API.
//!
//! [`Session`] owns the credential pair and the [`AuthGateway`] that every
//! call goes through; list views ([`ListController`]) and the dashboard
//! ([`DashboardAggregator`]) borrow the gateway from it.

pub mod aggregator;
pub mod api;
mod durable_credentials;
pub mod error;
pub mod gateway;
pub mod list_controller;
pub mod query_state;
pub mod session;
pub mod token_store;
pub mod transport;

pub use aggregator::{DashboardAggregator, DashboardSnapshot, DEFAULT_DASHBOARD_LIMIT};
pub use durable_credentials::DurableCredentialStore;
pub use error::{ClientError, ClientResult};
pub use gateway::{AuthGateway, SessionEvent};
pub use list_controller::{list_request, ListController, ListEvent, RefreshOutcome, ResultPage};
pub use query_state::{FilterKey, QueryAction, QueryState, QueryStateSync, SortDirection};
pub use session::Session;
pub use token_store::{CredentialPersistence, Credentials, NoPersistence, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpMethod, HttpTransport, ReqwestTransport};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
