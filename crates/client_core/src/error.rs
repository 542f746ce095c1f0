use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("session expired; sign in again")]
    SessionExpired,
    #[error("no records selected")]
    NoSelection,
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("failed to encode payload: {0}")]
    Encode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("credential storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Message suitable for a toast/status line at the UI boundary.
    pub fn user_notice(&self) -> String {
        match self {
            Self::Transport(_) => "Server unreachable; check the network and retry.".to_string(),
            Self::Server { message, .. } => message.clone(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::NoSelection => "Please select items first".to_string(),
            Self::Decode(_) | Self::Encode(_) | Self::InvalidRequest(_) | Self::Storage(_) => {
                self.to_string()
            }
        }
    }
}

impl From<ApiException> for ClientError {
    fn from(value: ApiException) -> Self {
        Self::Server {
            status: value.status,
            message: value.message,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
