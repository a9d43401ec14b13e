use thiserror::Error;

use crate::action::ActionKind;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Stream connection failed: {0}")]
    ConnectionError(String),

    #[error("Stream transport error: {0}")]
    SocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Undecodable market payload: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Sync engine is no longer running")]
    ChannelClosed,

    #[error("Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Market API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("{0} request already in flight")]
    ActionInFlight(ActionKind),
}

impl SyncError {
    /// True for failures of the push-stream transport, which the connection
    /// manager answers with a reconnect rather than surfacing to callers.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::SocketError(_))
    }
}
