//! Error type shared by the test-support library.
//!
//! Step definitions convert these into assertion panics; the library itself
//! only propagates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BddError>;

#[derive(Error, Debug)]
pub enum BddError {
    /// Missing or malformed environment properties
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport or HTTP-status failure of a REST call
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Notification channel failure
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A bounded wait elapsed without the expected event
    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },
}
