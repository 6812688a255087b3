use thiserror::Error;

#[derive(Debug, Error)]
/// Errors surfaced by the Slack Web API client and RTM feed.
pub enum SlackError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api {method} failed with status {status}: {body}")]
    HttpStatus {
        method: String,
        status: u16,
        body: String,
    },
    #[error("slack {method} failed: {error}")]
    Api { method: String, error: String },
    #[error("slack {method} response missing {field}")]
    MissingField {
        method: String,
        field: &'static str,
    },
    #[error("no slack user with real_name '{0}'")]
    UserNotFound(String),
    #[error("rtm feed closed: {0}")]
    FeedClosed(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to decode slack payload: {0}")]
    Decode(#[from] serde_json::Error),
}
