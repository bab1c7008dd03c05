use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid endpoint {0:?}, expected host:port")]
    InvalidEndpoint(String),
    #[error("failed to connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("timed out connecting to {url}")]
    ConnectTimeout { url: String },
    #[error("websocket transport failed")]
    Transport(#[from] tungstenite::Error),
    #[error("malformed {event} payload")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unreadable message")]
    Json(#[from] serde_json::Error),
}
