use thiserror::Error;

/// Failure taxonomy for the chat client. Public methods return these instead
/// of panicking; connection-lifecycle failures additionally reach the
/// `on_error` hook.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No auth token was available when a connection or request was attempted.
    /// The caller must retry after acquiring one.
    #[error("no auth token available")]
    AuthMissing,

    /// Socket-level error from the transport. Does not by itself close the
    /// connection; a subsequent close event, if any, does that.
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Inbound frame that did not parse as an envelope, or a payload that
    /// failed to serialize. Malformed inbound frames are dropped, never fatal.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// A send was attempted with no open socket. Nothing is queued.
    #[error("websocket is not connected")]
    SendWhileDisconnected,

    #[error("invalid chat endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("api request failed: {0}")]
    Api(#[from] reqwest::Error),
}
