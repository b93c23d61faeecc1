/// Crate-wide result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by connections and their calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call or facade action was issued while the connection is not open.
    #[error("connection is not open")]
    NotConnected,

    /// The connection went away while the call was outstanding.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// The bridge answered with a non-zero `retcode`.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Another live connection already resolved to this account.
    #[error("duplicate connection for account {self_id}")]
    DuplicateIdentity { self_id: i64 },

    #[error("handshake with {endpoint} failed: {source}")]
    Handshake {
        endpoint: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid endpoint: {message}")]
    InvalidEndpoint { message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] onebridge_protocol::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_endpoint(message: impl std::fmt::Display) -> Self {
        Self::InvalidEndpoint {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn handshake(endpoint: impl Into<String>, source: Error) -> Self {
        Self::Handshake {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }
}
