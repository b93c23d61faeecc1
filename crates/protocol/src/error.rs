/// Crate-wide result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Inbound text could not be turned into a frame.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::MalformedFrame {
            reason: reason.to_string(),
        }
    }
}
