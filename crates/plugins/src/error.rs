use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no bridge connections to enable plugins on")]
    NoConnections,

    #[error("plugin '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("plugin '{name}' is not active")]
    NotActive { name: String },

    /// `setup` returned an error or panicked. Only this plugin is affected.
    #[error("plugin '{name}' v{version} failed to set up: {message}")]
    Setup {
        name: String,
        version: String,
        message: String,
    },

    /// Some teardown callables failed. The plugin is unregistered anyway.
    #[error("plugin '{name}' teardown failed: {}", failures.join("; "))]
    Teardown { name: String, failures: Vec<String> },

    #[error("cannot load plugin '{id}': {message}")]
    Load { id: String, message: String },

    #[error("service '{name}' is already registered")]
    ServiceExists { name: String },

    #[error("invalid schedule '{expr}': {message}")]
    InvalidSchedule { expr: String, message: String },

    #[error(transparent)]
    Client(#[from] onebridge_client::Error),
}

impl Error {
    #[must_use]
    pub fn load(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            id: id.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_schedule(expr: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidSchedule {
            expr: expr.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
