//! Error types for tally-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::store::StorageError;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Hosted document store failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Credential or session failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Backend settings are missing or invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Operation needs a signed-in user
    #[error("Not signed in")]
    NotSignedIn,

    /// Caller-supplied input is malformed
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
