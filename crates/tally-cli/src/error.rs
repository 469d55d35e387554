use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Invalid --data payload: {0}")]
    InvalidData(String),
    #[error("Not signed in. Run `tally auth login --email <email> --password <password>` first.")]
    NotSignedIn,
}

impl From<tally_core::auth::AuthError> for CliError {
    fn from(error: tally_core::auth::AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}
