//! Client configuration for the hosted backend.
//!
//! `FirebaseConfig` is the loosely-typed, serializable form shared by config
//! files and environment overrides. `resolve` validates it into a
//! `ClientConfig` every network client is built from.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_DATABASE_ID: &str = "(default)";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Configuration validation failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),
    #[error("Setting '{0}' must include http:// or https://")]
    InvalidUrl(&'static str),
    #[error("Setting '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Backend settings as stored in profiles and read from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    /// Override for the Firestore REST base URL (emulator, tests)
    #[serde(default)]
    pub firestore_url: Option<String>,
    /// Override for the Identity Toolkit base URL (emulator, tests)
    #[serde(default)]
    pub identity_toolkit_url: Option<String>,
    /// Override for the secure token base URL (emulator, tests)
    #[serde(default)]
    pub secure_token_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl FirebaseConfig {
    /// Read settings from the process environment.
    ///
    /// `FIRESTORE_EMULATOR_HOST` and `FIREBASE_AUTH_EMULATOR_HOST` (host:port)
    /// point the clients at local emulators.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let firestore_url = normalize_text_option(lookup("FIRESTORE_URL")).or_else(|| {
            normalize_text_option(lookup("FIRESTORE_EMULATOR_HOST"))
                .map(|host| format!("http://{host}/v1"))
        });
        let auth_emulator = normalize_text_option(lookup("FIREBASE_AUTH_EMULATOR_HOST"));

        Self {
            api_key: normalize_text_option(lookup("FIREBASE_API_KEY")),
            project_id: normalize_text_option(lookup("FIREBASE_PROJECT_ID")),
            database_id: normalize_text_option(lookup("FIRESTORE_DATABASE_ID")),
            firestore_url,
            identity_toolkit_url: auth_emulator
                .as_ref()
                .map(|host| format!("http://{host}/identitytoolkit.googleapis.com/v1")),
            secure_token_url: auth_emulator
                .as_ref()
                .map(|host| format!("http://{host}/securetoken.googleapis.com/v1")),
            request_timeout_secs: lookup("TALLY_REQUEST_TIMEOUT_SECS")
                .and_then(|raw| raw.trim().parse().ok()),
        }
    }

    /// Fill unset values from `fallback`; values already set win.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            api_key: normalize_text_option(self.api_key).or(fallback.api_key),
            project_id: normalize_text_option(self.project_id).or(fallback.project_id),
            database_id: normalize_text_option(self.database_id).or(fallback.database_id),
            firestore_url: normalize_text_option(self.firestore_url).or(fallback.firestore_url),
            identity_toolkit_url: normalize_text_option(self.identity_toolkit_url)
                .or(fallback.identity_toolkit_url),
            secure_token_url: normalize_text_option(self.secure_token_url)
                .or(fallback.secure_token_url),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
        }
    }

    /// Validate and fill defaults.
    pub fn resolve(&self) -> Result<ClientConfig, ConfigError> {
        let api_key =
            normalize_text_option(self.api_key.clone()).ok_or(ConfigError::Missing("api_key"))?;
        let project_id = normalize_text_option(self.project_id.clone())
            .ok_or(ConfigError::Missing("project_id"))?;
        let database_id = normalize_text_option(self.database_id.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_ID.to_string());

        let request_timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("request_timeout_secs"));
        }

        Ok(ClientConfig {
            api_key,
            project_id,
            database_id,
            firestore_url: resolve_url(
                self.firestore_url.clone(),
                DEFAULT_FIRESTORE_URL,
                "firestore_url",
            )?,
            identity_toolkit_url: resolve_url(
                self.identity_toolkit_url.clone(),
                DEFAULT_IDENTITY_TOOLKIT_URL,
                "identity_toolkit_url",
            )?,
            secure_token_url: resolve_url(
                self.secure_token_url.clone(),
                DEFAULT_SECURE_TOKEN_URL,
                "secure_token_url",
            )?,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

/// Validated backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
    pub firestore_url: String,
    pub identity_toolkit_url: String,
    pub secure_token_url: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Minimal config pointing every service at `base_url` (emulators, tests).
    pub fn for_base_url(base_url: &str, project_id: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            api_key: "test-api-key".to_string(),
            project_id: project_id.to_string(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            firestore_url: format!("{base_url}/v1"),
            identity_toolkit_url: format!("{base_url}/v1"),
            secure_token_url: format!("{base_url}/token"),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

fn resolve_url(
    value: Option<String>,
    default: &str,
    field: &'static str,
) -> Result<String, ConfigError> {
    let url = normalize_text_option(value).unwrap_or_else(|| default.to_string());
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::InvalidUrl(field))
    }
}
