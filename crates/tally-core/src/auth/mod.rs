//! Email/password authentication against Firebase Identity Toolkit.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::util::{compact_text, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{message}")]
    Api { code: String, message: String },
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

impl AuthError {
    /// Provider error code (`EMAIL_EXISTS`, `INVALID_PASSWORD`, ...)
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// The provider answered and refused the credentials; retrying the same
    /// request cannot succeed. Transport failures, 5xx and throttling are
    /// not rejections.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::Api { code, .. } => !(code.starts_with("HTTP_5")
                || matches!(
                    code.as_str(),
                    "HTTP_429" | "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED"
                )),
            _ => false,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where the signed-in session lives between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Session storage that forgets everything on exit.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Receives the signed-in user on every sign-in, sign-out and restore.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct UserSubscription {
    receiver: watch::Receiver<Option<AuthUser>>,
}

impl UserSubscription {
    pub fn current(&self) -> Option<AuthUser> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next transition. `None` once the auth client is gone.
    pub async fn changed(&mut self) -> Option<Option<AuthUser>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[derive(Clone)]
pub struct AuthClient<S: SessionPersistence> {
    identity_url: String,
    secure_token_url: String,
    api_key: String,
    client: Client,
    store: S,
    user: Arc<watch::Sender<Option<AuthUser>>>,
}

impl<S: SessionPersistence> AuthClient<S> {
    pub fn new(config: &ClientConfig, store: S) -> AuthResult<Self> {
        let api_key = config.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::InvalidConfiguration("API key must not be empty"));
        }

        let (user, _) = watch::channel(None);
        Ok(Self {
            identity_url: config.identity_toolkit_url.trim_end_matches('/').to_string(),
            secure_token_url: config.secure_token_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder().timeout(config.request_timeout).build()?,
            store,
            user: Arc::new(user),
        })
    }

    pub fn subscribe(&self) -> UserSubscription {
        UserSubscription {
            receiver: self.user.subscribe(),
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.user.borrow().clone()
    }

    /// Persisted session as-is, without refreshing.
    pub fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        self.store.load_session()
    }

    fn publish(&self, user: Option<AuthUser>) {
        self.user.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A session the provider rejects is cleared. When the provider cannot
    /// be reached the stored session is returned unrefreshed so cached data
    /// and queued writes stay tied to its user.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            self.publish(None);
            return Ok(None);
        };

        if !stored_session.is_expired() {
            self.publish(Some(stored_session.user.clone()));
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) if error.is_rejection() => {
                tracing::warn!("Persisted session was rejected: {}", error);
                self.store.clear_session()?;
                self.publish(None);
                Ok(None)
            }
            Err(error) => {
                tracing::warn!("Keeping unrefreshed session: {}", error);
                self.publish(Some(stored_session.user.clone()));
                Ok(Some(stored_session))
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let request = self
            .client
            .post(self.identity_endpoint("accounts:signUp"))
            .json(&serde_json::json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }));
        let session = send_json::<IdentityTokenResponse>(request)
            .await?
            .into_session()?;

        self.establish(&session)?;
        tracing::info!("Created account {}", session.user.uid);
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let request = self
            .client
            .post(self.identity_endpoint("accounts:signInWithPassword"))
            .json(&serde_json::json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }));
        let session = send_json::<IdentityTokenResponse>(request)
            .await?
            .into_session()?;

        self.establish(&session)?;
        Ok(session)
    }

    /// Ask the provider to email a password reset link.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        if email.trim().is_empty() {
            return Err(AuthError::InvalidInput("Email is required"));
        }

        let request = self
            .client
            .post(self.identity_endpoint("accounts:sendOobCode"))
            .json(&serde_json::json!({
                "requestType": "PASSWORD_RESET",
                "email": email.trim(),
            }));
        check_status(request.send().await?).await?;
        Ok(())
    }

    /// Exchange the refresh token for a new id token and persist it.
    pub async fn refresh_session(&self, session: &AuthSession) -> AuthResult<AuthSession> {
        if session.refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidInput("Refresh token must not be empty"));
        }

        let request = self
            .client
            .post(format!("{}/token", self.secure_token_url))
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ]);
        let payload = send_json::<SecureTokenResponse>(request).await?;

        let refreshed = AuthSession {
            id_token: payload.id_token,
            refresh_token: payload.refresh_token,
            expires_at: expires_at(payload.expires_in.as_deref()),
            user: AuthUser {
                uid: payload.user_id.unwrap_or_else(|| session.user.uid.clone()),
                email: session.user.email.clone(),
            },
        };
        self.establish(&refreshed)?;
        Ok(refreshed)
    }

    /// Forget the local session. Id tokens are stateless, so there is no
    /// server call.
    pub fn sign_out(&self) -> AuthResult<()> {
        self.store.clear_session()?;
        self.publish(None);
        Ok(())
    }

    fn establish(&self, session: &AuthSession) -> AuthResult<()> {
        self.store.save_session(session)?;
        self.publish(Some(session.user.clone()));
        Ok(())
    }

    fn identity_endpoint(&self, method: &str) -> String {
        format!(
            "{}/{method}?key={}",
            self.identity_url,
            urlencoding::encode(&self.api_key)
        )
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::InvalidInput("Email is required"));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required"));
    }
    Ok(())
}

fn expires_at(expires_in: Option<&str>) -> i64 {
    let expires_in = expires_in
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
    unix_timestamp_now().saturating_add(expires_in)
}

async fn send_json<T: serde::de::DeserializeOwned>(request: RequestBuilder) -> AuthResult<T> {
    let response = check_status(request.send().await?).await?;
    Ok(response.json::<T>().await?)
}

async fn check_status(response: Response) -> AuthResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(parse_api_error(status, &body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityTokenResponse {
    local_id: String,
    email: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

impl IdentityTokenResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        match (self.id_token, self.refresh_token) {
            (Some(id_token), Some(refresh_token)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at: expires_at(self.expires_in.as_deref()),
                user: AuthUser {
                    uid: self.local_id,
                    email: self.email,
                },
            }),
            _ => Err(AuthError::Api {
                code: "MISSING_TOKENS".to_string(),
                message: "Auth response did not include session tokens".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecureTokenResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn parse_api_error(status: u16, body: &str) -> AuthError {
    let raw = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message);

    let Some(raw) = raw else {
        let trimmed = compact_text(body);
        return AuthError::Api {
            code: format!("HTTP_{status}"),
            message: if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("{trimmed} ({status})")
            },
        };
    };

    // "WEAK_PASSWORD : Password should be at least 6 characters"
    let (code, detail) = match raw.split_once(" : ") {
        Some((code, detail)) => (code.trim().to_string(), Some(detail.trim().to_string())),
        None => (raw.trim().to_string(), None),
    };
    let message = describe_error_code(&code)
        .map(str::to_string)
        .or(detail)
        .unwrap_or_else(|| format!("{code} ({status})"));
    AuthError::Api { code, message }
}

fn describe_error_code(code: &str) -> Option<&'static str> {
    Some(match code {
        "EMAIL_EXISTS" => "An account with this email already exists",
        "EMAIL_NOT_FOUND" => "No account exists for this email",
        "INVALID_PASSWORD" => "Incorrect password",
        "INVALID_LOGIN_CREDENTIALS" => "Incorrect email or password",
        "INVALID_EMAIL" => "Email address is not valid",
        "MISSING_PASSWORD" => "Password is required",
        "WEAK_PASSWORD" => "Password should be at least 6 characters",
        "USER_DISABLED" => "This account has been disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later",
        "OPERATION_NOT_ALLOWED" => "Email/password sign-in is disabled for this project",
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            "Session expired, sign in again"
        }
        _ => return None,
    })
}
