//! Application context: the explicitly constructed set of collaborators
//! every front end shares.

use std::path::Path;

use crate::auth::{AuthClient, AuthSession, SessionPersistence};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::remote::FirestoreClient;
use crate::store::LocalDatabase;
use crate::sync::{Connectivity, ConnectivityFlag, SyncCoordinator};

/// Coordinator type used by [`TallyContext`].
pub type Coordinator = SyncCoordinator<LocalDatabase, FirestoreClient, ConnectivityFlag>;

pub struct TallyContext<S: SessionPersistence> {
    config: ClientConfig,
    store: LocalDatabase,
    remote: FirestoreClient,
    connectivity: ConnectivityFlag,
    auth: AuthClient<S>,
}

impl<S: SessionPersistence> TallyContext<S> {
    /// Open the local database at `db_path` and build the network clients.
    pub async fn open(
        config: ClientConfig,
        db_path: impl AsRef<Path>,
        sessions: S,
    ) -> Result<Self> {
        let store = LocalDatabase::open(db_path).await?;
        Self::with_store(config, store, sessions)
    }

    pub async fn in_memory(config: ClientConfig, sessions: S) -> Result<Self> {
        let store = LocalDatabase::open_in_memory().await?;
        Self::with_store(config, store, sessions)
    }

    fn with_store(config: ClientConfig, store: LocalDatabase, sessions: S) -> Result<Self> {
        Ok(Self {
            remote: FirestoreClient::new(&config)?,
            auth: AuthClient::new(&config, sessions)?,
            connectivity: ConnectivityFlag::default(),
            store,
            config,
        })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn store(&self) -> &LocalDatabase {
        &self.store
    }

    pub const fn auth(&self) -> &AuthClient<S> {
        &self.auth
    }

    pub const fn connectivity(&self) -> &ConnectivityFlag {
        &self.connectivity
    }

    /// Coordinator acting with `session`'s credentials.
    pub fn coordinator(&self, session: &AuthSession) -> Coordinator {
        SyncCoordinator::new(
            self.store.clone(),
            self.remote.clone().with_id_token(session.id_token.clone()),
            self.connectivity.clone(),
            self.config.request_timeout,
        )
    }

    /// Restore the persisted session and build a coordinator for it.
    ///
    /// Offline the stored session is used as-is; only its user id matters
    /// until the next remote call.
    pub async fn signed_in(&self) -> Result<(AuthSession, Coordinator)> {
        let session = if self.connectivity.is_online() {
            self.auth.restore_session().await?
        } else {
            self.auth.current_session()?
        };
        let session = session.ok_or(Error::NotSignedIn)?;
        let coordinator = self.coordinator(&session);
        Ok((session, coordinator))
    }
}
