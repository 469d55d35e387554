//! Per-profile session persistence for the CLI.

use std::path::{Path, PathBuf};

use tally_core::auth::{AuthError, AuthResult, AuthSession, SessionPersistence};

use crate::config_profiles::config_dir;

/// Session stored as JSON at `<config dir>/tally/sessions/<profile>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn for_profile(profile_name: &str) -> Result<Self, String> {
        Ok(Self::at(
            config_dir()?
                .join("sessions")
                .join(format!("{}.json", sanitize_profile_name(profile_name))),
        ))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(path: &Path, error: &std::io::Error) -> AuthError {
    AuthError::SecureStorage(format!("{}: {error}", path.display()))
}

impl SessionPersistence for FileSessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(storage_error(&self.path, &error)),
        }
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| storage_error(parent, &error))?;
        }
        let raw = serde_json::to_string(session)?;
        std::fs::write(&self.path, raw).map_err(|error| storage_error(&self.path, &error))?;
        restrict_permissions(&self.path).map_err(|error| storage_error(&self.path, &error))
    }

    fn clear_session(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_error(&self.path, &error)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Profile names become file names; anything outside `[A-Za-z0-9_-]` is
/// replaced.
pub fn sanitize_profile_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
