//! Persisted sign-in and the per-request viewer context.
//!
//! Signing in writes a small TOML file naming the user; every later command
//! reads it back and builds a fresh [`Viewer`] from the database.

use crate::error::{ChirpError, Result};
use crate::model::{Role, UserId, Viewer};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Contents of the session file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub account: String,
    #[serde(default)]
    pub role: Role,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    /// Write the session file, replacing any previous sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChirpError::path_error("create", parent, e))?;
        }
        let content = toml::to_string(self).map_err(|e| ChirpError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ChirpError::path_error("write", path, e))?;
        info!(user_id = self.user_id, "Signed in");
        Ok(())
    }

    /// Read the current session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ChirpError::path_error("read", path, e))?;
        let session = toml::from_str(&content).map_err(|e| ChirpError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Some(session))
    }

    /// Read the current session or fail with [`ChirpError::NotSignedIn`].
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotSignedIn`] without a session file.
    pub fn require(path: &Path) -> Result<Self> {
        Self::load(path)?.ok_or(ChirpError::NotSignedIn)
    }

    /// Remove the session file. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path).map_err(|e| ChirpError::path_error("remove", path, e))?;
        info!("Signed out");
        Ok(true)
    }
}

impl Viewer {
    /// Build the viewer context for `user_id` from the current follow edges.
    ///
    /// # Errors
    ///
    /// Returns [`ChirpError::NotSignedIn`] if the user no longer exists, or
    /// [`ChirpError::AdminViewer`] for an admin account.
    pub fn load(storage: &Storage, user_id: UserId) -> Result<Self> {
        match storage.get_user(user_id)? {
            None => return Err(ChirpError::NotSignedIn),
            Some(user) if user.role == Role::Admin => return Err(ChirpError::AdminViewer),
            Some(_) => {}
        }
        let following = storage.following_ids(user_id)?;
        debug!(user_id, following = following.len(), "Loaded viewer");
        Ok(Self::new(user_id, following))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewUser;
    use tempfile::TempDir;

    #[test]
    fn test_session_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.toml");

        assert!(Session::load(&path).unwrap().is_none());
        assert!(matches!(Session::require(&path), Err(ChirpError::NotSignedIn)));

        let session = Session {
            user_id: 7,
            account: "alice".to_string(),
            role: Role::User,
            signed_in_at: Utc::now(),
        };
        session.save(&path).unwrap();
        assert_eq!(Session::require(&path).unwrap().user_id, 7);

        assert!(Session::clear(&path).unwrap());
        assert!(!Session::clear(&path).unwrap());
    }

    #[test]
    fn test_corrupt_session_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(&path, "user_id = \"seven\"").unwrap();
        assert!(matches!(
            Session::load(&path),
            Err(ChirpError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_session_without_role_is_user() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            "user_id = 3\naccount = \"bob\"\nsigned_in_at = \"2025-01-01T00:00:00Z\"\n",
        )
        .unwrap();
        assert_eq!(Session::require(&path).unwrap().role, Role::User);
    }

    #[test]
    fn test_viewer_for_admin() {
        let storage = Storage::open_memory().unwrap();
        let root = storage
            .create_user(
                &NewUser {
                    account: "root".to_string(),
                    name: "Root".to_string(),
                    email: "root@example.com".to_string(),
                    password_hash: String::new(),
                    role: Role::Admin,
                },
                Utc::now(),
            )
            .unwrap();
        assert!(matches!(
            Viewer::load(&storage, root.id),
            Err(ChirpError::AdminViewer)
        ));
    }

    #[test]
    fn test_viewer_for_missing_user() {
        let storage = Storage::open_memory().unwrap();
        assert!(matches!(
            Viewer::load(&storage, 1),
            Err(ChirpError::NotSignedIn)
        ));
    }
}
