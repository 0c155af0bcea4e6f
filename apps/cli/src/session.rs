//! Locally cached profile and bearer token of the signed-in user.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredUser {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    /// `password`, `google`, `github`...
    pub auth_provider: Option<String>,
    pub access_token: String,
}

impl StoredUser {
    /// Best human-readable name for the account.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("anonymous")
    }

    /// Copies the profile fields the backend reports onto the cached session.
    pub fn merge_profile(&mut self, profile: &serde_json::Value) {
        let field = |key: &str| profile.get(key).and_then(|v| v.as_str()).map(str::to_string);
        if let Some(id) = field("user_id") {
            self.user_id = Some(id);
        }
        self.username = field("username").or(self.username.take());
        self.display_name = field("display_name").or(self.display_name.take());
        self.email = field("email").or(self.email.take());
        self.avatar = field("avatar_url_or_b64").or(self.avatar.take());
        self.auth_provider = field("auth_provider").or(self.auth_provider.take());
    }
}

/// JSON file holding at most one [`StoredUser`].
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/veritas/session.json`.
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir().context("No configuration directory on this platform")?;
        Ok(Self::new(base.join("veritas").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no session has been saved. A corrupt file is treated as
    /// signed out.
    pub fn load(&self) -> Result<Option<StoredUser>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Reading {}", self.path.display()))
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    pub fn save(&self, user: &StoredUser) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(user)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Holds a bearer token: owner read/write only.
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Writing {}", self.path.display()))?;
        // `mode` only applies on creation.
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Restricting {}", self.path.display()))?;
        file.write_all(body.as_bytes())
            .with_context(|| format!("Writing {}", self.path.display()))
    }

    /// Removes the session. Succeeds when there was none.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Removing {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StoredUser {
        StoredUser {
            user_id: Some("42".into()),
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
            auth_provider: Some("password".into()),
            access_token: "tok".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));

        assert_eq!(file.load().unwrap(), None);
        file.save(&sample()).unwrap();
        assert_eq!(file.load().unwrap(), Some(sample()));

        file.clear().unwrap();
        assert_eq!(file.load().unwrap(), None);
        file.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_session_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        SessionFile::new(&path).save(&sample()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(SessionFile::new(path).load().unwrap(), None);
    }

    #[test]
    fn test_label_prefers_display_name() {
        let mut user = sample();
        assert_eq!(user.label(), "alice");
        user.display_name = Some("Alice L.".into());
        assert_eq!(user.label(), "Alice L.");
        assert_eq!(StoredUser::default().label(), "anonymous");
    }

    #[test]
    fn test_merge_profile_keeps_missing_fields() {
        let mut user = sample();
        user.merge_profile(&json!({
            "user_id": "42",
            "display_name": "Alice",
            "email": null,
        }));
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.access_token, "tok");
    }
}
