use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use uuid::Uuid;

/// Who is signed in, as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user: String,
    pub session_id: Uuid,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedIn(Identity),
    SignedOut,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            SessionState::SignedOut => None,
        }
    }
}

/// External identity/session collaborator deciding which view renders
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> SessionState;

    /// End the current session
    fn sign_out(&self) -> Result<()>;
}

/// Session kept in `<home>/session.json`, written by `rmp-chat login`
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    path: PathBuf,
}

impl FileSessionProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn sign_in(&self, user: &str) -> Result<Identity> {
        let user = user.trim();
        anyhow::ensure!(!user.is_empty(), "User name cannot be empty");

        let identity = Identity {
            user: user.to_string(),
            session_id: Uuid::new_v4(),
            signed_in_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create session directory")?;
        }
        let content = serde_json::to_string_pretty(&identity)
            .context("Failed to serialize session")?;
        fs::write(&self.path, content)
            .context("Failed to write session file")?;

        tracing::info!(user = %identity.user, session = %identity.session_id, "Signed in");
        Ok(identity)
    }
}

impl SessionProvider for FileSessionProvider {
    fn current(&self) -> SessionState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return SessionState::SignedOut,
            Err(e) => {
                tracing::warn!("Failed to read session file: {}", e);
                return SessionState::SignedOut;
            }
        };

        match serde_json::from_str::<Identity>(&content) {
            Ok(identity) if !identity.user.trim().is_empty() => SessionState::SignedIn(identity),
            Ok(_) => SessionState::SignedOut,
            Err(e) => {
                tracing::warn!("Ignoring malformed session file: {}", e);
                SessionState::SignedOut
            }
        }
    }

    fn sign_out(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Signed out");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dir: &tempfile::TempDir) -> FileSessionProvider {
        FileSessionProvider::new(dir.path().join("session.json"))
    }

    #[test]
    fn test_signed_out_without_session_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(provider(&dir).current(), SessionState::SignedOut);
    }

    #[test]
    fn test_sign_in_then_out() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = provider(&dir);

        let identity = sessions.sign_in("  jordan ").unwrap();
        assert_eq!(identity.user, "jordan");
        assert_eq!(sessions.current(), SessionState::SignedIn(identity.clone()));
        assert_eq!(sessions.current().identity(), Some(&identity));

        sessions.sign_out().unwrap();
        assert_eq!(sessions.current(), SessionState::SignedOut);
        sessions.sign_out().unwrap();
    }

    #[test]
    fn test_empty_user_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(provider(&dir).sign_in("   ").is_err());
    }

    #[test]
    fn test_malformed_session_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("session.json"), "nope").unwrap();
        assert_eq!(provider(&dir).current(), SessionState::SignedOut);
    }
}
