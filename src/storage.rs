use crate::events::Message;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The single persisted slot holding the JSON-serialized conversation
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored messages, or `None` when the slot is absent, malformed or empty.
    /// Failures are logged and never surfaced.
    pub fn load(&self) -> Option<Vec<Message>> {
        match self.try_load() {
            Ok(Some(messages)) if !messages.is_empty() => {
                tracing::debug!(count = messages.len(), "Restored chat history");
                Some(messages)
            }
            Ok(Some(_)) => {
                tracing::info!("No valid messages found in {}", self.path.display());
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Error reading chat history: {:#}", e);
                None
            }
        }
    }

    pub fn try_load(&self) -> Result<Option<Vec<Message>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read chat history"),
        };

        let messages: Vec<Message> = serde_json::from_str(&content)
            .context("Failed to parse chat history")?;
        Ok(Some(messages))
    }

    /// Best-effort write; errors are logged
    pub fn save(&self, messages: &[Message]) {
        if let Err(e) = self.try_save(messages) {
            tracing::error!("Error saving chat history: {:#}", e);
        }
    }

    pub fn try_save(&self, messages: &[Message]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create history directory")?;
        }

        let content = serde_json::to_string(messages)
            .context("Failed to serialize chat history")?;
        fs::write(&self.path, content)
            .context("Failed to write chat history")?;

        tracing::trace!(count = messages.len(), "Saved chat history");
        Ok(())
    }

    /// Erase the slot; a missing file is not an error
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Error removing chat history: {}", e),
        }
    }
}

/// Write an exported transcript, replacing any previous export at `path`
pub fn write_export(path: &Path, text: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context("Failed to create export directory")?;
    }

    fs::write(path, text)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Exported chat to {}", path.display());
    Ok(path.to_path_buf())
}
