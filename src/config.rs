use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";
pub const ENDPOINT_ENV: &str = "RMP_CHAT_ENDPOINT";

const CONFIG_FILE: &str = "config.toml";
const HISTORY_FILE: &str = "chat_messages.json";
const SESSION_FILE: &str = "session.json";
const EXPORT_FILE_NAME: &str = "rmp_chat_history.txt";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat endpoint receiving the conversation as a JSON array
    pub endpoint: String,

    /// Export preferences
    pub export: ExportConfig,

    /// HTTP timeouts
    pub request: RequestConfig,

    /// Speech recognition settings
    pub voice: VoiceConfig,

    /// App home directory, never read from the file itself
    #[serde(skip)]
    pub home: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub connect_timeout_secs: u64,
    /// Longest gap tolerated between two chunks of a streamed reply
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Speech-to-text program and its arguments; `{lang}` is replaced by `language`.
    /// Empty means voice input is unavailable.
    pub command: Vec<String>,
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            export: ExportConfig::default(),
            request: RequestConfig::default(),
            voice: VoiceConfig::default(),
            home: default_home(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            idle_timeout_secs: 60,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            language: "en-US".to_string(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rmp-chat")
}

impl Config {
    /// Load configuration from `<home>/config.toml`, falling back to defaults
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let home = home.unwrap_or_else(default_home);

        fs::create_dir_all(&home)
            .with_context(|| format!("Failed to create {}", home.display()))?;

        let config_path = home.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };

        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint;
            }
        }

        config.home = home;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = self.config_path();
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(config_path)
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.home.join(HISTORY_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.home.join(SESSION_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Where exports land: configured dir, then downloads, then home, then cwd
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .dir
            .clone()
            .or_else(dirs::download_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_dir().join(EXPORT_FILE_NAME)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.request.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.request.idle_timeout_secs.max(1))
    }

    /// Point every derived path at `home`
    pub fn with_home(mut self, home: &Path) -> Self {
        self.home = home.to_path_buf();
        self
    }
}
