//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Directory under the platform config dir holding `config.toml`.
const CONFIG_DIR: &str = "flashcard-sync";
const CONFIG_FILE: &str = "config.toml";

/// Runtime configuration, read from TOML. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store endpoint.
    pub anki_url: String,
    /// Key sent with every request when the store requires one.
    pub api_key: Option<String>,
    /// Root of the markdown vault.
    pub vault: PathBuf,
    /// Front-matter key naming a document's group.
    pub deck_key: String,
    /// Group for documents without the front-matter key.
    /// When unset such documents are not synced.
    pub default_deck: Option<String>,
    /// Tag marking records owned by this tool.
    pub managed_tag: String,
    /// Note type records are created with.
    pub model_name: String,
    pub max_actions_per_request: usize,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anki_url: "http://127.0.0.1:8765".to_string(),
            api_key: None,
            vault: PathBuf::from("."),
            deck_key: "anki-deck".to_string(),
            default_deck: None,
            managed_tag: "md-flashcard".to_string(),
            model_name: "Markdown Flashcard".to_string(),
            max_actions_per_request: 100,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| SyncError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the file in the platform
    /// config directory is used if present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_path().filter(|p| p.is_file()) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_actions_per_request == 0 {
            return Err(SyncError::Config(
                "max_actions_per_request must be at least 1".to_string(),
            ));
        }
        if self.managed_tag.is_empty() || self.managed_tag.contains(char::is_whitespace) {
            return Err(SyncError::Config(format!(
                "managed_tag {:?} must be a single non-empty word",
                self.managed_tag
            )));
        }
        if self.model_name.trim().is_empty() {
            return Err(SyncError::Config("model_name must not be empty".to_string()));
        }
        if self.deck_key.trim().is_empty() {
            return Err(SyncError::Config("deck_key must not be empty".to_string()));
        }
        Ok(())
    }

    /// The group a document syncs into, given its front-matter value.
    pub fn resolve_group(&self, metadata: Option<String>) -> Option<String> {
        metadata.or_else(|| {
            self.default_deck
                .as_deref()
                .map(str::trim)
                .filter(|deck| !deck.is_empty())
                .map(str::to_string)
        })
    }
}

/// `<config dir>/flashcard-sync/config.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
