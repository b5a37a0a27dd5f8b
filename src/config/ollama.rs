//! Persisted Ollama settings
//!
//! Stored in `~/.config/ollama-panel/ollama.toml`

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::fim::FimTemplate;
use crate::error::{Result, SettingsError};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// The persisted settings record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    /// Base URL of the Ollama server
    pub host: String,
    /// Selected model name, empty when none was chosen
    pub model: String,
    pub code_completions_enabled: bool,
    pub fim_template: FimTemplate,
    /// Last list of models reported by the server
    pub available_models: Vec<String>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: String::new(),
            code_completions_enabled: false,
            fim_template: FimTemplate::default(),
            available_models: Vec::new(),
        }
    }
}

impl OllamaSettings {
    /// Load settings from a file path, defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| SettingsError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save settings to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SettingsError::Config(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SettingsError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SettingsError::Config(format!("Failed to write {}: {}", path.display(), e)))?;

        Ok(())
    }
}

/// Read/write access to the persisted settings record
pub trait PersistentSettings: Send {
    fn get(&self) -> Result<OllamaSettings>;

    fn set(&mut self, settings: OllamaSettings) -> Result<()>;
}

/// `ollama.toml` backed settings; every read goes to the file
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PersistentSettings for SettingsFile {
    fn get(&self) -> Result<OllamaSettings> {
        OllamaSettings::load(&self.path)
    }

    fn set(&mut self, settings: OllamaSettings) -> Result<()> {
        settings.save(&self.path)?;
        tracing::debug!("Saved Ollama settings to {}", self.path.display());
        Ok(())
    }
}

/// In-memory settings; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    inner: Arc<Mutex<OllamaSettings>>,
}

impl MemorySettings {
    pub fn new(settings: OllamaSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, OllamaSettings>> {
        self.inner
            .lock()
            .map_err(|_| SettingsError::Config("Settings lock poisoned".to_string()))
    }
}

impl PersistentSettings for MemorySettings {
    fn get(&self) -> Result<OllamaSettings> {
        Ok(self.lock()?.clone())
    }

    fn set(&mut self, settings: OllamaSettings) -> Result<()> {
        *self.lock()? = settings;
        Ok(())
    }
}
