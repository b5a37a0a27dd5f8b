mod fim;
mod keystore;
mod ollama;

pub use fim::FimTemplate;
pub use keystore::{
    prompt_password, CredentialKey, KeyStore, KeyStoreBackend, MemorySecretStore, SecretStore,
    SecretString,
};
pub use ollama::{MemorySettings, OllamaSettings, PersistentSettings, SettingsFile, DEFAULT_HOST};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use directories::BaseDirs;

use crate::error::{Result, SettingsError};

const CONFIG_DIR: &str = "ollama-panel";
const MAIN_CONFIG_FILE: &str = "config.toml";
const OLLAMA_CONFIG_FILE: &str = "ollama.toml";
const KEYS_DIR: &str = "keys";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub keystore: KeyStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Model list request timeout; unset waits for the server indefinitely
    pub request_timeout_secs: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_file: None,
            request_timeout_secs: None,
        }
    }
}

impl GeneralConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    /// Forced backend; unset picks the keyring when it is reachable
    pub backend: Option<KeyStoreBackend>,
}

pub struct ConfigManager {
    config_dir: PathBuf,
    app_config: AppConfig,
}

impl ConfigManager {
    /// Open the platform config directory
    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(Self::default_config_dir()?))
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let app_config = Self::load_app_config(&config_dir);
        Self {
            config_dir,
            app_config,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn app_config_mut(&mut self) -> &mut AppConfig {
        &mut self.app_config
    }

    pub fn ollama_settings_path(&self) -> PathBuf {
        self.config_dir.join(OLLAMA_CONFIG_FILE)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.config_dir.join(KEYS_DIR)
    }

    /// Persisted settings store for `ollama.toml`
    pub fn settings_file(&self) -> SettingsFile {
        SettingsFile::new(self.ollama_settings_path())
    }

    /// Credential store honoring the configured backend
    pub fn keystore(&self) -> KeyStore {
        match self.app_config.keystore.backend {
            Some(backend) => KeyStore::with_backend(backend, self.keys_dir()),
            None => KeyStore::new(self.keys_dir()),
        }
    }

    pub fn reload(&mut self) {
        self.app_config = Self::load_app_config(&self.config_dir);
    }

    fn default_config_dir() -> Result<PathBuf> {
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join(CONFIG_DIR))
            .ok_or_else(|| SettingsError::Config("Could not determine config directory".to_string()))
    }

    fn load_app_config(config_dir: &Path) -> AppConfig {
        let path = config_dir.join(MAIN_CONFIG_FILE);
        Self::load_toml_file(&path).unwrap_or_default()
    }

    fn load_toml_file<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> Option<T> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)
                .map_err(|e| SettingsError::Config(format!("Failed to create config dir: {}", e)))?;
        }
        Ok(())
    }

    /// Write default `config.toml` and `ollama.toml` where missing
    pub fn write_default_configs(&self) -> Result<()> {
        self.ensure_config_dir()?;

        let main_path = self.config_dir.join(MAIN_CONFIG_FILE);
        if !main_path.exists() {
            let content = toml::to_string_pretty(&AppConfig::default())
                .map_err(|e| SettingsError::Config(format!("Failed to serialize config: {}", e)))?;
            std::fs::write(&main_path, content)
                .map_err(|e| SettingsError::Config(format!("Failed to write config: {}", e)))?;
        }

        let ollama_path = self.ollama_settings_path();
        if !ollama_path.exists() {
            OllamaSettings::default().save(&ollama_path)?;
        }

        Ok(())
    }
}
