//! Credential storage for the Ollama API key
//!
//! Two backends: the system keyring, or an encrypted file under the config
//! directory for machines without a Secret Service.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SettingsError};

const SERVICE_NAME: &str = "ollama-panel";
const KEYSTORE_FILE: &str = "keystore.enc";
const SALT_FILE: &str = "keystore.salt";
const KEYSTORE_VERSION: u32 = 1;

/// A secret value that is zeroed on drop
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Key under which a credential is stored
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum CredentialKey {
    OllamaApiKey,
    Custom(String),
}

impl CredentialKey {
    pub fn as_str(&self) -> &str {
        match self {
            CredentialKey::OllamaApiKey => "ollama-api-key",
            CredentialKey::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Get/set access to stored credentials
///
/// `set` with `None` removes the credential; an absent credential reads back
/// as `None`.
pub trait SecretStore: Send {
    fn get(&self, key: &CredentialKey) -> Result<Option<String>>;

    fn set(&mut self, key: &CredentialKey, value: Option<&str>) -> Result<()>;
}

/// Backend storage strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStoreBackend {
    /// Use system keyring (Secret Service on Linux)
    #[value(name = "keyring")]
    SystemKeyring,
    /// Use encrypted file storage
    #[value(name = "file")]
    EncryptedFile,
}

/// Encrypted keystore file format
#[derive(Serialize, Deserialize)]
struct EncryptedPayload {
    version: u32,
    nonce: [u8; 12],
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize, Default)]
struct Credentials {
    keys: HashMap<String, String>,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct MasterKey([u8; 32]);

/// Credential storage backed by the system keyring or an encrypted file
pub struct KeyStore {
    backend: KeyStoreBackend,
    keys_dir: PathBuf,
    master_key: Option<MasterKey>,
}

impl KeyStore {
    /// Create a KeyStore, preferring the system keyring when it responds
    pub fn new(keys_dir: impl Into<PathBuf>) -> Self {
        let backend = if Self::is_keyring_available() {
            tracing::info!("Using system keyring for credential storage");
            KeyStoreBackend::SystemKeyring
        } else {
            tracing::info!("System keyring unavailable, using encrypted file storage");
            KeyStoreBackend::EncryptedFile
        };
        Self::with_backend(backend, keys_dir)
    }

    pub fn with_backend(backend: KeyStoreBackend, keys_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            keys_dir: keys_dir.into(),
            master_key: None,
        }
    }

    fn is_keyring_available() -> bool {
        match keyring::Entry::new(SERVICE_NAME, "__availability__") {
            Ok(entry) => !matches!(
                entry.get_password(),
                Err(keyring::Error::NoStorageAccess(_)) | Err(keyring::Error::PlatformFailure(_))
            ),
            Err(_) => false,
        }
    }

    pub fn backend(&self) -> KeyStoreBackend {
        self.backend
    }

    /// Whether the encrypted backend has been set up with a master password
    pub fn is_initialized(&self) -> bool {
        match self.backend {
            KeyStoreBackend::SystemKeyring => true,
            KeyStoreBackend::EncryptedFile => self.salt_file().exists(),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        match self.backend {
            KeyStoreBackend::SystemKeyring => true,
            KeyStoreBackend::EncryptedFile => self.master_key.is_some(),
        }
    }

    /// Unlock the encrypted file with the master password
    pub fn unlock(&mut self, master_password: &str) -> Result<()> {
        if self.backend != KeyStoreBackend::EncryptedFile {
            return Ok(());
        }

        let salt = self.read_salt()?;
        self.master_key = Some(derive_key(master_password, &salt)?);

        // A wrong password fails here rather than on the first read
        if let Err(e) = self.read_credentials() {
            self.master_key = None;
            return Err(e);
        }
        Ok(())
    }

    /// Set up encrypted storage with a new master password
    pub fn init_encrypted(&mut self, master_password: &str) -> Result<()> {
        self.ensure_keys_dir()?;

        let salt = SaltString::generate(&mut OsRng);
        let salt_path = self.salt_file();
        fs::write(&salt_path, salt.as_str())
            .map_err(|e| SettingsError::KeyStore(format!("Failed to write salt: {}", e)))?;
        restrict_permissions(&salt_path, 0o600)?;

        self.master_key = Some(derive_key(master_password, &salt)?);
        self.write_credentials(&Credentials::default())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // System Keyring Backend
    // ─────────────────────────────────────────────────────────────────────────

    fn keyring_entry(key: &CredentialKey) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE_NAME, key.as_str())
            .map_err(|e| SettingsError::KeyStore(format!("Failed to open keyring entry: {}", e)))
    }

    fn get_keyring(&self, key: &CredentialKey) -> Result<Option<String>> {
        match Self::keyring_entry(key)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SettingsError::KeyStore(format!(
                "Failed to read {} from keyring: {}",
                key, e
            ))),
        }
    }

    fn set_keyring(&self, key: &CredentialKey, value: Option<&str>) -> Result<()> {
        let entry = Self::keyring_entry(key)?;
        match value {
            Some(secret) => entry.set_password(secret).map_err(|e| {
                SettingsError::KeyStore(format!("Failed to store {} in keyring: {}", key, e))
            }),
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(SettingsError::KeyStore(format!(
                    "Failed to delete {} from keyring: {}",
                    key, e
                ))),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encrypted File Backend
    // ─────────────────────────────────────────────────────────────────────────

    fn keystore_file(&self) -> PathBuf {
        self.keys_dir.join(KEYSTORE_FILE)
    }

    fn salt_file(&self) -> PathBuf {
        self.keys_dir.join(SALT_FILE)
    }

    fn ensure_keys_dir(&self) -> Result<()> {
        if !self.keys_dir.exists() {
            fs::create_dir_all(&self.keys_dir)
                .map_err(|e| SettingsError::KeyStore(format!("Failed to create keys dir: {}", e)))?;
            restrict_permissions(&self.keys_dir, 0o700)?;
        }
        Ok(())
    }

    fn read_salt(&self) -> Result<SaltString> {
        let salt_path = self.salt_file();
        if !salt_path.exists() {
            return Err(SettingsError::KeyStore(
                "Keystore not initialized. Call init_encrypted() first.".to_string(),
            ));
        }

        let salt = fs::read_to_string(&salt_path)
            .map_err(|e| SettingsError::KeyStore(format!("Failed to read salt: {}", e)))?;
        SaltString::from_b64(salt.trim())
            .map_err(|e| SettingsError::KeyStore(format!("Invalid salt: {}", e)))
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        let key = self.master_key.as_ref().ok_or_else(|| {
            SettingsError::KeyStore("Keystore is locked. Call unlock() first.".to_string())
        })?;
        ChaCha20Poly1305::new_from_slice(&key.0)
            .map_err(|e| SettingsError::KeyStore(format!("Failed to create cipher: {}", e)))
    }

    fn read_credentials(&self) -> Result<Credentials> {
        let path = self.keystore_file();
        if !path.exists() {
            return Ok(Credentials::default());
        }

        let cipher = self.cipher()?;
        let raw = fs::read_to_string(&path)
            .map_err(|e| SettingsError::KeyStore(format!("Failed to read keystore: {}", e)))?;
        let payload: EncryptedPayload = serde_json::from_str(&raw)
            .map_err(|e| SettingsError::KeyStore(format!("Invalid keystore format: {}", e)))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&payload.nonce), payload.ciphertext.as_ref())
            .map_err(|_| {
                SettingsError::KeyStore("Failed to decrypt keystore (wrong password?)".to_string())
            })?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| SettingsError::KeyStore(format!("Invalid keystore data: {}", e)))
    }

    fn write_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.ensure_keys_dir()?;
        let cipher = self.cipher()?;

        let plaintext = serde_json::to_vec(credentials)
            .map_err(|e| SettingsError::KeyStore(format!("Failed to serialize keystore: {}", e)))?;

        let mut nonce = [0u8; 12];
        rand::rng().fill(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|e| SettingsError::KeyStore(format!("Failed to encrypt keystore: {}", e)))?;

        let payload = EncryptedPayload {
            version: KEYSTORE_VERSION,
            nonce,
            ciphertext,
        };
        let json = serde_json::to_string_pretty(&payload)
            .map_err(|e| SettingsError::KeyStore(format!("Failed to serialize keystore: {}", e)))?;

        let path = self.keystore_file();
        fs::write(&path, json)
            .map_err(|e| SettingsError::KeyStore(format!("Failed to write keystore: {}", e)))?;
        restrict_permissions(&path, 0o600)
    }

    fn get_encrypted(&self, key: &CredentialKey) -> Result<Option<String>> {
        Ok(self.read_credentials()?.keys.get(key.as_str()).cloned())
    }

    fn set_encrypted(&mut self, key: &CredentialKey, value: Option<&str>) -> Result<()> {
        let mut credentials = self.read_credentials()?;
        match value {
            Some(secret) => {
                credentials
                    .keys
                    .insert(key.as_str().to_string(), secret.to_string());
            }
            None => {
                credentials.keys.remove(key.as_str());
            }
        }
        self.write_credentials(&credentials)
    }
}

impl SecretStore for KeyStore {
    fn get(&self, key: &CredentialKey) -> Result<Option<String>> {
        match self.backend {
            KeyStoreBackend::SystemKeyring => self.get_keyring(key),
            KeyStoreBackend::EncryptedFile => self.get_encrypted(key),
        }
    }

    fn set(&mut self, key: &CredentialKey, value: Option<&str>) -> Result<()> {
        match self.backend {
            KeyStoreBackend::SystemKeyring => self.set_keyring(key, value),
            KeyStoreBackend::EncryptedFile => self.set_encrypted(key, value),
        }
    }
}

fn derive_key(password: &str, salt: &SaltString) -> Result<MasterKey> {
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), salt)
        .map_err(|e| SettingsError::KeyStore(format!("Failed to derive key: {}", e)))?;

    let output = hash
        .hash
        .ok_or_else(|| SettingsError::KeyStore("No hash output".to_string()))?;
    let bytes = output.as_bytes();
    if bytes.len() < 32 {
        return Err(SettingsError::KeyStore("Hash too short".to_string()));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[..32]);
    Ok(MasterKey(key))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        SettingsError::KeyStore(format!(
            "Failed to set permissions on {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Process-local credential store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    keys: Arc<Mutex<HashMap<String, SecretString>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SecretString>>> {
        self.keys
            .lock()
            .map_err(|_| SettingsError::KeyStore("Credential lock poisoned".to_string()))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &CredentialKey) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .get(key.as_str())
            .map(|s| s.expose().to_string()))
    }

    fn set(&mut self, key: &CredentialKey, value: Option<&str>) -> Result<()> {
        let mut keys = self.lock()?;
        match value {
            Some(secret) => {
                keys.insert(key.as_str().to_string(), SecretString::new(secret));
            }
            None => {
                keys.remove(key.as_str());
            }
        }
        Ok(())
    }
}

/// Prompt for a password from the terminal
pub fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt)
        .map_err(|e| SettingsError::KeyStore(format!("Failed to read password: {}", e)))
}
