//! Credential store: provider API keys keyed by provider username.
//!
//! The production store is a JSON file in the platform config directory
//! (`~/.config/rehearsal/credentials.json`), written with 0600 permissions on unix.
//! Secrets are never logged: `Credential`'s Debug output is redacted.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

use crate::providers::Provider;

pub mod handlers;

const APP_DIR: &str = "rehearsal";
const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("API key not found for {0}. Store a key for this provider first.")]
    Missing(Provider),

    #[error("API key cannot be empty")]
    Empty,

    #[error("Could not determine the user config directory")]
    NoConfigDir,

    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// An opaque provider secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Result<Self, CredentialError> {
        let secret = secret.into().trim().to_string();
        if secret.is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self(secret))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The provider identity and credential a session is bound to for its lifetime.
#[derive(Debug, Clone)]
pub struct ProviderKey {
    pub provider: Provider,
    pub credential: Credential,
}

impl ProviderKey {
    pub fn new(provider: Provider, credential: Credential) -> Self {
        Self {
            provider,
            credential,
        }
    }
}

/// Synchronous get/set access to stored provider secrets.
pub trait CredentialStore: Send + Sync {
    fn get(&self, provider: Provider) -> Result<Option<Credential>, CredentialError>;
    fn set(&self, provider: Provider, credential: &Credential) -> Result<(), CredentialError>;
}

/// Looks up the stored key for `provider`, failing with `Missing` when absent.
pub fn require(
    store: &dyn CredentialStore,
    provider: Provider,
) -> Result<Credential, CredentialError> {
    store.get(provider)?.ok_or(CredentialError::Missing(provider))
}

// ────────────────────────────────────────────────────────────────────────────
// File-backed store
// ────────────────────────────────────────────────────────────────────────────

pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store at `~/.config/rehearsal/credentials.json` (platform equivalent).
    pub fn at_default_location() -> Result<Self, CredentialError> {
        let base = dirs::config_dir().ok_or(CredentialError::NoConfigDir)?;
        Ok(Self::new(base.join(APP_DIR).join(CREDENTIALS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let mut file = open_private(&self.path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, provider: Provider) -> Result<Option<Credential>, CredentialError> {
        let _guard = self.lock.lock().map_err(|_| CredentialError::Poisoned)?;
        let entries = self.load()?;
        let found = entries
            .get(provider.credential_username())
            .and_then(|secret| Credential::new(secret.as_str()).ok());
        debug!("Credential lookup for {provider}: found={}", found.is_some());
        Ok(found)
    }

    fn set(&self, provider: Provider, credential: &Credential) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().map_err(|_| CredentialError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(
            provider.credential_username().to_string(),
            credential.expose().to_string(),
        );
        self.save(&entries)?;
        info!("Stored API key for {provider} in {}", self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> Result<fs::File, CredentialError> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    // `mode` only applies on creation; an older file is tightened before any
    // secret is written into it.
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<fs::File, CredentialError> {
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<std::collections::HashMap<Provider, Credential>>,
}

#[cfg(test)]
impl MemoryCredentialStore {
    pub fn with(provider: Provider, credential: Credential) -> Self {
        let store = Self::default();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(provider, credential);
        }
        store
    }
}

#[cfg(test)]
impl CredentialStore for MemoryCredentialStore {
    fn get(&self, provider: Provider) -> Result<Option<Credential>, CredentialError> {
        let entries = self.entries.lock().map_err(|_| CredentialError::Poisoned)?;
        Ok(entries.get(&provider).cloned())
    }

    fn set(&self, provider: Provider, credential: &Credential) -> Result<(), CredentialError> {
        let mut entries = self.entries.lock().map_err(|_| CredentialError::Poisoned)?;
        entries.insert(provider, credential.clone());
        Ok(())
    }
}
