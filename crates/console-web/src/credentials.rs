//! Active credential pair: ownership, persistence and rotation

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Length of generated access keys
pub const ACCESS_KEY_LEN: usize = 20;

/// Length of generated secret keys
pub const SECRET_KEY_LEN: usize = 40;

const ACCESS_KEY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// An access key / secret key pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_key: String,
    pub secret_key: String,
}

impl Credential {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Generate a fresh random pair
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let access_key: String = (0..ACCESS_KEY_LEN)
            .map(|_| ACCESS_KEY_ALPHABET[rng.gen_range(0..ACCESS_KEY_ALPHABET.len())] as char)
            .collect();

        // 30 random bytes encode to exactly 40 base64 characters
        let mut raw = [0u8; SECRET_KEY_LEN / 4 * 3];
        rng.fill_bytes(&mut raw);
        let secret_key = general_purpose::STANDARD.encode(raw).replace('/', "+");

        Self {
            access_key,
            secret_key,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Credential persistence errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("unable to read credentials from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to write credentials to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed credential file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Stable storage for the credential pair
#[async_trait]
pub trait CredentialPersistence: Send + Sync {
    /// Load the persisted pair, `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<Credential>, CredentialError>;

    /// Persist a pair
    async fn save(&self, credential: &Credential) -> Result<(), CredentialError>;
}

/// Credential pair stored as JSON on disk
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CredentialPersistence for JsonFilePersistence {
    async fn load(&self) -> Result<Option<Credential>, CredentialError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CredentialError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        let write_err = |source: std::io::Error| CredentialError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Write aside and rename so a crash never leaves a torn file
        let staging = self.path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(credential)?;
        tokio::fs::write(&staging, raw).await.map_err(write_err)?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

/// Credential pair kept in memory only
#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<Credential>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last pair saved
    pub fn saved(&self) -> Option<Credential> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl CredentialPersistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<Credential>, CredentialError> {
        Ok(self.saved())
    }

    async fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        *self.saved.lock() = Some(credential.clone());
        Ok(())
    }
}

/// Single owner of the active credential pair.
///
/// Readers take a snapshot per request. Rotation persists first and then
/// swaps the pair in one step, so a verification sees either the old
/// secret or the new one, never a mix.
pub struct CredentialStore {
    active: watch::Sender<Credential>,
    persistence: Arc<dyn CredentialPersistence>,
    writer: tokio::sync::Mutex<()>,
}

impl CredentialStore {
    /// Wrap an already-known pair without touching persistence
    pub fn new(credential: Credential, persistence: Arc<dyn CredentialPersistence>) -> Self {
        let (active, _) = watch::channel(credential);
        Self {
            active,
            persistence,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the store from persistence.
    ///
    /// A `bootstrap` pair wins over whatever was saved and is persisted. With
    /// neither, a fresh pair is generated and persisted.
    pub async fn open(
        persistence: Arc<dyn CredentialPersistence>,
        bootstrap: Option<Credential>,
    ) -> Result<Self, CredentialError> {
        let credential = match bootstrap {
            Some(credential) => {
                persistence.save(&credential).await?;
                info!(access_key = %credential.access_key, "Installed credentials from configuration");
                credential
            }
            None => match persistence.load().await? {
                Some(credential) => credential,
                None => {
                    let credential = Credential::generate();
                    persistence.save(&credential).await?;
                    info!(access_key = %credential.access_key, "Generated new credentials");
                    credential
                }
            },
        };

        Ok(Self::new(credential, persistence))
    }

    /// Snapshot of the active pair
    pub fn current(&self) -> Credential {
        self.active.borrow().clone()
    }

    /// Secret key currently used to sign and verify tokens
    pub fn secret_key(&self) -> String {
        self.active.borrow().secret_key.clone()
    }

    /// Replace the active pair.
    ///
    /// On a persistence failure the previous pair stays active.
    pub async fn rotate(&self, credential: Credential) -> Result<(), CredentialError> {
        let _writer = self.writer.lock().await;
        self.persistence.save(&credential).await?;
        let access_key = credential.access_key.clone();
        self.active.send_replace(credential);
        info!(access_key = %access_key, "Credentials rotated");
        Ok(())
    }

    /// Observe rotations
    pub fn subscribe(&self) -> watch::Receiver<Credential> {
        self.active.subscribe()
    }
}
