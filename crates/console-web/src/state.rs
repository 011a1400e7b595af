//! Application state

use crate::config::WebConfig;
use crate::credentials::{Credential, CredentialStore, JsonFilePersistence};
use crate::handlers::WebApi;
use console_core::{MemoryBackend, StorageBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Console configuration
    pub config: WebConfig,
    /// Object storage
    pub backend: Arc<dyn StorageBackend>,
    /// Active credential pair
    pub credentials: Arc<CredentialStore>,
    /// RPC method set
    pub web: WebApi,
}

impl AppState {
    /// Create the state from configuration: in-memory storage and the
    /// credential file under `config_dir`
    pub async fn new(config: WebConfig) -> anyhow::Result<Self> {
        let backend: Arc<dyn StorageBackend> = match config.storage_quota {
            Some(quota) => {
                info!(quota, "Using in-memory storage with quota");
                Arc::new(MemoryBackend::with_quota(quota))
            }
            None => Arc::new(MemoryBackend::new()),
        };
        warn!("Storage is in-memory, objects do not survive a restart");

        let bootstrap = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => Some(Credential::new(access, secret)),
            (None, None) => None,
            _ => anyhow::bail!("access key and secret key must be configured together"),
        };

        let persistence = Arc::new(JsonFilePersistence::new(config.credentials_path()));
        let credentials = Arc::new(CredentialStore::open(persistence, bootstrap).await?);
        info!(path = %config.credentials_path().display(), "Credentials loaded");

        Ok(Self::from_parts(config, backend, credentials))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: WebConfig,
        backend: Arc<dyn StorageBackend>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let web = WebApi::new(
            Arc::clone(&backend),
            Arc::clone(&credentials),
            config.token_expiry_secs,
        );
        Self {
            config,
            backend,
            credentials,
            web,
        }
    }
}
