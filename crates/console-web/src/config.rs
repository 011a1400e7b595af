//! Web console configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the credential file inside the config directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Default request body limit (5 GB), capped to the address space
pub const DEFAULT_MAX_BODY_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Web console server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the persisted credential pair
    pub config_dir: PathBuf,
    /// Lifetime of issued tokens (seconds)
    pub token_expiry_secs: u64,
    /// Storage quota in bytes (`None` reports the host root disk)
    pub storage_quota: Option<u64>,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Access key to install at startup instead of the persisted one
    pub access_key: Option<String>,
    /// Secret key to install at startup instead of the persisted one
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9001,
            config_dir: PathBuf::from(".console"),
            token_expiry_secs: 10 * 60 * 60, // 10 hours
            storage_quota: None,
            max_body_size: usize::try_from(DEFAULT_MAX_BODY_SIZE).unwrap_or(usize::MAX),
            cors_enabled: true,
            access_key: None,
            secret_key: None,
        }
    }
}

impl WebConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Location of the credential file
    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }
}
