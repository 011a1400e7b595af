//! Request handlers: the RPC method set and the raw streaming endpoints

pub mod stream;
pub mod web;

pub use stream::{download, upload, DownloadParams};
pub use web::WebApi;

/// GET /healthz
pub async fn health_check() -> &'static str {
    "OK"
}
