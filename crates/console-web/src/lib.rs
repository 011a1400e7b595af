//! # Console Web
//!
//! Authenticated control-plane API for the object-storage web console.
//!
//! This crate provides:
//! - **RPC API**: JSON-RPC 2.0 methods for server info, buckets, objects
//!   and credential management
//! - **Authentication**: HMAC-signed bearer tokens bound to the active
//!   credential pair
//! - **Streaming**: raw upload/download endpoints for object bodies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Browser Console                    │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                    console-web                      │
//! ├─────────────────────────────────────────────────────┤
//! │   POST /rpc   │  PUT /upload  │  GET /download      │
//! ├─────────────────────────────────────────────────────┤
//! │  Token Verifier  │  Method Registry │ Error Mapping │
//! ├─────────────────────────────────────────────────────┤
//! │        Credential Store (watch + JSON file)         │
//! ├─────────────────────────────────────────────────────┤
//! │                   console-core                      │
//! │          (StorageBackend, MemoryBackend)            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod state;

/// Version string reported to the browser UI in every reply
pub const UI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Internal bucket hidden from every listing
pub const RESERVED_BUCKET: &str = "/.console.sys";

pub use config::WebConfig;
pub use error::{ApiError, ApiErrorCode};
pub use server::{run_server, run_server_with_shutdown, serve};
pub use state::AppState;
