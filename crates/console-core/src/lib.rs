//! # Console Core
//!
//! Storage contract behind the console web API.
//!
//! This crate provides:
//! - **Backend trait**: the bucket/object operations the web layer consumes
//! - **Closed error set**: every backend failure is one [`StorageError`] variant
//! - **Metadata types**: buckets, objects, listing pages, capacity
//! - **Memory backend**: a quota-aware in-memory implementation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Web API (RPC + streaming)        │
//! ├─────────────────────────────────────────┤
//! │          StorageBackend Trait           │
//! ├─────────────────────────────────────────┤
//! │             MemoryBackend               │
//! └─────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod metadata;

pub use backend::{ByteStream, ObjectUpload, StorageBackend};
pub use error::{Result, StorageError};
pub use memory::{validate_bucket_name, validate_object_name, MemoryBackend, DEFAULT_MAX_KEYS};
pub use metadata::{BucketInfo, ListEntry, ListObjectsPage, ObjectInfo, StorageInfo};
