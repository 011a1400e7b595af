//! Error types for the console-core crate

use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failures reported by a storage backend.
///
/// The set is closed: the web layer matches it exhaustively when choosing a
/// client-facing status, so a new variant is a compile error there until it
/// has been given a mapping.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage root has no room left for the write
    #[error("storage root is full")]
    RootPathFull,

    /// Bucket not found
    #[error("bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    /// Invalid bucket name
    #[error("bucket name invalid: {bucket}")]
    BucketNameInvalid { bucket: String },

    /// Bucket already exists
    #[error("bucket exists: {bucket}")]
    BucketExists { bucket: String },

    /// Bucket still holds objects
    #[error("bucket not empty: {bucket}")]
    BucketNotEmpty { bucket: String },

    /// Content-MD5 did not match the received bytes
    #[error("bad digest, expected {expected} is not valid with what we calculated {calculated}")]
    BadDigest { expected: String, calculated: String },

    /// Body shorter or longer than the declared length
    #[error("incomplete body, expected {expected} bytes, received {received}")]
    IncompleteBody { expected: u64, received: u64 },

    /// Object name collides with an existing "directory" prefix
    #[error("object exists as prefix: {bucket}/{object}")]
    ObjectExistsAsPrefix { bucket: String, object: String },

    /// Object not found
    #[error("object not found: {bucket}/{object}")]
    ObjectNotFound { bucket: String, object: String },

    /// Invalid object name
    #[error("object name invalid: {bucket}/{object}")]
    ObjectNameInvalid { bucket: String, object: String },

    /// I/O failure while reading a request body or the backing medium
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything the backend cannot classify
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn bucket_not_found(bucket: impl Into<String>) -> Self {
        Self::BucketNotFound {
            bucket: bucket.into(),
        }
    }

    pub fn object_not_found(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}
