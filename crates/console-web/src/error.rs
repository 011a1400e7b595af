//! Error types and the storage-error translation table

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use console_core::StorageError;
use thiserror::Error;

/// Client-visible API error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    BadDigest,
    BucketAlreadyExists,
    BucketNotEmpty,
    EntityTooLarge,
    IncompleteBody,
    InternalError,
    InvalidBucketName,
    InvalidToken,
    NoSuchBucket,
    NoSuchKey,
    ObjectExistsAsPrefix,
    RootPathFull,
}

impl ApiErrorCode {
    /// Every code, for exhaustive checks
    pub const ALL: [ApiErrorCode; 12] = [
        Self::BadDigest,
        Self::BucketAlreadyExists,
        Self::BucketNotEmpty,
        Self::EntityTooLarge,
        Self::IncompleteBody,
        Self::InternalError,
        Self::InvalidBucketName,
        Self::InvalidToken,
        Self::NoSuchBucket,
        Self::NoSuchKey,
        Self::ObjectExistsAsPrefix,
        Self::RootPathFull,
    ];

    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadDigest => "BadDigest",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::IncompleteBody => "IncompleteBody",
            Self::InternalError => "InternalError",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidToken => "InvalidToken",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::ObjectExistsAsPrefix => "ObjectExistsAsPrefix",
            Self::RootPathFull => "RootPathFull",
        }
    }

    /// Human-readable description written as the response body
    pub fn description(&self) -> &'static str {
        match self {
            Self::BadDigest => "The Content-Md5 you specified did not match what we received.",
            Self::BucketAlreadyExists => "The requested bucket name is not available.",
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty.",
            Self::EntityTooLarge => "Your proposed upload exceeds the maximum allowed object size.",
            Self::IncompleteBody => {
                "You did not provide the number of bytes specified by the Content-Length HTTP header."
            }
            Self::InternalError => "We encountered an internal error, please try again.",
            Self::InvalidBucketName => "The specified bucket is not valid.",
            Self::InvalidToken => "Invalid token",
            Self::NoSuchBucket => "The specified bucket does not exist.",
            Self::NoSuchKey => "The specified key does not exist.",
            Self::ObjectExistsAsPrefix => {
                "An object already exists as your prefix, choose a different object name."
            }
            Self::RootPathFull => {
                "Root path has reached its minimum free disk threshold. Please delete few objects to proceed."
            }
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RootPathFull => StatusCode::INSUFFICIENT_STORAGE,
            Self::NoSuchBucket | Self::NoSuchKey => StatusCode::NOT_FOUND,
            Self::InvalidBucketName | Self::BadDigest | Self::IncompleteBody => {
                StatusCode::BAD_REQUEST
            }
            Self::ObjectExistsAsPrefix | Self::BucketAlreadyExists | Self::BucketNotEmpty => {
                StatusCode::CONFLICT
            }
            Self::EntityTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidToken => StatusCode::FORBIDDEN,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Map a backend failure onto its client-facing code.
///
/// Invalid object names share `NoSuchKey` with missing objects so existing
/// clients keep seeing the same code for both.
pub fn translate(err: &StorageError) -> ApiErrorCode {
    match err {
        StorageError::RootPathFull => ApiErrorCode::RootPathFull,
        StorageError::BucketNotFound { .. } => ApiErrorCode::NoSuchBucket,
        StorageError::BucketNameInvalid { .. } => ApiErrorCode::InvalidBucketName,
        StorageError::BucketExists { .. } => ApiErrorCode::BucketAlreadyExists,
        StorageError::BucketNotEmpty { .. } => ApiErrorCode::BucketNotEmpty,
        StorageError::BadDigest { .. } => ApiErrorCode::BadDigest,
        StorageError::IncompleteBody { .. } => ApiErrorCode::IncompleteBody,
        StorageError::ObjectExistsAsPrefix { .. } => ApiErrorCode::ObjectExistsAsPrefix,
        StorageError::ObjectNotFound { .. } => ApiErrorCode::NoSuchKey,
        StorageError::ObjectNameInvalid { .. } => ApiErrorCode::NoSuchKey,
        StorageError::Io(_) | StorageError::Internal(_) => ApiErrorCode::InternalError,
    }
}

/// Message-only rendering of a backend failure, used by the RPC surface
pub fn error_message(err: &StorageError) -> String {
    err.to_string()
}

/// Errors of the raw upload/download endpoints
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("request body exceeds the configured limit")]
    BodyTooLarge,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Get the error code
    pub fn error_code(&self) -> ApiErrorCode {
        match self {
            Self::InvalidToken => ApiErrorCode::InvalidToken,
            Self::BodyTooLarge => ApiErrorCode::EntityTooLarge,
            Self::Storage(e) => translate(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let plain = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];

        if let Self::InvalidToken = self {
            return (StatusCode::FORBIDDEN, plain, "Invalid token").into_response();
        }

        let code = self.error_code();
        if code == ApiErrorCode::InternalError {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, code = code.as_str(), "Request failed");
        }

        (code.status_code(), plain, code.description()).into_response()
    }
}
