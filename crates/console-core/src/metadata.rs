//! Bucket and object metadata returned by storage backends

use chrono::{DateTime, Utc};

/// Metadata for a bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketInfo {
    /// Bucket name
    pub name: String,
    /// Creation timestamp
    pub created: DateTime<Utc>,
}

/// Metadata for a stored object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Bucket holding the object
    pub bucket: String,
    /// Full object name (key)
    pub name: String,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub content_type: String,
    /// Hex MD5 of the content
    pub etag: String,
}

/// One entry of a delimited listing.
///
/// Objects and common prefixes come back interleaved in key order, the way
/// the backend walked them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEntry {
    /// A stored object
    Object(ObjectInfo),
    /// A "directory" grouping: every key sharing this prefix up to the delimiter
    Prefix(String),
}

impl ListEntry {
    /// Key of the object, or the prefix itself
    pub fn name(&self) -> &str {
        match self {
            Self::Object(info) => &info.name,
            Self::Prefix(prefix) => prefix,
        }
    }
}

/// A single page of a listing
#[derive(Clone, Debug, Default)]
pub struct ListObjectsPage {
    pub entries: Vec<ListEntry>,
    /// More entries remain after this page
    pub is_truncated: bool,
    /// Marker to pass back for the next page (set when truncated)
    pub next_marker: Option<String>,
}

/// Capacity of the storage root
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StorageInfo {
    /// Total bytes
    pub total: u64,
    /// Free bytes
    pub free: u64,
}

impl StorageInfo {
    /// Bytes in use
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}
