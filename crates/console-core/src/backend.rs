//! The storage backend contract consumed by the web layer

use crate::{
    metadata::{BucketInfo, ListObjectsPage, ObjectInfo, StorageInfo},
    Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Object content as a stream of chunks
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Parameters of an object upload
pub struct ObjectUpload {
    /// Declared length, if the client sent one
    pub size: Option<u64>,
    /// Declared MIME type
    pub content_type: Option<String>,
    /// Expected hex MD5 of the content
    pub expected_md5: Option<String>,
    /// The content itself
    pub body: ByteStream,
}

impl ObjectUpload {
    /// An upload with no declared length, type or digest
    pub fn from_stream(body: ByteStream) -> Self {
        Self {
            size: None,
            content_type: None,
            expected_md5: None,
            body,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_expected_md5(mut self, md5_hex: impl Into<String>) -> Self {
        self.expected_md5 = Some(md5_hex.into());
        self
    }
}

/// Trait for storage backends.
///
/// Every call either succeeds or fails with one variant of
/// [`StorageError`](crate::StorageError).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Capacity and usage of the storage root
    async fn storage_info(&self) -> Result<StorageInfo>;

    /// Create a bucket
    async fn make_bucket(&self, bucket: &str) -> Result<()>;

    /// List every bucket
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// List one page of objects under `prefix`, resuming after `marker`.
    ///
    /// With a non-empty `delimiter`, keys that contain it past the prefix are
    /// folded into a single [`ListEntry::Prefix`](crate::ListEntry::Prefix).
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsPage>;

    /// Store an object, replacing any existing one with the same name
    async fn create_object(
        &self,
        bucket: &str,
        object: &str,
        upload: ObjectUpload,
    ) -> Result<ObjectInfo>;

    /// Open an object for reading
    async fn get_object(&self, bucket: &str, object: &str) -> Result<(ObjectInfo, ByteStream)>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, object: &str) -> Result<()>;
}
