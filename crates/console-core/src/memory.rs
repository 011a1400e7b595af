//! In-memory storage backend for development and testing

use crate::{
    backend::{ByteStream, ObjectUpload, StorageBackend},
    metadata::{BucketInfo, ListEntry, ListObjectsPage, ObjectInfo, StorageInfo},
    Result, StorageError,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::{stream, StreamExt};
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::{collections::BTreeMap, ops::Bound, path::Path, sync::Arc};
use sysinfo::Disks;
use tracing::{debug, instrument};

/// Page size used when the caller asks for zero keys
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Chunk size of download streams (64 KB)
const READ_CHUNK_SIZE: usize = 64 * 1024;

const MAX_OBJECT_NAME_LEN: usize = 1024;

struct StoredObject {
    info: ObjectInfo,
    data: Bytes,
}

struct BucketEntry {
    created: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

/// An in-memory storage backend with an optional byte quota
#[derive(Clone, Default)]
pub struct MemoryBackend {
    buckets: Arc<DashMap<String, BucketEntry>>,
    quota: Option<u64>,
    used: Arc<Mutex<u64>>,
}

impl MemoryBackend {
    /// Create an unlimited backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that refuses writes beyond `quota` bytes
    pub fn with_quota(quota: u64) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Bytes currently stored across all buckets
    pub fn used_bytes(&self) -> u64 {
        *self.used.lock()
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drain a body stream, hashing as it goes
    async fn read_body(&self, mut body: ByteStream) -> Result<(Bytes, String)> {
        let mut buf = BytesMut::new();
        let mut hasher = Md5::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            buf.extend_from_slice(&chunk);
            if let Some(quota) = self.quota {
                if buf.len() as u64 > quota {
                    return Err(StorageError::RootPathFull);
                }
            }
        }
        Ok((buf.freeze(), hex::encode(hasher.finalize())))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn storage_info(&self) -> Result<StorageInfo> {
        if let Some(quota) = self.quota {
            let used = self.used_bytes();
            return Ok(StorageInfo {
                total: quota,
                free: quota.saturating_sub(used),
            });
        }

        tokio::task::spawn_blocking(root_disk_info)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?
    }

    #[instrument(skip(self))]
    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        match self.buckets.entry(bucket.to_string()) {
            Entry::Occupied(_) => Err(StorageError::BucketExists {
                bucket: bucket.to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(BucketEntry {
                    created: Utc::now(),
                    objects: BTreeMap::new(),
                });
                debug!(bucket, "Bucket created");
                Ok(())
            }
        }
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let mut buckets: Vec<BucketInfo> = self
            .buckets
            .iter()
            .map(|entry| BucketInfo {
                name: entry.key().clone(),
                created: entry.value().created,
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    #[instrument(skip(self))]
    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        match self.buckets.entry(bucket.to_string()) {
            Entry::Vacant(_) => Err(StorageError::bucket_not_found(bucket)),
            Entry::Occupied(occupied) if !occupied.get().objects.is_empty() => {
                Err(StorageError::BucketNotEmpty {
                    bucket: bucket.to_string(),
                })
            }
            Entry::Occupied(occupied) => {
                occupied.remove();
                Ok(())
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsPage> {
        validate_bucket_name(bucket)?;
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;
        let max_keys = if max_keys == 0 { DEFAULT_MAX_KEYS } else { max_keys };
        Ok(list_page(&entry.objects, prefix, marker, delimiter, max_keys))
    }

    #[instrument(skip(self, upload))]
    async fn create_object(
        &self,
        bucket: &str,
        object: &str,
        upload: ObjectUpload,
    ) -> Result<ObjectInfo> {
        validate_bucket_name(bucket)?;
        validate_object_name(bucket, object)?;
        if !self.buckets.contains_key(bucket) {
            return Err(StorageError::bucket_not_found(bucket));
        }

        let (data, md5_hex) = self.read_body(upload.body).await?;
        let size = data.len() as u64;

        if let Some(expected) = upload.size {
            if expected != size {
                return Err(StorageError::IncompleteBody {
                    expected,
                    received: size,
                });
            }
        }
        if let Some(expected) = upload.expected_md5 {
            if !expected.eq_ignore_ascii_case(&md5_hex) {
                return Err(StorageError::BadDigest {
                    expected,
                    calculated: md5_hex,
                });
            }
        }

        let content_type = upload
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(object)
                    .first_or_octet_stream()
                    .to_string()
            });

        // The bucket may have been removed while the body was streaming in.
        let mut entry = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;
        check_prefix_collision(&entry.objects, bucket, object)?;

        let previous = entry.objects.get(object).map_or(0, |o| o.info.size);
        {
            let mut used = self.used.lock();
            let next = used.saturating_sub(previous) + size;
            if self.quota.is_some_and(|quota| next > quota) {
                return Err(StorageError::RootPathFull);
            }
            *used = next;
        }

        let info = ObjectInfo {
            bucket: bucket.to_string(),
            name: object.to_string(),
            modified: Utc::now(),
            size,
            content_type,
            etag: md5_hex,
        };
        entry.objects.insert(
            object.to_string(),
            StoredObject {
                info: info.clone(),
                data,
            },
        );
        debug!(bucket, object, size, "Object stored");
        Ok(info)
    }

    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, object: &str) -> Result<(ObjectInfo, ByteStream)> {
        validate_bucket_name(bucket)?;
        validate_object_name(bucket, object)?;
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;
        let stored = entry
            .objects
            .get(object)
            .ok_or_else(|| StorageError::object_not_found(bucket, object))?;

        let data = stored.data.clone();
        let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
            .step_by(READ_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + READ_CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok((stored.info.clone(), stream::iter(chunks).boxed()))
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        validate_object_name(bucket, object)?;
        let mut entry = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;
        let removed = entry
            .objects
            .remove(object)
            .ok_or_else(|| StorageError::object_not_found(bucket, object))?;

        let mut used = self.used.lock();
        *used = used.saturating_sub(removed.info.size);
        Ok(())
    }
}

/// Walk the sorted key space once and cut a single page.
fn list_page(
    objects: &BTreeMap<String, StoredObject>,
    prefix: &str,
    marker: &str,
    delimiter: &str,
    max_keys: usize,
) -> ListObjectsPage {
    let start = if marker.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(marker.to_string())
    };
    // A marker ending in the delimiter was a common prefix: skip everything under it.
    let skip_under = (!delimiter.is_empty() && marker.ends_with(delimiter)).then_some(marker);

    let mut page = ListObjectsPage::default();
    let mut last_prefix: Option<String> = None;

    for (key, stored) in objects.range::<String, _>((start, Bound::Unbounded)) {
        if !key.starts_with(prefix) {
            if key.as_str() > prefix {
                break;
            }
            continue;
        }
        if skip_under.is_some_and(|dir| key.starts_with(dir)) {
            continue;
        }

        let rest = &key[prefix.len()..];
        let entry = match rest.find(delimiter).filter(|_| !delimiter.is_empty()) {
            Some(pos) => {
                let common = format!("{}{}", prefix, &rest[..pos + delimiter.len()]);
                if last_prefix.as_deref() == Some(common.as_str()) {
                    continue;
                }
                ListEntry::Prefix(common)
            }
            None => ListEntry::Object(stored.info.clone()),
        };

        if page.entries.len() == max_keys {
            page.is_truncated = true;
            break;
        }
        if let ListEntry::Prefix(common) = &entry {
            last_prefix = Some(common.clone());
        }
        page.entries.push(entry);
    }

    if page.is_truncated {
        page.next_marker = page.entries.last().map(|e| e.name().to_string());
    }
    page
}

/// Reject an object that would shadow, or be shadowed by, a "directory".
fn check_prefix_collision(
    objects: &BTreeMap<String, StoredObject>,
    bucket: &str,
    object: &str,
) -> Result<()> {
    let collides = || StorageError::ObjectExistsAsPrefix {
        bucket: bucket.to_string(),
        object: object.to_string(),
    };

    // An ancestor path is already an object
    for (pos, _) in object.match_indices('/') {
        if objects.contains_key(&object[..pos]) {
            return Err(collides());
        }
    }

    // The object itself is already a directory of other objects
    let as_dir = format!("{}/", object);
    if objects
        .range::<String, _>((Bound::Included(as_dir.clone()), Bound::Unbounded))
        .next()
        .is_some_and(|(key, _)| key.starts_with(&as_dir))
    {
        return Err(collides());
    }

    Ok(())
}

fn root_disk_info() -> Result<StorageInfo> {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())
        .ok_or_else(|| StorageError::Internal("no disks reported by the host".to_string()))?;

    Ok(StorageInfo {
        total: root.total_space(),
        free: root.available_space(),
    })
}

/// Validate bucket name according to S3 rules
pub fn validate_bucket_name(name: &str) -> Result<()> {
    let invalid = || StorageError::BucketNameInvalid {
        bucket: name.to_string(),
    };

    if name.len() < 3 || name.len() > 63 {
        return Err(invalid());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid());
    }
    if name.starts_with(['-', '.']) || name.ends_with(['-', '.']) || name.contains("..") {
        return Err(invalid());
    }

    Ok(())
}

/// Validate object name
pub fn validate_object_name(bucket: &str, name: &str) -> Result<()> {
    let invalid = || StorageError::ObjectNameInvalid {
        bucket: bucket.to_string(),
        object: name.to_string(),
    };

    if name.is_empty() || name.len() > MAX_OBJECT_NAME_LEN {
        return Err(invalid());
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains('\0') {
        return Err(invalid());
    }
    if name.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(invalid());
    }

    Ok(())
}
