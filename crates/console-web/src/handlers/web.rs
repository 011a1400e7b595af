//! RPC methods of the web console

use crate::auth::{Authorized, TokenIssuer, TokenVerifier};
use crate::credentials::{Credential, CredentialStore};
use crate::error::error_message;
use crate::rpc::{decode_params, encode_reply, Method, RpcError, RpcResult};
use crate::{RESERVED_BUCKET, UI_VERSION};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use console_core::{ListEntry, StorageBackend, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::Path, sync::Arc};
use sysinfo::System;
use tracing::{info, warn};

/// Page size requested from the backend while listing
pub const LIST_PAGE_SIZE: usize = 1000;

/// Reply for calls whose only payload is success
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericReply {
    pub ui_version: String,
}

impl Default for GenericReply {
    fn default() -> Self {
        Self {
            ui_version: UI_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoReply {
    pub version: String,
    pub memory: String,
    pub platform: String,
    pub runtime: String,
    pub ui_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfoReply {
    pub disk_info: DiskInfo,
    pub ui_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeBucketArgs {
    #[serde(default)]
    pub bucket_name: String,
}

/// Bucket as shown in the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBucketsReply {
    pub buckets: Vec<BucketInfo>,
    pub ui_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsArgs {
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub prefix: String,
}

/// Listing entry as shown in the console.
///
/// A "directory" entry carries only its name: no timestamp, zero size and
/// an empty content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    #[serde(rename = "name")]
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
    pub content_type: String,
}

impl ObjectInfo {
    /// Whether this entry groups a common prefix rather than an object
    pub fn is_prefix(&self) -> bool {
        self.last_modified.is_none()
    }
}

impl From<ListEntry> for ObjectInfo {
    fn from(entry: ListEntry) -> Self {
        match entry {
            ListEntry::Object(object) => Self {
                key: object.name,
                last_modified: Some(object.modified),
                size: object.size,
                content_type: object.content_type,
            },
            ListEntry::Prefix(prefix) => Self {
                key: prefix,
                last_modified: None,
                size: 0,
                content_type: String::new(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsReply {
    pub objects: Vec<ObjectInfo>,
    pub ui_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveObjectArgs {
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub object_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginArgs {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReply {
    pub token: String,
    pub ui_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAuthArgs {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

/// Reply carrying a credential pair (GenerateAuth, GetAuth)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthReply {
    pub access_key: String,
    pub secret_key: String,
    pub ui_version: String,
}

impl From<Credential> for AuthReply {
    fn from(credential: Credential) -> Self {
        Self {
            access_key: credential.access_key,
            secret_key: credential.secret_key,
            ui_version: UI_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAuthReply {
    pub token: String,
    pub ui_version: String,
}

fn storage_failure(err: StorageError) -> RpcError {
    RpcError::message(error_message(&err))
}

/// The console's RPC surface
#[derive(Clone)]
pub struct WebApi {
    backend: Arc<dyn StorageBackend>,
    credentials: Arc<CredentialStore>,
    verifier: TokenVerifier,
    issuer: TokenIssuer,
}

impl WebApi {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        credentials: Arc<CredentialStore>,
        token_expiry_secs: u64,
    ) -> Self {
        Self {
            verifier: TokenVerifier::new(Arc::clone(&credentials)),
            issuer: TokenIssuer::new(Arc::clone(&credentials), token_expiry_secs),
            backend,
            credentials,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Run one RPC call.
    ///
    /// The token check happens before arguments are even decoded; privileged
    /// methods cannot be reached without the [`Authorized`] it produces.
    pub async fn call(&self, headers: &HeaderMap, method: Method, params: Value) -> RpcResult<Value> {
        let proof = if method.requires_auth() {
            Some(self.verifier.authorize(headers).ok_or_else(RpcError::unauthorized)?)
        } else {
            None
        };

        match (method, proof) {
            (Method::Login, _) => encode_reply(self.login(decode_params(params)?).await?),
            (Method::ServerInfo, Some(auth)) => encode_reply(self.server_info(&auth).await?),
            (Method::DiskInfo, Some(auth)) => encode_reply(self.disk_info(&auth).await?),
            (Method::MakeBucket, Some(auth)) => {
                encode_reply(self.make_bucket(&auth, decode_params(params)?).await?)
            }
            (Method::ListBuckets, Some(auth)) => encode_reply(self.list_buckets(&auth).await?),
            (Method::ListObjects, Some(auth)) => {
                encode_reply(self.list_objects(&auth, decode_params(params)?).await?)
            }
            (Method::RemoveObject, Some(auth)) => {
                encode_reply(self.remove_object(&auth, decode_params(params)?).await?)
            }
            (Method::GenerateAuth, Some(auth)) => encode_reply(self.generate_auth(&auth).await?),
            (Method::SetAuth, Some(auth)) => {
                encode_reply(self.set_auth(&auth, decode_params(params)?).await?)
            }
            (Method::GetAuth, Some(auth)) => encode_reply(self.get_auth(&auth).await?),
            (_, None) => Err(RpcError::unauthorized()),
        }
    }

    /// Web.ServerInfo - identity and resource snapshot of this process
    pub async fn server_info(&self, _auth: &Authorized) -> RpcResult<ServerInfoReply> {
        let host = System::host_name().unwrap_or_default();
        let memory = tokio::task::spawn_blocking(memory_snapshot)
            .await
            .unwrap_or_default();
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());

        Ok(ServerInfoReply {
            version: env!("CARGO_PKG_VERSION").to_string(),
            memory,
            platform: format!(
                "Host: {} | OS: {} | Arch: {}",
                host,
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            runtime: format!(
                "Version: rustc-compat {} | CPUs: {}",
                env!("CARGO_PKG_RUST_VERSION"),
                cpus
            ),
            ui_version: UI_VERSION.to_string(),
        })
    }

    /// Web.DiskInfo - capacity of the storage root
    pub async fn disk_info(&self, _auth: &Authorized) -> RpcResult<DiskInfoReply> {
        let info = self.backend.storage_info().await.map_err(storage_failure)?;
        Ok(DiskInfoReply {
            disk_info: DiskInfo {
                total: info.total,
                free: info.free,
                used: info.used(),
            },
            ui_version: UI_VERSION.to_string(),
        })
    }

    /// Web.MakeBucket
    pub async fn make_bucket(&self, auth: &Authorized, args: MakeBucketArgs) -> RpcResult<GenericReply> {
        self.backend
            .make_bucket(&args.bucket_name)
            .await
            .map_err(storage_failure)?;
        info!(bucket = %args.bucket_name, user = auth.subject(), "Bucket created");
        Ok(GenericReply::default())
    }

    /// Web.ListBuckets - every bucket except the reserved one
    pub async fn list_buckets(&self, _auth: &Authorized) -> RpcResult<ListBucketsReply> {
        let reserved = reserved_bucket_name();
        let buckets = self
            .backend
            .list_buckets()
            .await
            .map_err(storage_failure)?
            .into_iter()
            .filter(|bucket| bucket.name != reserved)
            .map(|bucket| BucketInfo {
                name: bucket.name,
                creation_date: bucket.created,
            })
            .collect();

        Ok(ListBucketsReply {
            buckets,
            ui_version: UI_VERSION.to_string(),
        })
    }

    /// Web.ListObjects - drains every page into one reply
    pub async fn list_objects(&self, _auth: &Authorized, args: ListObjectsArgs) -> RpcResult<ListObjectsReply> {
        let mut objects = Vec::new();
        let mut marker = String::new();

        loop {
            let page = self
                .backend
                .list_objects(&args.bucket_name, &args.prefix, &marker, "/", LIST_PAGE_SIZE)
                .await
                .map_err(storage_failure)?;
            objects.extend(page.entries.into_iter().map(ObjectInfo::from));

            if !page.is_truncated {
                break;
            }
            match page.next_marker {
                Some(next) => marker = next,
                None => {
                    warn!(bucket = %args.bucket_name, "Truncated listing without a continuation marker");
                    break;
                }
            }
        }

        Ok(ListObjectsReply {
            objects,
            ui_version: UI_VERSION.to_string(),
        })
    }

    /// Web.RemoveObject
    pub async fn remove_object(&self, auth: &Authorized, args: RemoveObjectArgs) -> RpcResult<GenericReply> {
        self.backend
            .delete_object(&args.bucket_name, &args.object_name)
            .await
            .map_err(storage_failure)?;
        info!(
            bucket = %args.bucket_name,
            object = %args.object_name,
            user = auth.subject(),
            "Object removed"
        );
        Ok(GenericReply::default())
    }

    /// Web.Login - exchange the credential pair for a token
    pub async fn login(&self, args: LoginArgs) -> RpcResult<LoginReply> {
        if !self.issuer.authenticate(&args.username, &args.password) {
            return Err(RpcError::message("Invalid credentials"));
        }
        let token = self
            .issuer
            .generate_token(&args.username)
            .map_err(|e| RpcError::message(e.to_string()))?;

        Ok(LoginReply {
            token,
            ui_version: UI_VERSION.to_string(),
        })
    }

    /// Web.GenerateAuth - a random pair, neither saved nor activated
    pub async fn generate_auth(&self, _auth: &Authorized) -> RpcResult<AuthReply> {
        Ok(Credential::generate().into())
    }

    /// Web.SetAuth - rotate the active pair and return a token bound to it
    pub async fn set_auth(&self, auth: &Authorized, args: SetAuthArgs) -> RpcResult<SetAuthReply> {
        if args.access_key.is_empty() {
            return Err(RpcError::message("Empty access key not allowed"));
        }
        if args.secret_key.is_empty() {
            return Err(RpcError::message("Empty secret key not allowed"));
        }

        self.credentials
            .rotate(Credential::new(&args.access_key, &args.secret_key))
            .await
            .map_err(|e| RpcError::message(e.to_string()))?;
        info!(user = auth.subject(), access_key = %args.access_key, "Credentials replaced");

        if !self.issuer.authenticate(&args.access_key, &args.secret_key) {
            return Err(RpcError::message("Invalid credentials"));
        }
        let token = self
            .issuer
            .generate_token(&args.access_key)
            .map_err(|e| RpcError::message(e.to_string()))?;

        Ok(SetAuthReply {
            token,
            ui_version: UI_VERSION.to_string(),
        })
    }

    /// Web.GetAuth - the active pair
    pub async fn get_auth(&self, _auth: &Authorized) -> RpcResult<AuthReply> {
        Ok(self.credentials.current().into())
    }
}

/// Base path segment of the reserved bucket
fn reserved_bucket_name() -> &'static str {
    Path::new(RESERVED_BUCKET)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(RESERVED_BUCKET)
}

fn memory_snapshot() -> String {
    let mut system = System::new();
    system.refresh_memory();

    let (resident, virtual_mem) = sysinfo::get_current_pid()
        .ok()
        .filter(|pid| system.refresh_process(*pid))
        .and_then(|pid| system.process(pid))
        .map_or((0, 0), |process| (process.memory(), process.virtual_memory()));

    format!(
        "Used: {} | Allocated: {} | System-Used: {} | System-Total: {}",
        human_bytes(resident),
        human_bytes(virtual_mem),
        human_bytes(system.used_memory()),
        human_bytes(system.total_memory())
    )
}

/// Format a byte count with SI units (`1.2 MB`)
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialError, CredentialPersistence};
    use async_trait::async_trait;
    use axum::http::{header, HeaderValue};
    use console_core::{
        BucketInfo as StoredBucket, ByteStream, ListObjectsPage, MemoryBackend, ObjectInfo as StoredObject,
        ObjectUpload, StorageInfo,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that records every call and serves canned listing pages
    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
        buckets: Vec<StoredBucket>,
        pages: Mutex<Vec<ListObjectsPage>>,
        markers: Mutex<Vec<String>>,
    }

    impl CountingBackend {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageBackend for CountingBackend {
        async fn storage_info(&self) -> console_core::Result<StorageInfo> {
            self.hit();
            Ok(StorageInfo { total: 100, free: 40 })
        }

        async fn make_bucket(&self, _bucket: &str) -> console_core::Result<()> {
            self.hit();
            Ok(())
        }

        async fn list_buckets(&self) -> console_core::Result<Vec<StoredBucket>> {
            self.hit();
            Ok(self.buckets.clone())
        }

        async fn delete_bucket(&self, _bucket: &str) -> console_core::Result<()> {
            self.hit();
            Ok(())
        }

        async fn list_objects(
            &self,
            _bucket: &str,
            _prefix: &str,
            marker: &str,
            _delimiter: &str,
            _max_keys: usize,
        ) -> console_core::Result<ListObjectsPage> {
            self.hit();
            self.markers.lock().push(marker.to_string());
            let mut pages = self.pages.lock();
            if pages.is_empty() {
                return Ok(ListObjectsPage::default());
            }
            Ok(pages.remove(0))
        }

        async fn create_object(
            &self,
            _bucket: &str,
            _object: &str,
            _upload: ObjectUpload,
        ) -> console_core::Result<StoredObject> {
            self.hit();
            Err(StorageError::Internal("not supported".into()))
        }

        async fn get_object(
            &self,
            bucket: &str,
            object: &str,
        ) -> console_core::Result<(StoredObject, ByteStream)> {
            self.hit();
            Err(StorageError::object_not_found(bucket, object))
        }

        async fn delete_object(&self, bucket: &str, object: &str) -> console_core::Result<()> {
            self.hit();
            Err(StorageError::object_not_found(bucket, object))
        }
    }

    /// Persistence that only counts saves
    #[derive(Default)]
    struct CountingPersistence {
        saves: AtomicUsize,
    }

    #[async_trait]
    impl CredentialPersistence for CountingPersistence {
        async fn load(&self) -> Result<Option<Credential>, CredentialError> {
            Ok(None)
        }

        async fn save(&self, _credential: &Credential) -> Result<(), CredentialError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        api: WebApi,
        backend: Arc<CountingBackend>,
        persistence: Arc<CountingPersistence>,
    }

    fn harness_with(backend: CountingBackend) -> Harness {
        let backend = Arc::new(backend);
        let persistence = Arc::new(CountingPersistence::default());
        let credentials = Arc::new(CredentialStore::new(
            Credential::new("admin", "correctpw"),
            persistence.clone(),
        ));
        Harness {
            api: WebApi::new(backend.clone(), credentials, 3600),
            backend,
            persistence,
        }
    }

    fn harness() -> Harness {
        harness_with(CountingBackend::default())
    }

    fn memory_api() -> WebApi {
        let credentials = Arc::new(CredentialStore::new(
            Credential::new("admin", "correctpw"),
            Arc::new(crate::credentials::MemoryPersistence::new()),
        ));
        WebApi::new(Arc::new(MemoryBackend::new()), credentials, 3600)
    }

    async fn login_headers(api: &WebApi, user: &str, password: &str) -> HeaderMap {
        let reply = api
            .login(LoginArgs {
                username: user.to_string(),
                password: password.to_string(),
            })
            .await
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", reply.token)).unwrap(),
        );
        headers
    }

    fn args_for(method: Method) -> Value {
        match method {
            Method::MakeBucket => json!([{"bucketName": "photos"}]),
            Method::ListObjects => json!([{"bucketName": "photos", "prefix": ""}]),
            Method::RemoveObject => json!([{"bucketName": "photos", "objectName": "a.txt"}]),
            Method::SetAuth => json!([{"accessKey": "new-admin", "secretKey": "new-secret"}]),
            Method::Login => json!([{"username": "admin", "password": "correctpw"}]),
            _ => Value::Null,
        }
    }

    fn page(entries: Vec<ListEntry>, next: Option<&str>) -> ListObjectsPage {
        ListObjectsPage {
            entries,
            is_truncated: next.is_some(),
            next_marker: next.map(str::to_string),
        }
    }

    fn object(name: &str) -> ListEntry {
        ListEntry::Object(StoredObject {
            bucket: "photos".into(),
            name: name.into(),
            modified: Utc::now(),
            size: 3,
            content_type: "text/plain".into(),
            etag: "abc".into(),
        })
    }

    #[tokio::test]
    async fn test_every_privileged_method_is_gated() {
        let mut forged = HeaderMap::new();
        forged.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer not.a.token"));

        for headers in [HeaderMap::new(), forged] {
            for method in Method::ALL.into_iter().filter(Method::requires_auth) {
                let h = harness();
                let err = h.api.call(&headers, method, args_for(method)).await.unwrap_err();
                assert_eq!(err.message, "Unauthorized request", "{:?}", method);
                assert_eq!(h.backend.calls(), 0, "{:?} reached the backend", method);
                assert_eq!(h.persistence.saves.load(Ordering::SeqCst), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let h = harness();
        let other = memory_api();
        other
            .credentials
            .rotate(Credential::new("admin", "another-secret"))
            .await
            .unwrap();
        let headers = login_headers(&other, "admin", "another-secret").await;

        let err = h.api.call(&headers, Method::ListBuckets, Value::Null).await.unwrap_err();
        assert_eq!(err.message, "Unauthorized request");
        assert_eq!(h.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_every_method_answers_with_token() {
        for method in Method::ALL {
            let h = harness();
            let headers = login_headers(&h.api, "admin", "correctpw").await;
            let outcome = h.api.call(&headers, method, args_for(method)).await;
            match method {
                // The stub cannot find the object
                Method::RemoveObject => assert!(outcome.is_err()),
                _ => {
                    let reply = outcome.unwrap();
                    assert!(reply.get("uiVersion").is_some(), "{:?} lacks uiVersion", method);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_login() {
        let h = harness();
        let err = h
            .api
            .login(LoginArgs {
                username: "admin".into(),
                password: "wrongpw".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Invalid credentials");

        let err = h
            .api
            .login(LoginArgs {
                username: "root".into(),
                password: "correctpw".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Invalid credentials");

        let reply = h
            .api
            .login(LoginArgs {
                username: "admin".into(),
                password: "correctpw".into(),
            })
            .await
            .unwrap();
        assert!(!reply.token.is_empty());
        assert_eq!(reply.ui_version, UI_VERSION);
    }

    #[tokio::test]
    async fn test_list_buckets_hides_reserved() {
        let now = Utc::now();
        let h = harness_with(CountingBackend {
            buckets: vec![
                StoredBucket {
                    name: "alpha".into(),
                    created: now,
                },
                StoredBucket {
                    name: reserved_bucket_name().into(),
                    created: now,
                },
                StoredBucket {
                    name: "beta".into(),
                    created: now,
                },
            ],
            ..Default::default()
        });
        let headers = login_headers(&h.api, "admin", "correctpw").await;
        let auth = h.api.verifier().authorize(&headers).unwrap();

        let reply = h.api.list_buckets(&auth).await.unwrap();
        let names: Vec<_> = reply.buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(h.backend.calls(), 1);
    }

    #[test]
    fn test_reserved_bucket_matched_by_base_name() {
        assert!(!reserved_bucket_name().contains('/'));
        assert!(RESERVED_BUCKET.ends_with(reserved_bucket_name()));
    }

    #[tokio::test]
    async fn test_list_objects_drains_pages_in_order() {
        let h = harness_with(CountingBackend {
            pages: Mutex::new(vec![
                page(vec![object("a.txt"), ListEntry::Prefix("docs/".into())], Some("docs/")),
                page(vec![object("e.txt")], Some("e.txt")),
                page(vec![ListEntry::Prefix("music/".into()), object("z.txt")], None),
            ]),
            ..Default::default()
        });
        let headers = login_headers(&h.api, "admin", "correctpw").await;
        let auth = h.api.verifier().authorize(&headers).unwrap();

        let reply = h
            .api
            .list_objects(
                &auth,
                ListObjectsArgs {
                    bucket_name: "photos".into(),
                    prefix: String::new(),
                },
            )
            .await
            .unwrap();

        let keys: Vec<_> = reply.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt", "docs/", "e.txt", "music/", "z.txt"]);
        assert_eq!(*h.backend.markers.lock(), vec!["", "docs/", "e.txt"]);
        assert_eq!(h.backend.calls(), 3);

        let dir = &reply.objects[1];
        assert!(dir.is_prefix());
        assert_eq!(dir.size, 0);
        assert!(dir.content_type.is_empty());
        assert!(!reply.objects[0].is_prefix());
    }

    #[tokio::test]
    async fn test_set_auth_rejects_empty_fields_before_persisting() {
        let h = harness();
        let headers = login_headers(&h.api, "admin", "correctpw").await;

        let empty_access = h
            .api
            .call(&headers, Method::SetAuth, json!([{"accessKey": "", "secretKey": "s"}]))
            .await
            .unwrap_err();
        let empty_secret = h
            .api
            .call(&headers, Method::SetAuth, json!([{"accessKey": "a", "secretKey": ""}]))
            .await
            .unwrap_err();

        assert_eq!(empty_access.message, "Empty access key not allowed");
        assert_eq!(empty_secret.message, "Empty secret key not allowed");
        assert_ne!(empty_access.message, empty_secret.message);
        assert_eq!(h.persistence.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_auth_then_get_auth() {
        let h = harness();
        let headers = login_headers(&h.api, "admin", "correctpw").await;

        let reply = h
            .api
            .call(
                &headers,
                Method::SetAuth,
                json!([{"accessKey": "new-admin", "secretKey": "new-secret"}]),
            )
            .await
            .unwrap();
        let new_token = reply["token"].as_str().unwrap().to_string();
        assert_eq!(h.persistence.saves.load(Ordering::SeqCst), 1);

        // The old token died with the old secret
        let err = h.api.call(&headers, Method::GetAuth, Value::Null).await.unwrap_err();
        assert_eq!(err.message, "Unauthorized request");

        let mut fresh = HeaderMap::new();
        fresh.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", new_token)).unwrap(),
        );
        let current = h.api.call(&fresh, Method::GetAuth, Value::Null).await.unwrap();
        assert_eq!(current["accessKey"], "new-admin");
        assert_eq!(current["secretKey"], "new-secret");
    }

    #[tokio::test]
    async fn test_generate_auth_does_not_activate() {
        let h = harness();
        let headers = login_headers(&h.api, "admin", "correctpw").await;
        let auth = h.api.verifier().authorize(&headers).unwrap();

        let generated = h.api.generate_auth(&auth).await.unwrap();
        assert_eq!(generated.access_key.len(), 20);
        assert_eq!(generated.secret_key.len(), 40);

        let current = h.api.get_auth(&auth).await.unwrap();
        assert_eq!(current.access_key, "admin");
        assert_eq!(h.persistence.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bucket_scenario_against_memory_backend() {
        let api = memory_api();
        let headers = login_headers(&api, "admin", "correctpw").await;

        api.call(&headers, Method::MakeBucket, json!([{"bucketName": "my-bucket"}]))
            .await
            .unwrap();
        let listed = api.call(&headers, Method::ListBuckets, Value::Null).await.unwrap();
        assert_eq!(listed["buckets"][0]["name"], "my-bucket");

        let err = api
            .call(&headers, Method::MakeBucket, json!([{"bucketName": "my-bucket"}]))
            .await
            .unwrap_err();
        assert!(err.message.contains("bucket exists"));

        let err = api
            .call(
                &headers,
                Method::RemoveObject,
                json!([{"bucketName": "my-bucket", "objectName": "ghost.txt"}]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.message, "object not found: my-bucket/ghost.txt");
    }

    #[tokio::test]
    async fn test_disk_info_reports_backend_capacity() {
        let h = harness();
        let headers = login_headers(&h.api, "admin", "correctpw").await;
        let reply = h.api.call(&headers, Method::DiskInfo, Value::Null).await.unwrap();
        assert_eq!(reply["diskInfo"], json!({"total": 100, "free": 40, "used": 60}));
    }

    #[tokio::test]
    async fn test_server_info_shape() {
        let h = harness();
        let headers = login_headers(&h.api, "admin", "correctpw").await;
        let auth = h.api.verifier().authorize(&headers).unwrap();

        let reply = h.api.server_info(&auth).await.unwrap();
        assert!(reply.platform.contains(std::env::consts::OS));
        assert!(reply.runtime.contains("CPUs:"));
        assert!(reply.memory.starts_with("Used:"));
        assert_eq!(h.backend.calls(), 0);
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(999), "999 B");
        assert_eq!(human_bytes(1_500), "1.5 kB");
        assert_eq!(human_bytes(2_000_000_000), "2.0 GB");
    }
}
