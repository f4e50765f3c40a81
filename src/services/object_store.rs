//! src/services/object_store.rs
//!
//! Object-store capability consumed by the document coordinators and the
//! reconciliation worker: put/get/delete/list plus presigned GET URLs.
//! The production implementation keeps payloads on local disk beneath
//! `root/{key}` with attribute sidecars under a parallel `root/.attrs/{key}`
//! tree; an in-memory implementation backs the unit tests.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Side attributes stored next to an object's payload.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ObjectAttrs {
    pub content_type: String,
    pub original_filename: String,
}

/// Key and byte size of one object, as returned by prefix listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size_bytes: i64,
}

pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// An object opened for reading: attributes, length, and a byte reader.
pub struct ObjectPayload {
    pub attrs: ObjectAttrs,
    pub size_bytes: i64,
    pub reader: BoxedReader,
}

/// Blob-store capability used by the coordinators and the reconciliation
/// worker. Implementations are addressed by opaque `/`-separated keys and
/// must make `delete` idempotent: removing an already-absent object succeeds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `key`, overwriting any previous content.
    async fn put(&self, key: &str, attrs: &ObjectAttrs, data: Bytes) -> ObjectStoreResult<()>;

    /// Open the object at `key` for reading.
    async fn get(&self, key: &str) -> ObjectStoreResult<ObjectPayload>;

    /// Remove the object at `key`. An already-absent object is success.
    async fn delete(&self, key: &str) -> ObjectStoreResult<()>;

    /// List every object whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectSummary>>;

    /// Produce a time-limited, GET-only URL for `key`.
    fn presign_get(&self, key: &str, expires_at: i64) -> String;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const ATTRS_DIR: &str = ".attrs";

/// Signs and verifies the query-string tokens carried by presigned URLs.
///
/// The signature covers the secret, the object key, and the expiry instant;
/// the serving route recomputes it and rejects mismatches or expired links.
pub struct SignedUrls {
    base_url: String,
    secret: String,
}

impl SignedUrls {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    /// Build the full presigned GET URL for `key`.
    pub fn sign(&self, key: &str, expires_at: i64) -> String {
        format!(
            "{}/files/{}?expires={}&signature={}",
            self.base_url,
            key,
            expires_at,
            self.signature(key, expires_at)
        )
    }

    /// Check a presented signature against `key` and `expires_at`.
    /// Expired links fail verification regardless of the signature.
    pub fn verify(&self, key: &str, expires_at: i64, signature: &str, now: i64) -> bool {
        if expires_at < now {
            return false;
        }
        constant_time_eq(
            self.signature(key, expires_at).as_bytes(),
            signature.as_bytes(),
        )
    }

    fn signature(&self, key: &str, expires_at: i64) -> String {
        let digest = md5::compute(format!("{}\n{}\n{}", self.secret, key, expires_at));
        general_purpose::URL_SAFE_NO_PAD.encode(digest.0)
    }
}

/// Byte comparison that inspects every position instead of short-circuiting
/// on the first mismatch, so verification time does not depend on how much
/// of a presented signature is correct.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Filesystem-backed object store.
///
/// Payloads live at `root/{key}`; content type and original filename live in
/// a JSON sidecar at `root/.attrs/{key}`. Writes stream through a temporary
/// file and rename atomically so a crashed upload never leaves a partial
/// payload at the final key.
pub struct FsObjectStore {
    root: PathBuf,
    signer: Arc<SignedUrls>,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, signer: Arc<SignedUrls>) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty keys, keys that begin with `/`, and keys containing
    /// `..`, control bytes, or backslashes.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidKey);
        }
        Ok(())
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn attrs_path(&self, key: &str) -> PathBuf {
        self.root.join(ATTRS_DIR).join(key)
    }

    async fn read_attrs(&self, key: &str) -> ObjectStoreResult<ObjectAttrs> {
        match fs::read(self.attrs_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|err| {
                ObjectStoreError::Io(io::Error::new(ErrorKind::InvalidData, err))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(key, "attrs sidecar missing, using defaults");
                Ok(ObjectAttrs {
                    content_type: "application/octet-stream".into(),
                    original_filename: String::new(),
                })
            }
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    /// Recursively remove empty directories up to (but not including) `stop`.
    async fn prune_empty_dirs(start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, attrs: &ObjectAttrs, data: Bytes) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;

        let file_path = self.payload_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or(ObjectStoreError::InvalidKey)?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }

        let attrs_path = self.attrs_path(key);
        let write_attrs = async {
            if let Some(parent) = attrs_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let raw = serde_json::to_vec(attrs)
                .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
            fs::write(&attrs_path, raw).await
        };
        if let Err(err) = write_attrs.await {
            let _ = fs::remove_file(&file_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<ObjectPayload> {
        Self::ensure_key_safe(key)?;

        let file_path = self.payload_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(key.to_string())
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let size_bytes = file.metadata().await?.len() as i64;
        let attrs = self.read_attrs(key).await?;

        Ok(ObjectPayload {
            attrs,
            size_bytes,
            reader: Box::pin(file),
        })
    }

    async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;

        let file_path = self.payload_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed object payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("object {} already absent", file_path.display());
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        let attrs_path = self.attrs_path(key);
        if let Err(err) = fs::remove_file(&attrs_path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!("failed to remove attrs sidecar {}: {}", attrs_path.display(), err);
            }
        }

        if let Some(parent) = file_path.parent() {
            Self::prune_empty_dirs(parent, &self.root).await;
        }
        let attrs_root = self.root.join(ATTRS_DIR);
        if let Some(parent) = attrs_path.parent() {
            Self::prune_empty_dirs(parent, &attrs_root).await;
        }

        Ok(())
    }

    async fn list(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectSummary>> {
        Self::ensure_key_safe(prefix)?;

        let start = self.root.join(prefix.trim_end_matches('/'));
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(ObjectStoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(path);
                    continue;
                }
                let rel = path.strip_prefix(&self.root).map_err(|_| {
                    ObjectStoreError::Io(io::Error::other("listing escaped store root"))
                })?;
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                if !key.starts_with(prefix) {
                    continue;
                }
                out.push(ObjectSummary {
                    key,
                    size_bytes: meta.len() as i64,
                });
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    fn presign_get(&self, key: &str, expires_at: i64) -> String {
        self.signer.sign(key, expires_at)
    }
}
