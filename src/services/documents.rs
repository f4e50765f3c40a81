//! src/services/documents.rs
//!
//! DocumentService — coordinates document uploads, replacements, and
//! deletions across the object store and the SQLite metadata store. The two
//! stores cannot share a transaction, so each operation fixes an ordering
//! that fails safe and compensates when the step after an irreversible write
//! fails:
//!
//! - upload:  object put, then metadata insert + counter increment; on
//!   metadata failure delete the freshly written object
//! - replace: new object put, then metadata update + counter delta; on
//!   metadata failure delete the new object; the superseded object is
//!   removed best-effort only after the commit
//! - delete:  object delete (absent counts as deleted), then metadata
//!   delete + counter decrement

use crate::models::document::Document;
use crate::services::{
    access,
    object_store::{ObjectAttrs, ObjectStore, ObjectStoreError},
    quota,
};
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::{Stream, StreamExt, pin_mut};
use serde::Serialize;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Content types accepted for upload and replace. Checked before any I/O.
pub const ALLOWED_MIME: [&str; 5] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/png",
    "image/jpeg",
    "text/plain",
];

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

pub const DEFAULT_LINK_TTL_SECS: i64 = 600;
pub const MAX_LINK_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum DocError {
    #[error("project or document not found")]
    NotFound,
    #[error("no access to this project or operation")]
    NoAccess,
    #[error("unsupported content type")]
    UnsupportedType,
    #[error("upload body is empty")]
    Empty,
    #[error("upload exceeds the per-file size limit")]
    TooLarge,
    #[error("project size limit exceeded")]
    ProjectLimitExceeded,
    #[error("object store failure: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("metadata store failure: {0}")]
    Metadata(#[from] sqlx::Error),
    #[error("failed to read upload body: {0}")]
    Io(#[from] io::Error),
}

pub type DocResult<T> = Result<T, DocError>;

/// One page of documents, most recently uploaded first.
#[derive(Debug, Serialize)]
pub struct DocumentPage {
    pub items: Vec<Document>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// A presigned download URL and its effective (clamped) lifetime.
#[derive(Debug, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub expires_in: i64,
}

/// Coordinates document operations against the object store and the
/// metadata store. Cloneable; shared as router state.
#[derive(Clone)]
pub struct DocumentService {
    pub db: Arc<SqlitePool>,
    pub store: Arc<dyn ObjectStore>,

    /// Per-upload byte ceiling, enforced before any object-store write.
    pub max_upload_bytes: i64,

    #[cfg(test)]
    fail_next_commit: Arc<std::sync::atomic::AtomicBool>,
}

impl DocumentService {
    pub fn new(db: Arc<SqlitePool>, store: Arc<dyn ObjectStore>, max_upload_bytes: i64) -> Self {
        Self {
            db,
            store,
            max_upload_bytes,
            #[cfg(test)]
            fail_next_commit: Arc::default(),
        }
    }

    /// Upload a new document into a project.
    ///
    /// Validation (access, content type, bounded read, quota) all happens
    /// before the object-store write, so rejected uploads never pay for
    /// network I/O. A metadata failure after the write triggers a
    /// best-effort compensating delete of the object.
    pub async fn upload<S>(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        content_type: &str,
        declared_filename: &str,
        stream: S,
    ) -> DocResult<Document>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let project = access::ensure_access(&self.db, project_id, user_id).await?;
        let ctype = validate_content_type(content_type)?;
        let data = read_limited(stream, self.max_upload_bytes).await?;
        let size_bytes = data.len() as i64;
        quota::check_and_reserve(&project, size_bytes)?;

        let safe = sanitize_filename(declared_filename);
        let key = object_key(project.id, &safe);
        let attrs = ObjectAttrs {
            content_type: ctype,
            original_filename: declared_filename.to_string(),
        };
        self.store.put(&key, &attrs, data).await?;

        let doc = Document {
            id: Uuid::new_v4(),
            project_id: project.id,
            filename: display_name(declared_filename, &safe),
            object_key: key,
            size_bytes,
            uploaded_by: Some(user_id),
            uploaded_at: Utc::now(),
        };

        if let Err(err) = self.commit_upload(&doc).await {
            if let Err(cleanup) = self.store.delete(&doc.object_key).await {
                warn!(
                    key = %doc.object_key,
                    error = %cleanup,
                    "compensating delete failed after metadata error"
                );
            }
            return Err(DocError::Metadata(err));
        }

        Ok(doc)
    }

    /// Replace a document's content in place.
    ///
    /// Requires the same access as upload. Old bytes are credited back
    /// before the new charge is tested, so a same-size or smaller
    /// replacement never spuriously fails quota. The old object is removed
    /// only after the metadata commit, and never fatally.
    pub async fn replace<S>(
        &self,
        user_id: Uuid,
        doc_id: Uuid,
        content_type: &str,
        declared_filename: &str,
        stream: S,
    ) -> DocResult<Document>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let old = self.fetch_document(doc_id).await?;
        let project = access::ensure_access(&self.db, old.project_id, user_id).await?;
        let ctype = validate_content_type(content_type)?;
        let data = read_limited(stream, self.max_upload_bytes).await?;
        let new_size = data.len() as i64;

        let projected = project.total_size_bytes - old.size_bytes + new_size;
        quota::check_projected(&project, projected)?;

        let safe = sanitize_filename(declared_filename);
        let new_key = object_key(project.id, &safe);
        let attrs = ObjectAttrs {
            content_type: ctype,
            original_filename: declared_filename.to_string(),
        };
        self.store.put(&new_key, &attrs, data).await?;

        let doc = Document {
            id: old.id,
            project_id: project.id,
            filename: display_name(declared_filename, &safe),
            object_key: new_key,
            size_bytes: new_size,
            uploaded_by: Some(user_id),
            uploaded_at: Utc::now(),
        };

        if let Err(err) = self.commit_replace(&doc, new_size - old.size_bytes).await {
            if let Err(cleanup) = self.store.delete(&doc.object_key).await {
                warn!(
                    key = %doc.object_key,
                    error = %cleanup,
                    "compensating delete failed after metadata error"
                );
            }
            return Err(DocError::Metadata(err));
        }

        if old.object_key != doc.object_key {
            if let Err(err) = self.store.delete(&old.object_key).await {
                warn!(
                    key = %old.object_key,
                    error = %err,
                    "failed to delete superseded object"
                );
            }
        }

        Ok(doc)
    }

    /// Delete a document. Owner-only, stricter than read/upload access.
    ///
    /// The object is deleted first; an already-absent object counts as
    /// deleted (idempotent retries), any other store failure aborts before
    /// metadata is touched. Metadata never claims a document whose blob
    /// deletion is unconfirmed.
    pub async fn delete(&self, user_id: Uuid, doc_id: Uuid) -> DocResult<()> {
        let doc = self.fetch_document(doc_id).await?;
        let project = access::fetch_project(&self.db, doc.project_id).await?;
        access::ensure_owner(user_id, &project)?;

        self.store.delete(&doc.object_key).await?;

        let mut tx = self.db.begin().await?;
        quota::apply_delta(&mut *tx, project.id, -doc.size_bytes.max(0)).await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(doc.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// List a project's documents, most recently uploaded first, with an
    /// optional case-insensitive filename substring filter. Page bounds are
    /// clamped rather than rejected.
    pub async fn list(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        page: Option<i64>,
        page_size: Option<i64>,
        filename_filter: Option<&str>,
    ) -> DocResult<DocumentPage> {
        access::ensure_access(&self.db, project_id, user_id).await?;

        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, project_id, filename, object_key, size_bytes, uploaded_by, uploaded_at \
             FROM documents WHERE project_id = ",
        );
        builder.push_bind(project_id);
        if let Some(q) = filename_filter {
            // SQLite LIKE is case-insensitive for ASCII.
            builder.push(" AND filename LIKE ");
            builder.push_bind(format!("%{}%", q));
        }
        builder.push(" ORDER BY uploaded_at DESC, id DESC LIMIT ");
        builder.push_bind(page_size);
        builder.push(" OFFSET ");
        // `page` is caller-controlled and only floored, so the offset must
        // saturate instead of overflowing.
        builder.push_bind((page - 1).saturating_mul(page_size));
        let items: Vec<Document> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM documents WHERE project_id = ",
        );
        count.push_bind(project_id);
        if let Some(q) = filename_filter {
            count.push(" AND filename LIKE ");
            count.push_bind(format!("%{}%", q));
        }
        let total: i64 = count.build_query_scalar().fetch_one(&*self.db).await?;

        Ok(DocumentPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Produce a time-limited download URL for a document.
    ///
    /// `ttl` is clamped into `[1, 3600]` seconds; the returned `expires_in`
    /// reflects the clamped value, not the caller's request.
    pub async fn download_link(
        &self,
        user_id: Uuid,
        doc_id: Uuid,
        ttl_secs: Option<i64>,
    ) -> DocResult<DownloadLink> {
        let doc = self.fetch_document(doc_id).await?;
        access::ensure_access(&self.db, doc.project_id, user_id).await?;

        let expires_in = ttl_secs.unwrap_or(DEFAULT_LINK_TTL_SECS).clamp(1, MAX_LINK_TTL_SECS);
        let expires_at = (Utc::now() + Duration::seconds(expires_in)).timestamp();
        let url = self.store.presign_get(&doc.object_key, expires_at);

        Ok(DownloadLink { url, expires_in })
    }

    async fn fetch_document(&self, doc_id: Uuid) -> DocResult<Document> {
        sqlx::query_as::<_, Document>(
            "SELECT id, project_id, filename, object_key, size_bytes, uploaded_by, uploaded_at \
             FROM documents WHERE id = ?",
        )
        .bind(doc_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DocError::NotFound,
            other => DocError::Metadata(other),
        })
    }

    /// Insert the document row and charge the project counter in one
    /// transaction.
    async fn commit_upload(&self, doc: &Document) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        self.maybe_fail_commit()?;
        sqlx::query(
            "INSERT INTO documents (id, project_id, filename, object_key, size_bytes, uploaded_by, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(doc.id)
        .bind(doc.project_id)
        .bind(&doc.filename)
        .bind(&doc.object_key)
        .bind(doc.size_bytes)
        .bind(doc.uploaded_by)
        .bind(doc.uploaded_at)
        .execute(&mut *tx)
        .await?;
        quota::apply_delta(&mut *tx, doc.project_id, doc.size_bytes).await?;
        tx.commit().await
    }

    /// Update the document row and apply the size delta to the project
    /// counter in one transaction.
    async fn commit_replace(&self, doc: &Document, delta: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        self.maybe_fail_commit()?;
        sqlx::query(
            "UPDATE documents
             SET object_key = ?, filename = ?, size_bytes = ?, uploaded_by = ?, uploaded_at = ?
             WHERE id = ?",
        )
        .bind(&doc.object_key)
        .bind(&doc.filename)
        .bind(doc.size_bytes)
        .bind(doc.uploaded_by)
        .bind(doc.uploaded_at)
        .bind(doc.id)
        .execute(&mut *tx)
        .await?;
        quota::apply_delta(&mut *tx, doc.project_id, delta).await?;
        tx.commit().await
    }

    #[cfg(test)]
    fn maybe_fail_commit(&self) -> Result<(), sqlx::Error> {
        use std::sync::atomic::Ordering;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("injected metadata failure".into()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn maybe_fail_commit(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    /// Arm a one-shot failure of the next metadata commit.
    #[cfg(test)]
    pub(crate) fn fail_next_commit(&self) {
        self.fail_next_commit
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Read up to `max_bytes + 1` bytes from the upload body, failing fast on an
/// empty or oversized stream. Runs before any object-store write.
async fn read_limited<S>(stream: S, max_bytes: i64) -> DocResult<Bytes>
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    pin_mut!(stream);
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        if buf.len() as i64 > max_bytes {
            return Err(DocError::TooLarge);
        }
    }
    if buf.is_empty() {
        return Err(DocError::Empty);
    }
    Ok(Bytes::from(buf))
}

fn validate_content_type(content_type: &str) -> DocResult<String> {
    let ctype = content_type.trim().to_ascii_lowercase();
    if ALLOWED_MIME.contains(&ctype.as_str()) {
        Ok(ctype)
    } else {
        Err(DocError::UnsupportedType)
    }
}

/// Strip a declared filename down to `[A-Za-z0-9._-]`, mapping whitespace to
/// underscores first. Falls back to `file` when nothing survives.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if out.is_empty() {
        out.push_str("file");
    }
    out
}

/// Derive a unique object key; the fresh token guarantees uniqueness even
/// for repeated filenames, and the project id prefix is what the
/// reconciliation worker joins on.
fn object_key(project_id: Uuid, safe_name: &str) -> String {
    format!("projects/{}/{}-{}", project_id, Uuid::new_v4(), safe_name)
}

fn display_name(declared: &str, safe: &str) -> String {
    if declared.trim().is_empty() {
        safe.to_string()
    } else {
        declared.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::memory::MemoryObjectStore;
    use crate::services::testutil;
    use futures::stream;

    struct Ctx {
        svc: DocumentService,
        store: Arc<MemoryObjectStore>,
        db: Arc<SqlitePool>,
        owner: Uuid,
        member: Uuid,
        outsider: Uuid,
        project: Uuid,
    }

    async fn setup(limit: i64, max_upload: i64) -> Ctx {
        let db = testutil::memory_pool().await;
        let owner = testutil::seed_user(&db, "owner").await;
        let member = testutil::seed_user(&db, "member").await;
        let outsider = testutil::seed_user(&db, "outsider").await;
        let project = testutil::seed_project(&db, owner, limit).await;
        testutil::seed_participant(&db, project, member).await;

        let store = Arc::new(MemoryObjectStore::default());
        let svc = DocumentService::new(db.clone(), store.clone(), max_upload);
        Ctx {
            svc,
            store,
            db,
            owner,
            member,
            outsider,
            project,
        }
    }

    fn body(bytes: &[u8]) -> impl Stream<Item = io::Result<Bytes>> + Send {
        stream::iter(vec![Ok(Bytes::copy_from_slice(bytes))])
    }

    #[tokio::test]
    async fn upload_persists_object_and_charges_quota() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.member, ctx.project, "text/plain", "notes.txt", body(b"hello"))
            .await
            .unwrap();

        assert_eq!(doc.project_id, ctx.project);
        assert_eq!(doc.filename, "notes.txt");
        assert_eq!(doc.size_bytes, 5);
        assert_eq!(doc.uploaded_by, Some(ctx.member));
        assert!(doc.object_key.starts_with(&format!("projects/{}/", ctx.project)));
        assert!(doc.object_key.ends_with("-notes.txt"));
        assert!(ctx.store.contains(&doc.object_key));
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 5);
    }

    #[tokio::test]
    async fn upload_rejects_unknown_content_type_before_io() {
        let ctx = setup(1024, 1024).await;

        let err = ctx
            .svc
            .upload(ctx.member, ctx.project, "application/zip", "a.zip", body(b"pk"))
            .await
            .unwrap_err();

        assert!(matches!(err, DocError::UnsupportedType));
        assert_eq!(ctx.store.object_count(), 0);
    }

    #[tokio::test]
    async fn upload_rejects_empty_and_oversized_bodies() {
        let ctx = setup(1024, 4).await;

        let err = ctx
            .svc
            .upload(ctx.member, ctx.project, "text/plain", "a.txt", body(b""))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::Empty));

        let err = ctx
            .svc
            .upload(ctx.member, ctx.project, "text/plain", "a.txt", body(b"12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::TooLarge));
        assert_eq!(ctx.store.object_count(), 0);
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 0);
    }

    #[tokio::test]
    async fn upload_enforces_quota_boundary() {
        let ctx = setup(100, 1024).await;

        // Exactly limit - current fits.
        ctx.svc
            .upload(ctx.owner, ctx.project, "text/plain", "full.txt", body(&[0u8; 100]))
            .await
            .unwrap();
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 100);

        // One more byte does not, and leaves both stores untouched.
        let err = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "extra.txt", body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::ProjectLimitExceeded));
        assert_eq!(ctx.store.object_count(), 1);
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 100);
    }

    #[tokio::test]
    async fn upload_requires_access() {
        let ctx = setup(1024, 1024).await;

        let err = ctx
            .svc
            .upload(ctx.outsider, ctx.project, "text/plain", "a.txt", body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::NoAccess));

        let err = ctx
            .svc
            .upload(ctx.owner, Uuid::new_v4(), "text/plain", "a.txt", body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::NotFound));
    }

    #[tokio::test]
    async fn upload_compensates_on_metadata_failure() {
        let ctx = setup(1024, 1024).await;

        ctx.svc.fail_next_commit();
        let err = ctx
            .svc
            .upload(ctx.member, ctx.project, "text/plain", "a.txt", body(b"hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, DocError::Metadata(_)));
        assert_eq!(ctx.store.object_count(), 0);
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 0);
    }

    #[tokio::test]
    async fn upload_sanitizes_filename_in_key() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(
                ctx.member,
                ctx.project,
                "text/plain",
                "q3 report (final)!.txt",
                body(b"x"),
            )
            .await
            .unwrap();

        assert!(doc.object_key.ends_with("-q3_report_final.txt"));
        // Display name keeps the declared filename.
        assert_eq!(doc.filename, "q3 report (final)!.txt");
    }

    #[tokio::test]
    async fn replace_credits_old_bytes_before_charging() {
        let ctx = setup(100, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "big.txt", body(&[0u8; 100]))
            .await
            .unwrap();

        // Project is at its limit, but a smaller replacement must succeed.
        let replaced = ctx
            .svc
            .replace(ctx.member, doc.id, "text/plain", "small.txt", body(&[0u8; 40]))
            .await
            .unwrap();

        assert_eq!(replaced.id, doc.id);
        assert_eq!(replaced.size_bytes, 40);
        assert_eq!(replaced.uploaded_by, Some(ctx.member));
        assert_ne!(replaced.object_key, doc.object_key);
        assert!(ctx.store.contains(&replaced.object_key));
        assert!(!ctx.store.contains(&doc.object_key));
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 40);
    }

    #[tokio::test]
    async fn replace_rejects_projected_overflow() {
        let ctx = setup(100, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "a.txt", body(&[0u8; 80]))
            .await
            .unwrap();

        let err = ctx
            .svc
            .replace(ctx.owner, doc.id, "text/plain", "a.txt", body(&[0u8; 130]))
            .await
            .unwrap_err();

        assert!(matches!(err, DocError::ProjectLimitExceeded));
        assert!(ctx.store.contains(&doc.object_key));
        assert_eq!(ctx.store.object_count(), 1);
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 80);
    }

    #[tokio::test]
    async fn replace_compensates_on_metadata_failure() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "a.txt", body(b"original"))
            .await
            .unwrap();

        ctx.svc.fail_next_commit();
        let err = ctx
            .svc
            .replace(ctx.owner, doc.id, "text/plain", "b.txt", body(b"new"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::Metadata(_)));

        // Old object and old metadata remain authoritative.
        assert_eq!(ctx.store.keys(), vec![doc.object_key.clone()]);
        let page = ctx.svc.list(ctx.owner, ctx.project, None, None, None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].object_key, doc.object_key);
        assert_eq!(page.items[0].filename, "a.txt");
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 8);
    }

    #[tokio::test]
    async fn delete_is_owner_only() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.member, ctx.project, "text/plain", "a.txt", body(b"abc"))
            .await
            .unwrap();

        let err = ctx.svc.delete(ctx.member, doc.id).await.unwrap_err();
        assert!(matches!(err, DocError::NoAccess));
        assert!(ctx.store.contains(&doc.object_key));

        ctx.svc.delete(ctx.owner, doc.id).await.unwrap();
        assert_eq!(ctx.store.object_count(), 0);
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 0);
        assert!(matches!(
            ctx.svc.fetch_document(doc.id).await,
            Err(DocError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_tolerates_already_missing_object() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "a.txt", body(b"abc"))
            .await
            .unwrap();

        // Someone removed the blob behind our back; delete still succeeds.
        ctx.store.remove(&doc.object_key);
        ctx.svc.delete(ctx.owner, doc.id).await.unwrap();
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 0);

        // A second delete fails with NotFound, not an object-store error.
        let err = ctx.svc.delete(ctx.owner, doc.id).await.unwrap_err();
        assert!(matches!(err, DocError::NotFound));
    }

    #[tokio::test]
    async fn delete_floors_counter_at_zero() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "a.txt", body(b"abcdef"))
            .await
            .unwrap();

        // Drift the counter below the document's size.
        quota::recompute_absolute(&*ctx.db, ctx.project, 2).await.unwrap();
        ctx.svc.delete(ctx.owner, doc.id).await.unwrap();
        assert_eq!(testutil::project_total(&ctx.db, ctx.project).await, 0);
    }

    #[tokio::test]
    async fn list_paginates_most_recent_first() {
        let ctx = setup(1024, 1024).await;

        let first = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "older.txt", body(b"1"))
            .await
            .unwrap();
        let second = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "newer.txt", body(b"2"))
            .await
            .unwrap();
        testutil::set_uploaded_at(&ctx.db, first.id, "2024-01-01T00:00:00Z").await;
        testutil::set_uploaded_at(&ctx.db, second.id, "2024-06-01T00:00:00Z").await;

        let page1 = ctx
            .svc
            .list(ctx.owner, ctx.project, Some(1), Some(1), None)
            .await
            .unwrap();
        let page2 = ctx
            .svc
            .list(ctx.owner, ctx.project, Some(2), Some(1), None)
            .await
            .unwrap();

        assert_eq!(page1.total, 2);
        assert_eq!(page1.items.len(), 1);
        assert_eq!(page1.items[0].id, second.id);
        assert_eq!(page2.items.len(), 1);
        assert_eq!(page2.items[0].id, first.id);

        let page3 = ctx
            .svc
            .list(ctx.owner, ctx.project, Some(3), Some(1), None)
            .await
            .unwrap();
        assert!(page3.items.is_empty());
    }

    #[tokio::test]
    async fn list_filters_case_insensitively_and_clamps_bounds() {
        let ctx = setup(1024, 1024).await;

        ctx.svc
            .upload(ctx.owner, ctx.project, "text/plain", "Report.txt", body(b"1"))
            .await
            .unwrap();
        ctx.svc
            .upload(ctx.owner, ctx.project, "text/plain", "photo.png", body(b"2"))
            .await
            .unwrap();

        let page = ctx
            .svc
            .list(ctx.owner, ctx.project, Some(0), Some(0), Some("report"))
            .await
            .unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].filename, "Report.txt");

        let page = ctx
            .svc
            .list(ctx.owner, ctx.project, None, Some(10_000), None)
            .await
            .unwrap();
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn list_tolerates_huge_page_numbers() {
        let ctx = setup(1024, 1024).await;

        ctx.svc
            .upload(ctx.owner, ctx.project, "text/plain", "a.txt", body(b"x"))
            .await
            .unwrap();

        let page = ctx
            .svc
            .list(ctx.owner, ctx.project, Some(i64::MAX), Some(200), None)
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page, i64::MAX);
    }

    #[tokio::test]
    async fn download_link_clamps_ttl() {
        let ctx = setup(1024, 1024).await;

        let doc = ctx
            .svc
            .upload(ctx.owner, ctx.project, "text/plain", "a.txt", body(b"x"))
            .await
            .unwrap();

        let link = ctx
            .svc
            .download_link(ctx.member, doc.id, Some(10_000))
            .await
            .unwrap();
        assert_eq!(link.expires_in, MAX_LINK_TTL_SECS);
        assert!(link.url.contains(&doc.object_key));

        let link = ctx.svc.download_link(ctx.member, doc.id, None).await.unwrap();
        assert_eq!(link.expires_in, DEFAULT_LINK_TTL_SECS);

        let err = ctx
            .svc
            .download_link(ctx.outsider, doc.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::NoAccess));
    }

    #[test]
    fn sanitize_filename_cases() {
        assert_eq!(sanitize_filename("notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename("my report v2.pdf"), "my_report_v2.pdf");
        assert_eq!(sanitize_filename("päivä?.png"), "piv.png");
        assert_eq!(sanitize_filename("  "), "file");
        assert_eq!(sanitize_filename("<>:\"|"), "file");
    }
}
