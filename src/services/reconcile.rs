//! src/services/reconcile.rs
//!
//! ReconcileWorker — consumes object-store change notifications and repairs
//! drift in the per-project cached byte totals. Creation events carry a
//! trustworthy size and are folded into an atomic, floored increment;
//! removal events do not, so the worker instead lists the project's prefix
//! and overwrites the cached total with the authoritative sum. The
//! recomputation is idempotent and also absorbs drift from missed or
//! duplicated creation events.

use crate::models::event::{ChangeKind, ChangeRecord};
use crate::services::{object_store::ObjectStore, quota};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one batch, mirrored into the notification endpoint's response.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub ok: bool,
    /// Creation records folded into counter increments.
    pub created_events: usize,
    /// Projects whose totals were recomputed from a prefix listing.
    pub recalculated_projects: usize,
    /// Records skipped as malformed or unrelated.
    pub skipped_records: usize,
    /// Projects whose listing or update failed; retried on the next batch.
    pub failed_projects: usize,
}

/// Applies change-notification batches against the metadata store.
/// Cloneable; shared as router state.
#[derive(Clone)]
pub struct ReconcileWorker {
    db: Arc<SqlitePool>,
    store: Arc<dyn ObjectStore>,
}

impl ReconcileWorker {
    pub fn new(db: Arc<SqlitePool>, store: Arc<dyn ObjectStore>) -> Self {
        Self { db, store }
    }

    /// Process one ordered batch of change notifications.
    ///
    /// Never fails as a whole: malformed records are skipped and one
    /// project's failure does not abort the others. Increments are applied
    /// before recomputations, so a recompute always wins for a project that
    /// appears in both halves of a batch.
    pub async fn process(&self, records: &[ChangeRecord]) -> ReconcileSummary {
        let mut increments: BTreeMap<Uuid, i64> = BTreeMap::new();
        let mut recompute: BTreeSet<Uuid> = BTreeSet::new();
        let mut summary = ReconcileSummary::default();

        for record in records {
            let Some(project_id) = parse_project_key(&record.key) else {
                warn!(key = %record.key, "skipping record with unrecognized key");
                summary.skipped_records += 1;
                continue;
            };
            match record.kind {
                ChangeKind::Created => match record.size_bytes {
                    Some(size) if size > 0 => {
                        *increments.entry(project_id).or_default() += size;
                        summary.created_events += 1;
                    }
                    _ => {
                        warn!(key = %record.key, "skipping creation record without a size");
                        summary.skipped_records += 1;
                    }
                },
                ChangeKind::Removed => {
                    recompute.insert(project_id);
                }
                ChangeKind::Unknown => {
                    debug!(key = %record.key, "skipping record of unknown kind");
                    summary.skipped_records += 1;
                }
            }
        }

        for (project_id, delta) in &increments {
            if let Err(err) = quota::apply_delta(&*self.db, *project_id, *delta).await {
                warn!(%project_id, error = %err, "failed to apply creation delta");
                summary.failed_projects += 1;
            }
        }

        for project_id in &recompute {
            match self.recompute_project(*project_id).await {
                Ok(total) => {
                    info!(%project_id, total, "recomputed project total from listing");
                    summary.recalculated_projects += 1;
                }
                Err(err) => {
                    warn!(%project_id, error = %err, "failed to recompute project total");
                    summary.failed_projects += 1;
                }
            }
        }

        summary.ok = summary.failed_projects == 0;
        summary
    }

    /// List everything under the project's prefix and overwrite the cached
    /// total with the sum. The listing is ground truth.
    async fn recompute_project(&self, project_id: Uuid) -> anyhow::Result<i64> {
        let prefix = format!("projects/{}/", project_id);
        let objects = self.store.list(&prefix).await?;
        let total: i64 = objects.iter().map(|obj| obj.size_bytes).sum();
        quota::recompute_absolute(&*self.db, project_id, total).await?;
        Ok(total)
    }
}

/// Parse the owning project id out of a `projects/{id}/...` key.
fn parse_project_key(key: &str) -> Option<Uuid> {
    let rest = key.strip_prefix("projects/")?;
    let (project_id, _) = rest.split_once('/')?;
    Uuid::parse_str(project_id).ok()
}
