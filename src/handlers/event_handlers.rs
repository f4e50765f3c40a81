//! Internal endpoint that feeds storage change notifications into the
//! reconciliation worker. Sits behind the gateway; not exposed publicly.

use crate::{errors::AppError, services::AppState};
use axum::{Json, extract::State};
use tracing::info;

use crate::models::event::ChangeBatch;
use crate::services::reconcile::ReconcileSummary;

/// POST `/internal/storage-events` — process a batch of change records.
///
/// Always returns 200 with a summary; per-project failures are reported in
/// the body rather than failing the batch.
pub async fn ingest_storage_events(
    State(state): State<AppState>,
    Json(batch): Json<ChangeBatch>,
) -> Result<Json<ReconcileSummary>, AppError> {
    info!(records = batch.records.len(), "storage event batch received");
    let summary = state.reconciler.process(&batch.records).await;
    Ok(Json(summary))
}
