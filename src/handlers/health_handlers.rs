//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and the object store

use crate::services::AppState;
use crate::services::object_store::ObjectAttrs;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Performs a best-effort put/get/delete against the object store.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // 1) SQLite check
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.documents.db)
        .await
    {
        Ok(v) if v == 1 => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) Object store put/get/delete check with a throwaway key
    let probe_key = format!(".readyz-{}", Uuid::new_v4());
    let attrs = ObjectAttrs {
        content_type: "text/plain".into(),
        original_filename: "readyz".into(),
    };
    let store = &state.documents.store;
    let store_check = match store
        .put(&probe_key, &attrs, Bytes::from_static(b"readyz"))
        .await
    {
        Ok(_) => match store.get(&probe_key).await {
            Ok(payload) => {
                if payload.size_bytes == 6 {
                    // try to remove the probe; report but do not fail on removal error
                    match store.delete(&probe_key).await {
                        Ok(_) => (true, None::<String>),
                        Err(e) => (true, Some(format!("could not remove probe: {}", e))),
                    }
                } else {
                    let _ = store.delete(&probe_key).await; // best-effort cleanup
                    (false, Some("probe size mismatch".to_string()))
                }
            }
            Err(e) => {
                let _ = store.delete(&probe_key).await; // best-effort cleanup
                (false, Some(format!("could not read probe: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("could not write probe: {}", e))),
    };

    let sqlite_ok = sqlite_check.0;
    let store_ok = store_check.0;
    let overall_ok = sqlite_ok && store_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_ok,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "object_store",
        CheckStatus {
            ok: store_ok,
            error: store_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
