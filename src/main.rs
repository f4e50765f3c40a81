use anyhow::Result;
use axum::{Router, extract::DefaultBodyLimit};
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    AppState,
    documents::DocumentService,
    object_store::{FsObjectStore, ObjectStore, SignedUrls},
    reconcile::ReconcileWorker,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        storage_dir = %cfg.storage_dir,
        database_url = %cfg.database_url,
        public_base_url = %cfg.public_base_url,
        max_upload_bytes = cfg.max_upload_bytes,
        project_quota_bytes = cfg.project_quota_bytes,
        "starting docstore"
    );

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db, cfg.project_quota_bytes).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let signer = Arc::new(SignedUrls::new(
        cfg.public_base_url.clone(),
        cfg.presign_secret.clone(),
    ));
    let store: Arc<dyn ObjectStore> =
        Arc::new(FsObjectStore::new(&cfg.storage_dir, signer.clone()));

    let state = AppState {
        documents: DocumentService::new(db.clone(), store.clone(), cfg.max_upload_bytes),
        reconciler: ReconcileWorker::new(db.clone(), store),
        signer,
    };

    // --- Build router ---
    // Headroom over the per-upload ceiling covers multipart framing.
    let app: Router = routes::routes::routes()
        .layer(DefaultBodyLimit::max(
            cfg.max_upload_bytes as usize + 1024 * 1024,
        ))
        .with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations manually from the embedded SQL file, then backfill
/// the default size limit for projects that never had one set.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>, default_quota_bytes: i64) -> Result<()> {
    let path = "migrations/0001_init.sql";

    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    let backfilled =
        sqlx::query("UPDATE projects SET size_limit_bytes = ? WHERE size_limit_bytes <= 0")
            .bind(default_quota_bytes)
            .execute(&**db)
            .await?
            .rows_affected();
    if backfilled > 0 {
        tracing::info!("Backfilled size limit for {} projects.", backfilled);
    }

    Ok(())
}
