use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_base_url: String,
    pub presign_secret: String,
    pub max_upload_bytes: i64,
    pub project_quota_bytes: i64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Project document store API")]
pub struct Args {
    /// Host to bind to (overrides DOCSTORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DOCSTORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides DOCSTORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides DOCSTORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL embedded in presigned download links
    /// (overrides DOCSTORE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Per-upload byte ceiling (overrides DOCSTORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<i64>,

    /// Per-project byte quota applied to projects without one
    /// (overrides DOCSTORE_PROJECT_QUOTA_BYTES)
    #[arg(long)]
    pub project_quota_bytes: Option<i64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const DEFAULT_MAX_UPLOAD_BYTES: i64 = 50 * 1024 * 1024;
const DEFAULT_PROJECT_QUOTA_BYTES: i64 = 1024 * 1024 * 1024;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("DOCSTORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("DOCSTORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing DOCSTORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8000,
            Err(err) => return Err(err).context("reading DOCSTORE_PORT"),
        };
        let env_storage =
            env::var("DOCSTORE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("DOCSTORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/docstore.db".into());
        let env_public_base = env::var("DOCSTORE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".into());
        let presign_secret = env::var("DOCSTORE_PRESIGN_SECRET")
            .unwrap_or_else(|_| "dev-secret-change-me".into());
        let env_max_upload = env_i64("DOCSTORE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let env_quota = env_i64("DOCSTORE_PROJECT_QUOTA_BYTES", DEFAULT_PROJECT_QUOTA_BYTES)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url: args.public_base_url.unwrap_or(env_public_base),
            presign_secret,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            project_quota_bytes: args.project_quota_bytes.unwrap_or(env_quota),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_i64(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(value) => value
            .parse::<i64>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
