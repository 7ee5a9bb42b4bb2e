//! SurrealDB connection setup
//!
//! Resolves where the store lives (in-memory, a URL, SurrealDB Cloud, or a
//! local on-disk directory), connects, selects the namespace/database, and
//! runs the idempotent schema migrations.

use std::path::PathBuf;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Default namespace for Scorekeeper data
pub const DEFAULT_NAMESPACE: &str = "scorekeeper";
/// Default database for Scorekeeper data
pub const DEFAULT_DATABASE: &str = "main";
/// Default on-disk location when nothing else is configured
pub const DEFAULT_LOCAL_PATH: &str = ".scorekeeper/db";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "scorekeeper")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "scorekeeper")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, String> {
        let required = |key: &str| lookup(key).ok_or_else(|| format!("{key} not set"));
        Ok(Self {
            endpoint: required("SURREALDB_ENDPOINT")?,
            username: required("SURREALDB_USERNAME")?,
            password: required("SURREALDB_PASSWORD")?,
            namespace: lookup("SURREALDB_NAMESPACE")
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            database: lookup("SURREALDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            is_root: lookup("SURREALDB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

/// Where the store lives.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    /// Process-local `mem://` database (tests, throwaway runs)
    Memory,
    /// Any SurrealDB connection URL
    Url(String),
    /// Authenticated SurrealDB Cloud instance
    Cloud(CloudConfig),
    /// `surrealkv://` directory on local disk
    Local(PathBuf),
}

impl StoreLocation {
    /// Resolve from the environment.
    ///
    /// Cloud config wins, then `SURREALDB_URL`, then the local default
    /// directory `.scorekeeper/db`.
    pub fn from_env() -> Self {
        if let Ok(config) = CloudConfig::from_env() {
            return StoreLocation::Cloud(config);
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return StoreLocation::Url(url);
        }
        StoreLocation::Local(PathBuf::from(DEFAULT_LOCAL_PATH))
    }

    /// Human-readable location, without credentials.
    pub fn describe(&self) -> String {
        match self {
            StoreLocation::Memory => "mem://".to_string(),
            StoreLocation::Url(url) => url.clone(),
            StoreLocation::Cloud(config) => config.endpoint.clone(),
            StoreLocation::Local(path) => format!("surrealkv://{}", path.display()),
        }
    }
}

/// Connect to the configured location and initialise the schema.
#[instrument(skip_all, fields(location = %location.describe()))]
pub async fn connect(location: &StoreLocation) -> Result<Surreal<Any>> {
    let (db, namespace, database) = match location {
        StoreLocation::Memory => (open("mem://").await?, DEFAULT_NAMESPACE, DEFAULT_DATABASE),
        StoreLocation::Url(url) => (open(url).await?, DEFAULT_NAMESPACE, DEFAULT_DATABASE),
        StoreLocation::Local(path) => {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let url = format!("surrealkv://{}", path.display());
            (open(&url).await?, DEFAULT_NAMESPACE, DEFAULT_DATABASE)
        }
        StoreLocation::Cloud(config) => {
            let db = open(&config.endpoint).await?;
            if config.is_root {
                db.signin(Root {
                    username: &config.username,
                    password: &config.password,
                })
                .await
                .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &config.username,
                    password: &config.password,
                })
                .await
                .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
            }
            (db, config.namespace.as_str(), config.database.as_str())
        }
    };

    db.use_ns(namespace)
        .use_db(database)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    info!("SurrealDB connected and schema initialized");
    Ok(db)
}

async fn open(url: &str) -> Result<Surreal<Any>> {
    surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))
}
