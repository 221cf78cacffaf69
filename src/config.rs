use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use tokio_util::sync::CancellationToken;

/// Options a [`BucketFs`](crate::BucketFs) is constructed with.
#[derive(Debug, Clone, Default)]
pub struct FsOptions {
    /// Cancellation context handed to every backend call.
    pub ctx: CancellationToken,

    /// Objects requested per listing page. `None` uses the backend's
    /// suggested page size.
    pub page_size: Option<usize>,
}

impl FsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, ctx: CancellationToken) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size).filter(|n| *n > 0);
        self
    }
}

/// Configuration for [`LocalStore`](crate::services::local_store::LocalStore).
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    /// Directory where object payloads are stored.
    pub storage_dir: PathBuf,
    /// SQLite URL of the metadata database.
    pub database_url: String,
    pub max_connections: u32,
}

const IN_MEMORY_URL: &str = "sqlite::memory:";

impl LocalStoreConfig {
    /// Read configuration from the environment, falling back to defaults:
    ///
    /// - `BUCKETFS_STORAGE_DIR` (`./data/objects`)
    /// - `BUCKETFS_DATABASE_URL` (`sqlite://./data/meta/bucketfs.db`)
    /// - `BUCKETFS_MAX_CONNECTIONS` (`5`)
    pub fn from_env() -> Result<Self> {
        let storage_dir =
            env::var("BUCKETFS_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let database_url = env::var("BUCKETFS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/bucketfs.db".into());
        let max_connections = match env::var("BUCKETFS_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse::<u32>()
                .with_context(|| format!("parsing BUCKETFS_MAX_CONNECTIONS value `{}`", value))?,
            Err(env::VarError::NotPresent) => 5,
            Err(err) => return Err(err).context("reading BUCKETFS_MAX_CONNECTIONS"),
        };
        if max_connections == 0 {
            anyhow::bail!("BUCKETFS_MAX_CONNECTIONS must be at least 1");
        }

        Ok(Self {
            storage_dir: storage_dir.into(),
            database_url,
            max_connections,
        })
    }

    /// Metadata in a private in-memory database, payloads under
    /// `storage_dir`.
    pub fn in_memory(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            database_url: IN_MEMORY_URL.into(),
            max_connections: 1,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}
