//! Data-store liveness probes.

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("probe timed out")]
    Timeout,

    #[error("{0}")]
    Unavailable(String),
}

/// A minimal round trip against the backing store.
#[async_trait]
pub trait StoreProbe: Send + Sync {
    async fn ping(&self) -> Result<(), ProbeError>;
}

/// Probes the content database with `SELECT 1` over a read-only connection.
pub struct SqliteProbe {
    path: PathBuf,
}

impl SqliteProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StoreProbe for SqliteProbe {
    async fn ping(&self) -> Result<(), ProbeError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ProbeError> {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await?
    }
}
