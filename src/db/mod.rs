//! Database connection and operations

pub mod media;
pub mod requests;
pub mod sqlite_helpers;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub use media::MediaRepository;
pub use requests::RequestRepository;

use crate::sync::sources::AvailabilityStore;
use crate::sync::types::{MediaRecord, Variant};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite database file
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path))?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a media repository
    pub fn media(&self) -> MediaRepository {
        MediaRepository::new(self.pool.clone())
    }

    /// Get a request repository
    pub fn requests(&self) -> RequestRepository {
        RequestRepository::new(self.pool.clone())
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AvailabilityStore for Database {
    async fn load_eligible_page(&self, offset: i64, limit: i64) -> Result<Vec<MediaRecord>> {
        self.media().list_eligible(offset, limit).await
    }

    async fn save(&self, record: &MediaRecord) -> Result<()> {
        self.media().save(record).await
    }

    async fn has_approved_unfulfilled_request(
        &self,
        media_id: i64,
        variant: Variant,
    ) -> Result<bool> {
        self.requests()
            .has_approved_unfulfilled(media_id, variant)
            .await
    }
}
