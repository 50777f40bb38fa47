//! Acquisition request lookups

use anyhow::Result;
use sqlx::SqlitePool;

use crate::db::sqlite_helpers::bool_to_int;
use crate::sync::types::Variant;

type DbPool = SqlitePool;

/// Request repository. Requests are owned by the request pipeline; this side only reads them.
pub struct RequestRepository {
    pool: DbPool,
}

impl RequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Whether an approved request for this variant is still waiting to be fulfilled
    pub async fn has_approved_unfulfilled(&self, media_id: i64, variant: Variant) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM media_request
                WHERE media_id = ?1 AND is_4k = ?2 AND status = 'approved'
            )
            "#,
        )
        .bind(media_id)
        .bind(bool_to_int(variant.is_enhanced()))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }
}
