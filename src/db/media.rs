//! Media and season availability repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::db::sqlite_helpers::{bool_to_int, decode_text, now_iso8601};
use crate::sync::types::{
    LinkFields, Linkage, MediaKind, MediaRecord, PerVariant, SeasonRecord, Variant, VariantState,
};

type DbPool = SqlitePool;

const MEDIA_COLUMNS: &str = r#"
    id, media_type, tmdb_id,
    status, service_id, external_service_id, external_service_slug, rating_key, linkage_cleared_at,
    status_4k, service_id_4k, external_service_id_4k, external_service_slug_4k, rating_key_4k,
    linkage_cleared_at_4k
"#;

/// Media row without its seasons
#[derive(Debug, Clone)]
struct MediaRow {
    id: i64,
    kind: MediaKind,
    tmdb_id: Option<i64>,
    variants: PerVariant<VariantState>,
}

fn variant_from_row(row: &sqlx::sqlite::SqliteRow, suffix: &str) -> sqlx::Result<VariantState> {
    use sqlx::Row;

    let column = |name: &str| format!("{}{}", name, suffix);
    let status_str: String = row.try_get(column("status").as_str())?;
    let cleared_at: Option<String> = row.try_get(column("linkage_cleared_at").as_str())?;

    let linkage = if cleared_at.is_some() {
        Linkage::Cleared
    } else {
        Linkage::Linked(LinkFields {
            server_id: row.try_get(column("service_id").as_str())?,
            external_id: row.try_get(column("external_service_id").as_str())?,
            slug: row.try_get(column("external_service_slug").as_str())?,
            rating_key: row.try_get(column("rating_key").as_str())?,
        })
    };

    Ok(VariantState {
        status: decode_text(&column("status"), &status_str)?,
        linkage,
    })
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MediaRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let media_type: String = row.try_get("media_type")?;

        Ok(Self {
            id: row.try_get("id")?,
            kind: decode_text("media_type", &media_type)?,
            tmdb_id: row.try_get("tmdb_id")?,
            variants: PerVariant::new(variant_from_row(row, "")?, variant_from_row(row, "_4k")?),
        })
    }
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for SeasonRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let status: String = row.try_get("status")?;
        let status_4k: String = row.try_get("status_4k")?;

        Ok(Self {
            id: row.try_get("id")?,
            season_number: row.try_get("season_number")?,
            status: PerVariant::new(
                decode_text("status", &status)?,
                decode_text("status_4k", &status_4k)?,
            ),
        })
    }
}

/// Column values written for one variant
struct LinkageColumns {
    server_id: Option<i64>,
    external_id: Option<i64>,
    slug: Option<String>,
    rating_key: Option<String>,
    cleared: i32,
}

impl From<&Linkage> for LinkageColumns {
    fn from(linkage: &Linkage) -> Self {
        match linkage {
            Linkage::Linked(fields) => Self {
                server_id: fields.server_id,
                external_id: fields.external_id,
                slug: fields.slug.clone(),
                rating_key: fields.rating_key.clone(),
                cleared: bool_to_int(false),
            },
            Linkage::Cleared => Self {
                server_id: None,
                external_id: None,
                slug: None,
                rating_key: None,
                cleared: bool_to_int(true),
            },
        }
    }
}

/// Media repository for availability reads and writes
pub struct MediaRepository {
    pool: DbPool,
}

impl MediaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Page through media that is present in at least one variant, by id
    pub async fn list_eligible(&self, offset: i64, limit: i64) -> Result<Vec<MediaRecord>> {
        let rows = sqlx::query_as::<_, MediaRow>(&format!(
            r#"
            SELECT {}
            FROM media
            WHERE status IN ('available', 'partially_available')
               OR status_4k IN ('available', 'partially_available')
            ORDER BY id
            LIMIT ?1 OFFSET ?2
            "#,
            MEDIA_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(self.with_seasons(row).await?);
        }
        Ok(records)
    }

    /// Get a media record with its seasons
    #[cfg(test)]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<MediaRecord>> {
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            "SELECT {} FROM media WHERE id = ?1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_seasons(row).await?)),
            None => Ok(None),
        }
    }

    async fn with_seasons(&self, row: MediaRow) -> Result<MediaRecord> {
        let seasons = match row.kind {
            MediaKind::Movie => Vec::new(),
            MediaKind::Series => sqlx::query_as::<_, SeasonRecord>(
                r#"
                SELECT id, season_number, status, status_4k
                FROM season
                WHERE media_id = ?1
                ORDER BY season_number
                "#,
            )
            .bind(row.id)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to load seasons for media {}", row.id))?,
        };

        Ok(MediaRecord {
            id: row.id,
            kind: row.kind,
            tmdb_id: row.tmdb_id,
            variants: row.variants,
            seasons,
        })
    }

    /// Write statuses and linkage of a media record and its seasons in one transaction.
    ///
    /// `linkage_cleared_at` keeps the time of the first clear.
    pub async fn save(&self, record: &MediaRecord) -> Result<()> {
        let now = now_iso8601();
        let standard = &record.variants[Variant::Standard];
        let enhanced = &record.variants[Variant::Enhanced];
        let std_link = LinkageColumns::from(&standard.linkage);
        let uhd_link = LinkageColumns::from(&enhanced.linkage);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE media SET
                status = ?1,
                service_id = ?2,
                external_service_id = ?3,
                external_service_slug = ?4,
                rating_key = ?5,
                linkage_cleared_at = CASE WHEN ?6 = 1 THEN COALESCE(linkage_cleared_at, ?13) ELSE NULL END,
                status_4k = ?7,
                service_id_4k = ?8,
                external_service_id_4k = ?9,
                external_service_slug_4k = ?10,
                rating_key_4k = ?11,
                linkage_cleared_at_4k = CASE WHEN ?12 = 1 THEN COALESCE(linkage_cleared_at_4k, ?13) ELSE NULL END,
                updated_at = ?13
            WHERE id = ?14
            "#,
        )
        .bind(standard.status.as_str())
        .bind(std_link.server_id)
        .bind(std_link.external_id)
        .bind(std_link.slug)
        .bind(std_link.rating_key)
        .bind(std_link.cleared)
        .bind(enhanced.status.as_str())
        .bind(uhd_link.server_id)
        .bind(uhd_link.external_id)
        .bind(uhd_link.slug)
        .bind(uhd_link.rating_key)
        .bind(uhd_link.cleared)
        .bind(&now)
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Media {} no longer exists", record.id);
        }

        for season in &record.seasons {
            sqlx::query(
                r#"
                UPDATE season SET status = ?1, status_4k = ?2, updated_at = ?3
                WHERE id = ?4 AND media_id = ?5
                "#,
            )
            .bind(season.status[Variant::Standard].as_str())
            .bind(season.status[Variant::Enhanced].as_str())
            .bind(&now)
            .bind(season.id)
            .bind(record.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to save season {}", season.season_number))?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// When the variant's linkage was first cleared, if it is cleared
    #[cfg(test)]
    pub async fn linkage_cleared_at(&self, id: i64, variant: Variant) -> Result<Option<String>> {
        let column = match variant {
            Variant::Standard => "linkage_cleared_at",
            Variant::Enhanced => "linkage_cleared_at_4k",
        };
        let cleared_at: Option<Option<String>> =
            sqlx::query_scalar(&format!("SELECT {} FROM media WHERE id = ?1", column))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(cleared_at.flatten())
    }
}
