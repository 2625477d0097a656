//! SQLite-backed `MediaRepository` (§3 Media record, §5 resource policy).

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::error::BrokerResult;
use crate::domain::models::MediaRecord;
use crate::domain::ports::store::MediaRepository;
use crate::infrastructure::database::utils::{format_datetime, parse_datetime};

/// SQLite implementation of [`MediaRepository`].
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> BrokerResult<MediaRecord> {
        Ok(MediaRecord {
            id: row.get("id"),
            sha256: row.get("sha256"),
            original_name: row.get("original_name"),
            local_path: row.get("local_path"),
            provider_handle: row.get("provider_handle"),
            usage_count: row.get::<i64, _>("usage_count") as u32,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())
                .map_err(|e| crate::domain::error::BrokerError::Validation(e.to_string()))?,
        })
    }
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn find_by_hash(&self, sha256: &str) -> BrokerResult<Option<MediaRecord>> {
        let row = sqlx::query("SELECT * FROM media_files WHERE sha256 = ?")
            .bind(sha256)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn record_upload(
        &self,
        sha256: &str,
        original_name: &str,
        local_path: &str,
        provider_handle: Option<&str>,
    ) -> BrokerResult<MediaRecord> {
        if let Some(existing) = self.find_by_hash(sha256).await? {
            sqlx::query("UPDATE media_files SET usage_count = usage_count + 1 WHERE id = ?")
                .bind(existing.id)
                .execute(&self.pool)
                .await?;
            return Ok(MediaRecord {
                usage_count: existing.usage_count + 1,
                ..existing
            });
        }

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO media_files (sha256, original_name, local_path, provider_handle, usage_count, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(sha256)
        .bind(original_name)
        .bind(local_path)
        .bind(provider_handle)
        .bind(format_datetime(now))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(MediaRecord {
            id,
            sha256: sha256.to_string(),
            original_name: original_name.to_string(),
            local_path: local_path.to_string(),
            provider_handle: provider_handle.map(str::to_string),
            usage_count: 1,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};

    async fn setup() -> SqlitePool {
        let pool = create_test_pool().await.expect("pool");
        Migrator::new(&pool)
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .expect("migrations");
        pool
    }

    #[tokio::test]
    async fn first_upload_creates_record_with_usage_one() {
        let repo = SqliteMediaRepository::new(setup().await);
        let record = repo
            .record_upload("abc123", "cat.png", "/data/abc123.png", Some("provider-handle-1"))
            .await
            .unwrap();
        assert_eq!(record.usage_count, 1);
    }

    #[tokio::test]
    async fn duplicate_hash_increments_usage_instead_of_inserting() {
        let repo = SqliteMediaRepository::new(setup().await);
        repo.record_upload("abc123", "cat.png", "/data/abc123.png", None)
            .await
            .unwrap();
        let second = repo
            .record_upload("abc123", "cat-renamed.png", "/data/abc123.png", None)
            .await
            .unwrap();

        assert_eq!(second.usage_count, 2);
        assert_eq!(second.original_name, "cat.png");
    }
}
