//! SQLite-backed `ItemRepository` (§4.1, §C1).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::error::{BrokerError, BrokerResult};
use crate::domain::models::{Item, ItemStatus, ParamMap};
use crate::domain::ports::store::ItemRepository;
use crate::infrastructure::database::utils::{format_datetime, parse_datetime};

/// SQLite implementation of [`ItemRepository`].
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> BrokerResult<Item> {
        let status_str: String = row.get("status");
        let params_str: String = row.get("input_params");

        Ok(Item {
            id: row.get("id"),
            mission_id: row.get("mission_id"),
            item_index: row.get::<i64, _>("item_index") as u32,
            input_params: ParamMap::from_json(&params_str)?,
            status: ItemStatus::from_str(&status_str)
                .ok_or_else(|| BrokerError::Validation(format!("unknown item status {status_str:?}")))?,
            retry_count: row.get::<i64, _>("retry_count") as u32,
            next_retry_at: row
                .get::<Option<String>, _>("next_retry_at")
                .as_deref()
                .map(parse_datetime)
                .transpose()
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
            platform_id: row.get("platform_id"),
            platform_task_id: row.get("platform_task_id"),
            result_url: row.get("result_url"),
            error_message: row.get("error_message"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
        })
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn get(&self, id: i64) -> BrokerResult<Option<Item>> {
        let row = sqlx::query("SELECT * FROM mission_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list_by_mission(&self, mission_id: i64) -> BrokerResult<Vec<Item>> {
        let rows = sqlx::query("SELECT * FROM mission_items WHERE mission_id = ? ORDER BY item_index ASC")
            .bind(mission_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn save(&self, item: &Item) -> BrokerResult<()> {
        let params_json = item.input_params.to_json()?;
        sqlx::query(
            "UPDATE mission_items SET
                input_params = ?, status = ?, retry_count = ?, next_retry_at = ?,
                platform_id = ?, platform_task_id = ?, result_url = ?, error_message = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&params_json)
        .bind(item.status.as_str())
        .bind(i64::from(item.retry_count))
        .bind(item.next_retry_at.map(format_datetime))
        .bind(&item.platform_id)
        .bind(&item.platform_task_id)
        .bind(&item.result_url)
        .bind(&item.error_message)
        .bind(format_datetime(item.updated_at))
        .bind(item.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_due_retries(&self, engine_track: &str, now: DateTime<Utc>) -> BrokerResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT i.* FROM mission_items i
             JOIN missions m ON m.id = i.mission_id
             WHERE m.engine_track = ? AND i.status = 'pending'
               AND i.next_retry_at IS NOT NULL AND i.next_retry_at <= ?",
        )
        .bind(engine_track)
        .bind(format_datetime(now))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn list_pending_for_mission(&self, mission_id: i64) -> BrokerResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT * FROM mission_items WHERE mission_id = ? AND status = 'pending' ORDER BY item_index ASC",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn list_recoverable_pending(&self, engine_track: &str) -> BrokerResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT i.* FROM mission_items i
             JOIN missions m ON m.id = i.mission_id
             WHERE m.engine_track = ? AND m.status != 'scheduled'
               AND i.status = 'pending' AND i.next_retry_at IS NULL",
        )
        .bind(engine_track)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn list_recoverable_processing(&self, engine_track: &str) -> BrokerResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT i.* FROM mission_items i
             JOIN missions m ON m.id = i.mission_id
             WHERE m.engine_track = ? AND i.status = 'processing' AND i.platform_task_id IS NOT NULL",
        )
        .bind(engine_track)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn list_failed_for_mission(&self, mission_id: i64) -> BrokerResult<Vec<Item>> {
        let rows = sqlx::query("SELECT * FROM mission_items WHERE mission_id = ? AND status = 'failed'")
            .bind(mission_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn count_nonterminal(&self, mission_id: i64) -> BrokerResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mission_items WHERE mission_id = ? AND status IN ('pending', 'processing')",
        )
        .bind(mission_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn cancel_pending_for_mission(&self, mission_id: i64) -> BrokerResult<u64> {
        let result = sqlx::query(
            "UPDATE mission_items SET status = 'cancelled', updated_at = ? WHERE mission_id = ? AND status = 'pending'",
        )
        .bind(format_datetime(Utc::now()))
        .bind(mission_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{MissionStatus, TaskKind};
    use crate::domain::ports::store::{MissionRepository, NewItem, NewMission};
    use crate::infrastructure::database::sqlite::SqliteMissionRepository;
    use crate::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};

    async fn setup() -> (SqlitePool, i64) {
        let pool = create_test_pool().await.expect("pool");
        Migrator::new(&pool)
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .expect("migrations");

        let mission_repo = SqliteMissionRepository::new(pool.clone());
        let mission_id = mission_repo
            .create_with_items(
                NewMission {
                    name: "m".into(),
                    description: None,
                    task_kind: TaskKind::TextToImage,
                    model_id: None,
                    fixed_config: ParamMap::new(),
                    status: MissionStatus::Queued,
                    engine_track: "api".into(),
                    scheduled_time: None,
                },
                vec![
                    NewItem { item_index: 0, input_params: ParamMap::new() },
                    NewItem { item_index: 1, input_params: ParamMap::new() },
                ],
            )
            .await
            .unwrap();
        (pool, mission_id)
    }

    #[tokio::test]
    async fn save_persists_status_transition() {
        let (pool, mission_id) = setup().await;
        let repo = SqliteItemRepository::new(pool);

        let mut item = repo.list_by_mission(mission_id).await.unwrap().remove(0);
        item.mark_processing("mock-a", "task-123");
        repo.save(&item).await.unwrap();

        let reloaded = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ItemStatus::Processing);
        assert_eq!(reloaded.platform_task_id.as_deref(), Some("task-123"));
    }

    #[tokio::test]
    async fn list_due_retries_respects_next_retry_at() {
        let (pool, mission_id) = setup().await;
        let repo = SqliteItemRepository::new(pool);

        let mut items = repo.list_by_mission(mission_id).await.unwrap();
        items[0].apply_retry_or_fail("transient");
        items[0].next_retry_at = Some(Utc::now() - chrono::Duration::seconds(1));
        repo.save(&items[0]).await.unwrap();
        items[1].apply_retry_or_fail("transient");
        items[1].next_retry_at = Some(Utc::now() + chrono::Duration::seconds(120));
        repo.save(&items[1]).await.unwrap();

        let due = repo.list_due_retries("api", Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, items[0].id);
    }

    #[tokio::test]
    async fn count_nonterminal_excludes_terminal_items() {
        let (pool, mission_id) = setup().await;
        let repo = SqliteItemRepository::new(pool);

        assert_eq!(repo.count_nonterminal(mission_id).await.unwrap(), 2);

        let mut items = repo.list_by_mission(mission_id).await.unwrap();
        items[0].mark_completed("https://example.com/out.png");
        repo.save(&items[0]).await.unwrap();

        assert_eq!(repo.count_nonterminal(mission_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cancel_pending_for_mission_skips_processing_items() {
        let (pool, mission_id) = setup().await;
        let repo = SqliteItemRepository::new(pool);

        let mut items = repo.list_by_mission(mission_id).await.unwrap();
        items[0].mark_processing("mock-a", "task-1");
        repo.save(&items[0]).await.unwrap();

        let cancelled = repo.cancel_pending_for_mission(mission_id).await.unwrap();
        assert_eq!(cancelled, 1);

        let reloaded = repo.get(items[0].id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ItemStatus::Processing);
    }
}
