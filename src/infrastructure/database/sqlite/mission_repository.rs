//! SQLite-backed `MissionRepository` (§4.1, §C1).
//!
//! Grounded on the teacher's `infrastructure/database/task_repo.rs`: manual
//! row-to-domain mapping via `sqlx::Row::get`, `chrono` timestamps stored as
//! RFC3339 text in the canonical `+08:00` offset (`utils::format_datetime`) and
//! parsed back with `utils::parse_datetime`, `serde_json`-encoded map columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::error::{BrokerError, BrokerResult};
use crate::domain::models::{Mission, MissionStatus, ParamMap, TaskKind};
use crate::domain::ports::store::{MissionPage, MissionRepository, NewItem, NewMission};
use crate::infrastructure::database::utils::{format_datetime, parse_datetime};

/// SQLite implementation of [`MissionRepository`].
pub struct SqliteMissionRepository {
    pool: SqlitePool,
}

impl SqliteMissionRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_mission(row: &sqlx::sqlite::SqliteRow) -> BrokerResult<Mission> {
        let task_kind_str: String = row.get("task_kind");
        let status_str: String = row.get("status");
        let fixed_config_str: String = row.get("fixed_config");

        Ok(Mission {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            task_kind: TaskKind::from_str(&task_kind_str)
                .ok_or_else(|| BrokerError::Validation(format!("unknown task_kind {task_kind_str:?}")))?,
            model_id: row.get("model_id"),
            fixed_config: ParamMap::from_json(&fixed_config_str)?,
            total: row.get::<i64, _>("total") as u32,
            completed: row.get::<i64, _>("completed") as u32,
            failed: row.get::<i64, _>("failed") as u32,
            status: MissionStatus::from_str(&status_str)
                .ok_or_else(|| BrokerError::Validation(format!("unknown mission status {status_str:?}")))?,
            engine_track: row.get("engine_track"),
            scheduled_time: row
                .get::<Option<String>, _>("scheduled_time")
                .as_deref()
                .map(parse_datetime)
                .transpose()
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
            started_at: row
                .get::<Option<String>, _>("started_at")
                .as_deref()
                .map(parse_datetime)
                .transpose()
                .map_err(|e| BrokerError::Validation(e.to_string()))?,
        })
    }
}

#[async_trait]
impl MissionRepository for SqliteMissionRepository {
    async fn create_with_items(&self, mission: NewMission, items: Vec<NewItem>) -> BrokerResult<i64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let fixed_config_json = mission.fixed_config.to_json()?;

        let mission_id = sqlx::query(
            "INSERT INTO missions
                (name, description, task_kind, model_id, fixed_config, total, completed, failed,
                 status, engine_track, scheduled_time, created_at, updated_at, started_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&mission.name)
        .bind(&mission.description)
        .bind(mission.task_kind.as_str())
        .bind(&mission.model_id)
        .bind(&fixed_config_json)
        .bind(i64::from(u32::try_from(items.len()).unwrap_or(u32::MAX)))
        .bind(mission.status.as_str())
        .bind(&mission.engine_track)
        .bind(mission.scheduled_time.map(format_datetime))
        .bind(format_datetime(now))
        .bind(format_datetime(now))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for item in &items {
            let params_json = item.input_params.to_json()?;
            sqlx::query(
                "INSERT INTO mission_items
                    (mission_id, item_index, input_params, status, retry_count, next_retry_at,
                     platform_id, platform_task_id, result_url, error_message, created_at, updated_at)
                 VALUES (?, ?, ?, 'pending', 0, NULL, NULL, NULL, NULL, NULL, ?, ?)",
            )
            .bind(mission_id)
            .bind(item.item_index)
            .bind(&params_json)
            .bind(format_datetime(now))
            .bind(format_datetime(now))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(mission_id)
    }

    async fn get(&self, id: i64) -> BrokerResult<Option<Mission>> {
        let row = sqlx::query("SELECT * FROM missions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_mission).transpose()
    }

    async fn list(
        &self,
        engine_track: &str,
        status: Option<MissionStatus>,
        page: u32,
        page_size: u32,
    ) -> BrokerResult<MissionPage> {
        let page = page.max(1);
        let offset = i64::from((page - 1) * page_size);
        let limit = i64::from(page_size);

        let (rows, total) = if let Some(status) = status {
            let rows = sqlx::query(
                "SELECT * FROM missions WHERE engine_track = ? AND status = ?
                 ORDER BY id DESC LIMIT ? OFFSET ?",
            )
            .bind(engine_track)
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM missions WHERE engine_track = ? AND status = ?",
            )
            .bind(engine_track)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
            (rows, total)
        } else {
            let rows = sqlx::query(
                "SELECT * FROM missions WHERE engine_track = ? ORDER BY id DESC LIMIT ? OFFSET ?",
            )
            .bind(engine_track)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM missions WHERE engine_track = ?")
                .bind(engine_track)
                .fetch_one(&self.pool)
                .await?;
            (rows, total)
        };

        let missions = rows.iter().map(Self::row_to_mission).collect::<BrokerResult<Vec<_>>>()?;
        Ok(MissionPage {
            missions,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn update_status(&self, id: i64, status: MissionStatus) -> BrokerResult<bool> {
        let now = Utc::now();
        let started_at_clause = if status == MissionStatus::Running {
            ", started_at = COALESCE(started_at, ?)"
        } else {
            ""
        };
        let sql = format!(
            "UPDATE missions SET status = ?, updated_at = ?{started_at_clause}
             WHERE id = ? AND status NOT IN ('completed', 'failed', 'cancelled')"
        );
        let mut query = sqlx::query(&sql).bind(status.as_str()).bind(format_datetime(now));
        if status == MissionStatus::Running {
            query = query.bind(format_datetime(now));
        }
        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn force_status(&self, id: i64, status: MissionStatus) -> BrokerResult<()> {
        sqlx::query("UPDATE missions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(format_datetime(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_counters(&self, id: i64, completed_delta: u32, failed_delta: u32) -> BrokerResult<()> {
        sqlx::query(
            "UPDATE missions SET completed = completed + ?, failed = failed + ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(i64::from(completed_delta))
        .bind(i64::from(failed_delta))
        .bind(format_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cancel(&self, id: i64) -> BrokerResult<u64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let updated = sqlx::query(
            "UPDATE missions SET status = 'cancelled', updated_at = ?
             WHERE id = ? AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(format_datetime(now))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(0);
        }

        let cancelled_items = sqlx::query(
            "UPDATE mission_items SET status = 'cancelled', updated_at = ?
             WHERE mission_id = ? AND status = 'pending'",
        )
        .bind(format_datetime(now))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(cancelled_items.rows_affected())
    }

    async fn delete(&self, id: i64) -> BrokerResult<()> {
        sqlx::query("DELETE FROM missions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_due_scheduled(&self, engine_track: &str, now: DateTime<Utc>) -> BrokerResult<Vec<Mission>> {
        let rows = sqlx::query(
            "SELECT * FROM missions
             WHERE engine_track = ? AND status = 'scheduled' AND scheduled_time <= ?",
        )
        .bind(engine_track)
        .bind(format_datetime(now))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_mission).collect()
    }

    async fn list_stale_scheduled(&self, engine_track: &str, cutoff: DateTime<Utc>) -> BrokerResult<Vec<Mission>> {
        let rows = sqlx::query(
            "SELECT * FROM missions
             WHERE engine_track = ? AND status = 'scheduled' AND scheduled_time < ?",
        )
        .bind(engine_track)
        .bind(format_datetime(cutoff))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_mission).collect()
    }

    async fn list_with_nonterminal_items(&self, engine_track: &str) -> BrokerResult<Vec<Mission>> {
        let rows = sqlx::query(
            "SELECT DISTINCT m.* FROM missions m
             JOIN mission_items i ON i.mission_id = m.id
             WHERE m.engine_track = ? AND i.status IN ('pending', 'processing')",
        )
        .bind(engine_track)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_mission).collect()
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

    fn new_mission() -> NewMission {
        NewMission {
            name: "test mission".into(),
            description: None,
            task_kind: TaskKind::TextToImage,
            model_id: None,
            fixed_config: ParamMap::new(),
            status: MissionStatus::Queued,
            engine_track: "api".into(),
            scheduled_time: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let pool = setup().await;
        let repo = SqliteMissionRepository::new(pool);

        let items = vec![
            NewItem { item_index: 0, input_params: ParamMap::new() },
            NewItem { item_index: 1, input_params: ParamMap::new() },
        ];
        let id = repo.create_with_items(new_mission(), items).await.unwrap();

        let mission = repo.get(id).await.unwrap().expect("mission should exist");
        assert_eq!(mission.total, 2);
        assert_eq!(mission.status, MissionStatus::Queued);
    }

    #[tokio::test]
    async fn update_status_refuses_terminal_mission() {
        let pool = setup().await;
        let repo = SqliteMissionRepository::new(pool);
        let id = repo.create_with_items(new_mission(), vec![]).await.unwrap();

        assert!(repo.update_status(id, MissionStatus::Completed).await.unwrap());
        assert!(!repo.update_status(id, MissionStatus::Running).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_marks_pending_items_and_mission() {
        let pool = setup().await;
        let repo = SqliteMissionRepository::new(pool);
        let items = vec![NewItem { item_index: 0, input_params: ParamMap::new() }];
        let id = repo.create_with_items(new_mission(), items).await.unwrap();

        let cancelled = repo.cancel(id).await.unwrap();
        assert_eq!(cancelled, 1);

        let mission = repo.get(id).await.unwrap().unwrap();
        assert_eq!(mission.status, MissionStatus::Cancelled);

        // second cancel is a no-op
        assert_eq!(repo.cancel(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn force_status_bypasses_terminal_guard() {
        let pool = setup().await;
        let repo = SqliteMissionRepository::new(pool);
        let id = repo.create_with_items(new_mission(), vec![]).await.unwrap();
        repo.update_status(id, MissionStatus::Failed).await.unwrap();

        repo.force_status(id, MissionStatus::Running).await.unwrap();

        let mission = repo.get(id).await.unwrap().unwrap();
        assert_eq!(mission.status, MissionStatus::Running);
    }

    #[tokio::test]
    async fn list_paginates_by_engine_track() {
        let pool = setup().await;
        let repo = SqliteMissionRepository::new(pool);
        for _ in 0..3 {
            repo.create_with_items(new_mission(), vec![]).await.unwrap();
        }

        let page = repo.list("api", None, 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.missions.len(), 2);
    }

    #[tokio::test]
    async fn delete_cascades_to_items() {
        let pool = setup().await;
        let repo = SqliteMissionRepository::new(pool.clone());
        let items = vec![
            NewItem { item_index: 0, input_params: ParamMap::new() },
            NewItem { item_index: 1, input_params: ParamMap::new() },
        ];
        let id = repo.create_with_items(new_mission(), items).await.unwrap();

        repo.delete(id).await.unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mission_items WHERE mission_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
