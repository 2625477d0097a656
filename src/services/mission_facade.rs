//! Mission Facade (§4.8, §C7): the only component allowed to create or destroy a
//! mission. Every create/list/cancel/retry/delete operation and the validation
//! rules that gate them live here; the CLI and (if ever added) an HTTP surface are
//! both thin callers of this type.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::error::{BrokerError, BrokerResult};
use crate::domain::models::{ItemStatus, Mission, MissionStatus, ParamMap, TaskKind};
use crate::domain::ports::store::{ItemRepository, MissionPage, MissionRepository, NewItem, NewMission};

use super::task_engine::TaskEngine;

/// How far in the past a `scheduled_time` may be before mission creation rejects it
/// (B2) — a small allowance for clock skew between the caller and this process.
pub const SCHEDULED_TIME_PAST_TOLERANCE: chrono::Duration = chrono::Duration::seconds(5);

/// One sub-request's parameters, as supplied to [`MissionFacade::create_mission`].
#[derive(Debug, Clone)]
pub struct BatchItemInput {
    pub input_params: ParamMap,
}

pub struct MissionFacade {
    mission_repo: Arc<dyn MissionRepository>,
    item_repo: Arc<dyn ItemRepository>,
    engine: Arc<TaskEngine>,
}

impl MissionFacade {
    #[must_use]
    pub fn new(mission_repo: Arc<dyn MissionRepository>, item_repo: Arc<dyn ItemRepository>, engine: Arc<TaskEngine>) -> Self {
        Self { mission_repo, item_repo, engine }
    }

    /// Creates a mission and its items in one transaction (§4.8), enqueuing every
    /// item immediately if the mission starts `queued`, or leaving it `scheduled`
    /// for the Scheduler to promote later.
    ///
    /// # Errors
    /// Returns `BrokerError::Validation` if `batch_input` is empty (B1) or
    /// `scheduled_time` is more than [`SCHEDULED_TIME_PAST_TOLERANCE`] in the past
    /// (B2); otherwise `BrokerError` if the Store write fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_mission(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        task_kind: TaskKind,
        model_id: Option<String>,
        fixed_config: ParamMap,
        batch_input: Vec<BatchItemInput>,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> BrokerResult<i64> {
        if batch_input.is_empty() {
            return Err(BrokerError::Validation("batch_input must not be empty".to_string()));
        }
        if let Some(scheduled_time) = scheduled_time {
            if scheduled_time < Utc::now() - SCHEDULED_TIME_PAST_TOLERANCE {
                return Err(BrokerError::Validation(format!(
                    "scheduled_time {scheduled_time} is too far in the past"
                )));
            }
        }

        let starts_queued = scheduled_time.is_none_or(|t| t <= Utc::now());
        let status = if starts_queued { MissionStatus::Queued } else { MissionStatus::Scheduled };

        let items: Vec<NewItem> = batch_input
            .into_iter()
            .enumerate()
            .map(|(idx, item)| NewItem {
                item_index: u32::try_from(idx).unwrap_or(u32::MAX),
                input_params: item.input_params,
            })
            .collect();

        let mission_id = self
            .mission_repo
            .create_with_items(
                NewMission {
                    name: name.into(),
                    description,
                    task_kind,
                    model_id,
                    fixed_config,
                    status,
                    engine_track: self.engine.engine_track().to_string(),
                    scheduled_time,
                },
                items,
            )
            .await?;

        if starts_queued {
            self.engine.enqueue_pending_items_of_mission(mission_id).await?;
        }

        Ok(mission_id)
    }

    /// Lists missions with computed progress (§4.8).
    ///
    /// # Errors
    /// Returns `BrokerError` if the Store can't be read.
    pub async fn list_missions(&self, page: u32, page_size: u32, status: Option<MissionStatus>) -> BrokerResult<MissionPage> {
        self.mission_repo.list(self.engine.engine_track(), status, page, page_size).await
    }

    /// # Errors
    /// Returns `BrokerError` if the Store can't be read.
    pub async fn get_mission(&self, id: i64) -> BrokerResult<Option<Mission>> {
        self.mission_repo.get(id).await
    }

    /// # Errors
    /// Returns `BrokerError` if the Store can't be read.
    pub async fn list_items(&self, mission_id: i64) -> BrokerResult<Vec<crate::domain::models::Item>> {
        self.item_repo.list_by_mission(mission_id).await
    }

    /// Cancels a mission and its pending items (§5 cancellation semantics). `Ok(0)`
    /// if the mission was already terminal or doesn't exist.
    ///
    /// # Errors
    /// Returns `BrokerError` if the Store write fails.
    pub async fn cancel_mission(&self, id: i64) -> BrokerResult<u64> {
        self.mission_repo.cancel(id).await
    }

    /// Re-queues every `failed` item of an otherwise-terminal mission (§4.8, R2).
    /// `Ok(0)` if the mission has no `failed` items or is not yet terminal.
    ///
    /// # Errors
    /// Returns `BrokerError` if the Store read/write fails.
    pub async fn retry_mission(&self, id: i64) -> BrokerResult<usize> {
        let Some(mission) = self.mission_repo.get(id).await? else {
            return Ok(0);
        };
        if !mission.status.is_terminal() {
            return Ok(0);
        }

        let failed_items = self.item_repo.list_failed_for_mission(id).await?;
        if failed_items.is_empty() {
            return Ok(0);
        }

        for mut item in failed_items {
            item.reset_for_retry();
            self.item_repo.save(&item).await?;
        }

        self.mission_repo.force_status(id, MissionStatus::Running).await?;
        let requeued = self.engine.enqueue_pending_items_of_mission(id).await?;

        Ok(requeued)
    }

    /// Deletes a mission, cascading to its items (§4.8). Idempotent.
    ///
    /// # Errors
    /// Returns `BrokerError` if the Store write fails.
    pub async fn delete_mission(&self, id: i64) -> BrokerResult<()> {
        self.mission_repo.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;
    use crate::domain::ports::adapter::PlatformAdapter;
    use crate::infrastructure::database::sqlite::{SqliteItemRepository, SqliteMissionRepository};
    use crate::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};
    use crate::services::platform_manager::PlatformManager;
    use crate::services::task_engine::TaskEngineConfig;

    async fn facade() -> MissionFacade {
        let pool = create_test_pool().await.expect("pool");
        Migrator::new(&pool).run_embedded_migrations(all_embedded_migrations()).await.expect("migrations");

        let mission_repo: Arc<dyn MissionRepository> = Arc::new(SqliteMissionRepository::new(pool.clone()));
        let item_repo: Arc<dyn ItemRepository> = Arc::new(SqliteItemRepository::new(pool));
        let mock: Arc<dyn PlatformAdapter> = Arc::new(MockAdapter::new("mock-a", 60, 0.0, None));
        let platform_manager = Arc::new(PlatformManager::new(vec![mock], "mock-a", item_repo.clone()).unwrap());
        let engine = TaskEngine::new(TaskEngineConfig::default(), mission_repo.clone(), item_repo.clone(), platform_manager);

        MissionFacade::new(mission_repo, item_repo, engine)
    }

    fn batch(n: usize) -> Vec<BatchItemInput> {
        (0..n).map(|_| BatchItemInput { input_params: ParamMap::new() }).collect()
    }

    #[tokio::test]
    async fn create_mission_rejects_empty_batch() {
        let facade = facade().await;
        let err = facade
            .create_mission("m", None, TaskKind::TextToImage, None, ParamMap::new(), vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));
    }

    #[tokio::test]
    async fn create_mission_rejects_scheduled_time_too_far_in_past() {
        let facade = facade().await;
        let err = facade
            .create_mission(
                "m",
                None,
                TaskKind::TextToImage,
                None,
                ParamMap::new(),
                batch(1),
                Some(Utc::now() - chrono::Duration::seconds(30)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));
    }

    #[tokio::test]
    async fn create_mission_without_schedule_starts_queued_and_enqueues() {
        let facade = facade().await;
        let id = facade
            .create_mission("m", None, TaskKind::TextToImage, None, ParamMap::new(), batch(3), None)
            .await
            .unwrap();

        let mission = facade.get_mission(id).await.unwrap().unwrap();
        assert_eq!(mission.status, MissionStatus::Queued);
        assert_eq!(mission.total, 3);
        assert_eq!(facade.engine.queue_status().await.queue_length, 3);
    }

    #[tokio::test]
    async fn create_mission_with_future_schedule_stays_scheduled_and_does_not_enqueue() {
        let facade = facade().await;
        let id = facade
            .create_mission(
                "m",
                None,
                TaskKind::TextToImage,
                None,
                ParamMap::new(),
                batch(1),
                Some(Utc::now() + chrono::Duration::hours(1)),
            )
            .await
            .unwrap();

        let mission = facade.get_mission(id).await.unwrap().unwrap();
        assert_eq!(mission.status, MissionStatus::Scheduled);
        assert_eq!(facade.engine.queue_status().await.queue_length, 0);
    }

    #[tokio::test]
    async fn retry_mission_is_noop_on_non_terminal_mission() {
        let facade = facade().await;
        let id = facade
            .create_mission("m", None, TaskKind::TextToImage, None, ParamMap::new(), batch(1), None)
            .await
            .unwrap();

        assert_eq!(facade.retry_mission(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retry_mission_requeues_failed_items_and_reopens_mission() {
        let facade = facade().await;
        let id = facade
            .create_mission("m", None, TaskKind::TextToImage, None, ParamMap::new(), batch(1), None)
            .await
            .unwrap();

        let items = facade.list_items(id).await.unwrap();
        let mut item = items[0].clone();
        item.status = ItemStatus::Failed;
        item.retry_count = 7;
        item.error_message = Some("exhausted".into());
        facade.item_repo.save(&item).await.unwrap();
        facade.mission_repo.force_status(id, MissionStatus::Failed).await.unwrap();

        let requeued = facade.retry_mission(id).await.unwrap();
        assert_eq!(requeued, 1);

        let mission = facade.get_mission(id).await.unwrap().unwrap();
        assert_eq!(mission.status, MissionStatus::Running);

        let item = facade.list_items(id).await.unwrap().into_iter().next().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.retry_count, 0);
    }

    #[tokio::test]
    async fn cancel_mission_marks_pending_items_cancelled() {
        let facade = facade().await;
        let id = facade
            .create_mission("m", None, TaskKind::TextToImage, None, ParamMap::new(), batch(2), None)
            .await
            .unwrap();

        let cancelled = facade.cancel_mission(id).await.unwrap();
        assert_eq!(cancelled, 2);

        let mission = facade.get_mission(id).await.unwrap().unwrap();
        assert_eq!(mission.status, MissionStatus::Cancelled);
    }

    #[tokio::test]
    async fn delete_mission_is_idempotent() {
        let facade = facade().await;
        let id = facade
            .create_mission("m", None, TaskKind::TextToImage, None, ParamMap::new(), batch(1), None)
            .await
            .unwrap();

        facade.delete_mission(id).await.unwrap();
        facade.delete_mission(id).await.unwrap();
        assert!(facade.get_mission(id).await.unwrap().is_none());
    }
}
