//! Platform Manager (§4.5, §C3): routes a submission to one configured adapter and
//! records the outcome on the item row atomically.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::error::{AdapterError, BrokerError, BrokerResult};
use crate::domain::models::{ParamMap, TaskKind};
use crate::domain::ports::adapter::PlatformAdapter;
use crate::domain::ports::store::ItemRepository;

/// Outcome of a submission attempt through the Platform Manager.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// The adapter accepted the job; the item row has already been updated to
    /// `processing` with the returned `platform_id`/`platform_task_id`.
    Submitted {
        platform_id: String,
        platform_task_id: String,
    },
    /// The adapter rejected or failed to accept the job; the item row was not
    /// touched. The caller (Task Engine submission path) makes the retry decision.
    Failed(AdapterError),
}

/// Loads every enabled platform adapter at construction and routes submissions to
/// the configured default (§9 Open Question: only the `specified` strategy is
/// implemented; `failover`/`priority` are noted extension points on [`Self::submit`]).
pub struct PlatformManager {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
    default_platform_id: String,
    item_repo: Arc<dyn ItemRepository>,
}

impl PlatformManager {
    /// Builds the manager from a list of enabled adapters.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Adapter` if `adapters` is empty or `default_platform_id`
    /// does not match any adapter's own [`PlatformAdapter::platform_id`] — both fail
    /// fast at construction rather than surfacing later as a runtime lookup miss.
    pub fn new(
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        default_platform_id: impl Into<String>,
        item_repo: Arc<dyn ItemRepository>,
    ) -> BrokerResult<Self> {
        if adapters.is_empty() {
            return Err(BrokerError::Adapter("no platform adapters enabled".to_string()));
        }
        let default_platform_id = default_platform_id.into();
        let adapters: HashMap<String, Arc<dyn PlatformAdapter>> = adapters
            .into_iter()
            .map(|adapter| (adapter.platform_id().to_string(), adapter))
            .collect();

        if !adapters.contains_key(&default_platform_id) {
            let enabled: Vec<&str> = adapters.keys().map(String::as_str).collect();
            return Err(BrokerError::Adapter(format!(
                "default platform {default_platform_id:?} is not among enabled adapters {enabled:?}"
            )));
        }

        Ok(Self { adapters, default_platform_id, item_repo })
    }

    /// Looks up an adapter by id, used by the polling worker to query the same
    /// adapter that accepted a submission.
    #[must_use]
    pub fn get_adapter(&self, platform_id: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(platform_id).cloned()
    }

    /// Submits `item_id`'s job via the default adapter, normalizing `params` first.
    /// On acceptance, atomically persists `platform_id`/`platform_task_id` and
    /// `status = processing` on the item row before returning.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the item row can't be read/written (a local error —
    /// the caller logs and leaves the item for the next recovery/retry pass).
    pub async fn submit(
        &self,
        item_id: i64,
        task_kind: TaskKind,
        params: &ParamMap,
        model_id: Option<&str>,
    ) -> BrokerResult<SubmissionOutcome> {
        let adapter = self
            .adapters
            .get(&self.default_platform_id)
            .cloned()
            .expect("default_platform_id validated against adapters at construction");

        let normalized = adapter.normalize_params(task_kind, params);

        match adapter.submit(task_kind, &normalized, model_id).await {
            Ok(outcome) => {
                if let Some(mut item) = self.item_repo.get(item_id).await? {
                    item.mark_processing(adapter.platform_id(), outcome.platform_task_id.clone());
                    self.item_repo.save(&item).await?;
                }
                Ok(SubmissionOutcome::Submitted {
                    platform_id: adapter.platform_id().to_string(),
                    platform_task_id: outcome.platform_task_id,
                })
            }
            Err(e) => Ok(SubmissionOutcome::Failed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;
    use crate::domain::models::ItemStatus;
    use crate::domain::ports::store::{MissionRepository, NewItem, NewMission};
    use crate::domain::models::MissionStatus;
    use crate::infrastructure::database::sqlite::{SqliteItemRepository, SqliteMissionRepository};
    use crate::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};

    async fn setup() -> (Arc<SqliteItemRepository>, i64) {
        let pool = create_test_pool().await.expect("pool");
        Migrator::new(&pool).run_embedded_migrations(all_embedded_migrations()).await.expect("migrations");

        let mission_repo = SqliteMissionRepository::new(pool.clone());
        let item_repo = Arc::new(SqliteItemRepository::new(pool));

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
                vec![NewItem { item_index: 0, input_params: ParamMap::new() }],
            )
            .await
            .unwrap();
        use crate::domain::ports::store::ItemRepository as _;
        let item_id = item_repo.list_by_mission(mission_id).await.unwrap()[0].id;
        (item_repo, item_id)
    }

    #[tokio::test]
    async fn construction_fails_with_no_adapters() {
        let pool = create_test_pool().await.expect("pool");
        let item_repo: Arc<dyn ItemRepository> = Arc::new(SqliteItemRepository::new(pool));
        let result = PlatformManager::new(vec![], "mock-a", item_repo);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn construction_fails_with_unknown_default() {
        let pool = create_test_pool().await.expect("pool");
        let item_repo: Arc<dyn ItemRepository> = Arc::new(SqliteItemRepository::new(pool));
        let mock: Arc<dyn PlatformAdapter> = Arc::new(MockAdapter::new("mock-a", 1, 0.0, None));
        let result = PlatformManager::new(vec![mock], "mock-b", item_repo);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn submit_persists_processing_state_on_item_row() {
        let (item_repo, item_id) = setup().await;
        let mock: Arc<dyn PlatformAdapter> = Arc::new(MockAdapter::new("mock-a", 60, 0.0, None));
        let manager = PlatformManager::new(vec![mock], "mock-a", item_repo.clone()).unwrap();

        let outcome = manager
            .submit(item_id, TaskKind::TextToImage, &ParamMap::new(), None)
            .await
            .unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Submitted { .. }));
        use crate::domain::ports::store::ItemRepository as _;
        let item = item_repo.get(item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Processing);
        assert_eq!(item.platform_id.as_deref(), Some("mock-a"));
    }

    #[tokio::test]
    async fn submit_reports_failure_without_touching_item_row() {
        let (item_repo, item_id) = setup().await;
        let mock: Arc<dyn PlatformAdapter> = Arc::new(MockAdapter::with_supported_kinds(
            "mock-a",
            60,
            0.0,
            None,
            [TaskKind::TextToVideo].into_iter().collect(),
        ));
        let manager = PlatformManager::new(vec![mock], "mock-a", item_repo.clone()).unwrap();

        let outcome = manager
            .submit(item_id, TaskKind::TextToImage, &ParamMap::new(), None)
            .await
            .unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Failed(AdapterError::Unsupported(_))));
        use crate::domain::ports::store::ItemRepository as _;
        let item = item_repo.get(item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
    }
}
