//! Handlers for each CLI subcommand. Every mission-lifecycle command opens its own
//! short-lived `TaskEngine` for the requested track, performs one operation, and
//! exits — the engine's consumer loop is never started outside `serve`, so a
//! `create`/`retry` invocation only ever touches the in-memory ready queue long
//! enough to hand items to the daemon on its next run (or its crash-recovery pass,
//! if none is currently running).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::adapters::MockAdapter;
use crate::domain::models::{MissionStatus, ParamMap, TaskKind};
use crate::domain::ports::adapter::PlatformAdapter;
use crate::domain::ports::store::{ItemRepository, MissionRepository};
use crate::infrastructure::config::Config;
use crate::infrastructure::database::sqlite::{SqliteItemRepository, SqliteMissionRepository};
use crate::infrastructure::database::{all_embedded_migrations, create_pool, Migrator, PoolConfig};
use crate::services::mission_facade::BatchItemInput;
use crate::services::platform_manager::PlatformManager;
use crate::services::task_engine::{TaskEngine, TaskEngineConfig};
use crate::services::{MissionFacade, RetryChecker, Scheduler};

use super::table;

struct Broker {
    mission_repo: Arc<dyn MissionRepository>,
    item_repo: Arc<dyn ItemRepository>,
    platform_manager: Arc<PlatformManager>,
}

async fn connect(config: &Config) -> Result<Broker> {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(
        indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("spinner template is valid"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("opening store and applying migrations...");

    let pool = create_pool(&config.database_path, PoolConfig::default())
        .await
        .context("failed to open database")?;
    Migrator::new(&pool)
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("failed to run database migrations")?;
    spinner.finish_and_clear();

    let mission_repo: Arc<dyn MissionRepository> = Arc::new(SqliteMissionRepository::new(pool.clone()));
    let item_repo: Arc<dyn ItemRepository> = Arc::new(SqliteItemRepository::new(pool));

    // §1 scope: no real provider adapter ships in this crate, so the mock is the
    // only one the Platform Manager can ever be given; `use_mock` has nothing left
    // to toggle until a real adapter exists.
    let _ = config.use_mock;
    let mock: Arc<dyn PlatformAdapter> = Arc::new(MockAdapter::new("mock-a", 5, 0.1, None));
    let platform_manager = Arc::new(
        PlatformManager::new(vec![mock], "mock-a", item_repo.clone()).context("failed to build platform manager")?,
    );

    Ok(Broker { mission_repo, item_repo, platform_manager })
}

fn engine_config_for_track(config: &Config, track: &str) -> TaskEngineConfig {
    let max_concurrent = if track == "app" { config.max_concurrent_app } else { config.max_concurrent_api };
    TaskEngineConfig {
        engine_track: track.to_string(),
        max_concurrent,
        max_retry: config.max_retry,
        base_retry_delay_secs: config.base_retry_delay_secs,
        max_retry_delay_secs: config.max_retry_delay_secs,
        poll_interval: Duration::from_secs(config.poll_interval_secs),
        ..TaskEngineConfig::default()
    }
}

async fn facade_for_track(config: &Config, track: &str) -> Result<MissionFacade> {
    let broker = connect(config).await?;
    let engine = TaskEngine::new(
        engine_config_for_track(config, track),
        broker.mission_repo.clone(),
        broker.item_repo.clone(),
        broker.platform_manager,
    );
    Ok(MissionFacade::new(broker.mission_repo, broker.item_repo, engine))
}

/// Prints a one-line confirmation, styled green when the terminal supports it.
fn success(message: impl std::fmt::Display) {
    if console::Term::stdout().features().colors_supported() {
        println!("{}", console::style(message).green());
    } else {
        println!("{message}");
    }
}

fn parse_status(status: Option<&str>) -> Result<Option<MissionStatus>> {
    status
        .map(|s| MissionStatus::from_str(s).ok_or_else(|| anyhow::anyhow!("unknown mission status {s:?}")))
        .transpose()
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_create(
    config: &Config,
    name: String,
    task_kind: String,
    description: Option<String>,
    model_id: Option<String>,
    fixed_config: String,
    items: Vec<String>,
    scheduled_time: Option<chrono::DateTime<chrono::Utc>>,
    track: String,
) -> Result<()> {
    let task_kind = TaskKind::from_str(&task_kind).ok_or_else(|| anyhow::anyhow!("unknown task kind {task_kind:?}"))?;
    let fixed_config = ParamMap::from_json(&fixed_config).context("--fixed-config must be a JSON object")?;
    let batch_input = items
        .into_iter()
        .map(|raw| -> Result<BatchItemInput> {
            let input_params = ParamMap::from_json(&raw).context("--item must be a JSON object")?;
            Ok(BatchItemInput { input_params })
        })
        .collect::<Result<Vec<_>>>()?;

    let facade = facade_for_track(config, &track).await?;
    let id = facade
        .create_mission(name, description, task_kind, model_id, fixed_config, batch_input, scheduled_time)
        .await?;

    success(format!("created mission {id}"));
    Ok(())
}

pub async fn handle_list(config: &Config, status: Option<String>, page: u32, page_size: u32, track: String) -> Result<()> {
    let status = parse_status(status.as_deref())?;
    let facade = facade_for_track(config, &track).await?;
    let result = facade.list_missions(page, page_size, status).await?;

    println!("{}", table::format_missions(&result.missions));
    println!("page {page} ({} of {} total)", result.missions.len(), result.total);
    Ok(())
}

pub async fn handle_show(config: &Config, id: i64, track: String) -> Result<()> {
    let facade = facade_for_track(config, &track).await?;
    let Some(mission) = facade.get_mission(id).await? else {
        anyhow::bail!("mission {id} not found");
    };
    let items = facade.list_items(id).await?;

    println!("{}", table::format_missions(std::slice::from_ref(&mission)));
    println!("{}", table::format_items(&items));
    Ok(())
}

pub async fn handle_cancel(config: &Config, id: i64, track: String) -> Result<()> {
    let facade = facade_for_track(config, &track).await?;
    let cancelled = facade.cancel_mission(id).await?;
    success(format!("cancelled {cancelled} pending item(s) for mission {id}"));
    Ok(())
}

pub async fn handle_retry(config: &Config, id: i64, track: String) -> Result<()> {
    let facade = facade_for_track(config, &track).await?;
    let requeued = facade.retry_mission(id).await?;
    success(format!("requeued {requeued} failed item(s) for mission {id}"));
    Ok(())
}

pub async fn handle_delete(config: &Config, id: i64, track: String) -> Result<()> {
    let facade = facade_for_track(config, &track).await?;
    facade.delete_mission(id).await?;
    success(format!("deleted mission {id}"));
    Ok(())
}

/// Boots every configured engine track and runs until `SIGINT`/`SIGTERM` (§5).
pub async fn handle_serve(config: &Config) -> Result<()> {
    let broker = connect(config).await?;
    let mut engines = Vec::new();
    let mut handles = Vec::new();

    for track in ["api", "app"] {
        let engine = TaskEngine::new(
            engine_config_for_track(config, track),
            broker.mission_repo.clone(),
            broker.item_repo.clone(),
            broker.platform_manager.clone(),
        );
        engine
            .recover()
            .await
            .with_context(|| format!("crash recovery failed for engine track {track:?}"))?;

        let scheduler = Scheduler::new(broker.mission_repo.clone(), engine.clone())
            .with_sweep_interval(Duration::from_secs(config.scheduler_check_interval_secs));
        let retry_checker = RetryChecker::new(broker.item_repo.clone(), engine.clone())
            .with_sweep_interval(Duration::from_secs(config.retry_check_interval_secs));
        let shutdown = engine.shutdown_token();

        let consumer_engine = engine.clone();
        handles.push(tokio::spawn(async move { consumer_engine.run_consumer_loop().await }));

        let scheduler_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { scheduler.run(scheduler_shutdown).await }));

        let retry_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { retry_checker.run(retry_shutdown).await }));

        tracing::info!(track, "engine started");
        engines.push(engine);
    }

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received, stopping engines");

    for engine in &engines {
        engine.stop();
    }
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}
