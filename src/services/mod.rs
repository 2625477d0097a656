//! Use-case orchestration layer (§4.4–§4.8): the Task Engine, Platform Manager,
//! Retry Checker, Scheduler, and Mission Facade. Everything here is built against
//! the domain's ports — no component in this module touches `sqlx` or a concrete
//! `PlatformAdapter` type directly.

pub mod mission_facade;
pub mod platform_manager;
pub mod retry_checker;
pub mod scheduler;
pub mod task_engine;

pub use mission_facade::MissionFacade;
pub use platform_manager::PlatformManager;
pub use retry_checker::RetryChecker;
pub use scheduler::Scheduler;
pub use task_engine::{ShutdownToken, TaskEngine, TaskEngineConfig};
