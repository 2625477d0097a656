//! Domain models.
//!
//! Pure domain entities with business logic and validation rules. These models are
//! framework-agnostic and contain no infrastructure concerns.

pub mod item;
pub mod media;
pub mod mission;
pub mod params;

pub use item::{Item, ItemStatus, BASE_RETRY_DELAY_SECS, MAX_RETRY, MAX_RETRY_DELAY_SECS};
pub use media::MediaRecord;
pub use mission::{Mission, MissionStatus, TaskKind};
pub use params::{ParamMap, ParamValue};
