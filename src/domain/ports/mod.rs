//! Domain ports: the interfaces the core depends on (Store, Platform Adapter).

pub mod adapter;
pub mod store;

pub use adapter::{PlatformAdapter, QueryOutcome, RemoteJobStatus, SubmitOutcome};
pub use store::{
    ItemRepository, MediaRepository, MissionPage, MissionRepository, NewItem, NewMission,
};
