//! SQLite implementations of the domain's Store ports.

pub mod item_repository;
pub mod media_repository;
pub mod mission_repository;

pub use item_repository::SqliteItemRepository;
pub use media_repository::SqliteMediaRepository;
pub use mission_repository::SqliteMissionRepository;
