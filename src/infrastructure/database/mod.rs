//! The Store (§4.1, §C1): SQLite connection management, schema migrations, and the
//! concrete repository implementations behind the domain's `MissionRepository` /
//! `ItemRepository` / `MediaRepository` ports.

pub mod connection;
pub mod migrations;
pub mod sqlite;
pub mod utils;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, MigrationError, Migrator};
