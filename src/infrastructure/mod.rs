//! Infrastructure layer: configuration, logging, and the SQLite-backed Store.

pub mod config;
pub mod database;
pub mod logging;
