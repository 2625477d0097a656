//! Concrete implementations of the domain's `PlatformAdapter` port (§4.2, §C2).
//!
//! A real provider adapter (one HTTP client per generative-media vendor) would live
//! here alongside [`mock::MockAdapter`] as an additional implementation of the same
//! trait; none ships in this crate (§1 scope).

pub mod mock;

pub use mock::MockAdapter;
