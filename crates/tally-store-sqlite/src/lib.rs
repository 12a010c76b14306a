//! SQLite backend for the Tally vote warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Deduplication, upsert and the outlier
//! view are expressed as set-based SQL against the attached warehouse file.

mod encode;
mod functions;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
