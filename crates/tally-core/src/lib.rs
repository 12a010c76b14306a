//! Core types and logic for the Tally vote warehouse.
//!
//! Validation, JSON-lines reading and coercion, weekly bucketing and outlier
//! arithmetic live here, free of any database dependency. Storage backends
//! implement [`store::VoteStore`]; [`pipeline`] drives them.

pub mod config;
pub mod dedup;
pub mod error;
pub mod outlier;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod validate;
pub mod vote;
pub mod week;

pub use config::WarehouseConfig;
pub use error::{Error, Result};
