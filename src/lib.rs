//! Spaced-repetition scheduling and learner performance tracking.
//!
//! [`scheduler`] and [`aggregator`] are pure; [`service::SchedulingService`]
//! applies them against a [`store::ReviewRecordStore`], with [`db::Database`]
//! as the SQLite-backed store.

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod store;

pub use error::{Result, SchedError};
pub use service::{ReviewResult, SchedulingService};
