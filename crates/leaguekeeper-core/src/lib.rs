// Library root: league lifecycle, scheduling, standings and calendar sync
// over a SQLite store.

pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod league;
pub mod model;
pub mod schedule;
pub mod standings;
pub mod sync;

pub use db::Database;
pub use error::{EngineError, EngineResult, Entity, Rejection};
