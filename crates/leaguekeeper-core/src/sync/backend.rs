// The seam between the sync ledger and an external calendar service.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FixtureId, LeagueId};

/// What gets published for one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub fixture_id: FixtureId,
    pub league_id: LeagueId,
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The service no longer knows the event. Treated the same as a delete.
    AlreadyGone,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("calendar request failed: {0}")]
    Transport(String),

    #[error("calendar service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected calendar response: {0}")]
    Malformed(String),
}

/// An external calendar that fixtures are mirrored into.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Create an event and return its external id.
    async fn push_event(&self, event: &CalendarEvent) -> Result<String, BackendError>;

    async fn delete_event(&self, event_id: &str) -> Result<DeleteOutcome, BackendError>;
}
