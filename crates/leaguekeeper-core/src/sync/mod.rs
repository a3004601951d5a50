// Mirrors fixtures into an external calendar and remembers what was pushed.
//
// The ledger owns the mapping fixture -> external event id. It never holds
// the database lock across an await: each step reads or writes in its own
// short transaction, and concurrent work on the same fixture is excluded by
// an in-flight claim set instead.

pub mod backend;
pub mod retry;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, NaiveTime};
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calendar::CalendarDate;
use crate::db::{self, Database};
use crate::error::{EngineError, EngineResult, Entity, Rejection};
use crate::model::{Fixture, FixtureId, SyncRecord};

pub use backend::{BackendError, CalendarBackend, CalendarEvent, DeleteOutcome};
pub use retry::RetryPolicy;

/// How long a published fixture occupies in the calendar.
const EVENT_LENGTH_HOURS: i64 = 2;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] EngineError),

    #[error("sync pass incomplete: {failed} of {attempted} calendar operations failed")]
    Incomplete { attempted: usize, failed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Pushed { event_id: String },
    AlreadySynced { event_id: String },
    /// The fixture no longer exists; nothing was pushed.
    Missing,
    /// The fixture was deleted while its push was in flight. The event is
    /// queued for deletion by the next `flush_retired`.
    Orphaned { event_id: String },
    /// Another task is working on this fixture right now.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsyncResult {
    Removed(DeleteOutcome),
    NotSynced,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Number of fixtures newly recorded as synced in this pass.
    Synced(usize),
    NothingToDo,
}

/// Removes its fixture id from the in-flight set when dropped.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<FixtureId>>,
    fixture_id: FixtureId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.fixture_id);
        }
    }
}

pub struct SyncLedger {
    db: Arc<Database>,
    backend: Arc<dyn CalendarBackend>,
    window_days: u32,
    in_flight: Mutex<HashSet<FixtureId>>,
}

impl SyncLedger {
    pub fn new(db: Arc<Database>, backend: Arc<dyn CalendarBackend>, window_days: u32) -> Self {
        Self {
            db,
            backend,
            window_days,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    fn claim(&self, fixture_id: FixtureId) -> Option<Claim<'_>> {
        let mut set = self.in_flight.lock().expect("in-flight set poisoned");
        if !set.insert(fixture_id) {
            return None;
        }
        Some(Claim {
            in_flight: &self.in_flight,
            fixture_id,
        })
    }

    /// Publish one fixture unless it already has a sync record.
    pub async fn sync(&self, fixture_id: FixtureId) -> Result<SyncResult, SyncError> {
        let Some(_claim) = self.claim(fixture_id) else {
            debug!(fixture_id, "Fixture already being synced, skipping");
            return Ok(SyncResult::Busy);
        };

        let prepared = self.db.read(|conn| {
            if let Some(record) = db::find_sync_record(conn, fixture_id)? {
                return Ok(Err(SyncResult::AlreadySynced {
                    event_id: record.event_id,
                }));
            }
            match db::find_fixture(conn, fixture_id)? {
                Some(fixture) => Ok(Ok(event_for(conn, &fixture)?)),
                None => Ok(Err(SyncResult::Missing)),
            }
        })?;
        let event = match prepared {
            Ok(event) => event,
            Err(SyncResult::Missing) => {
                debug!(fixture_id, "Fixture no longer exists, nothing to push");
                return Ok(SyncResult::Missing);
            }
            Err(done) => return Ok(done),
        };

        let event_id = match self.backend.push_event(&event).await {
            Ok(id) => id,
            Err(e) => {
                warn!(fixture_id, "Calendar push failed: {}", e);
                return Err(e.into());
            }
        };

        // The fixture may have been deleted while the push was in flight; its
        // event is then retired instead of recorded.
        let recorded = self.db.write(|conn| {
            if db::find_fixture(conn, fixture_id)?.is_none() {
                db::retire_event(conn, &event_id)?;
                return Ok(false);
            }
            let record = SyncRecord {
                fixture_id,
                event_id: event_id.clone(),
            };
            if !db::insert_sync_record(conn, &record)? {
                db::retire_event(conn, &event_id)?;
                return Ok(false);
            }
            Ok(true)
        })?;

        if !recorded {
            warn!(fixture_id, "Fixture vanished during push; event {} retired", event_id);
            return Ok(SyncResult::Orphaned { event_id });
        }
        info!(fixture_id, "Fixture pushed to calendar as {}", event_id);
        Ok(SyncResult::Pushed { event_id })
    }

    /// Remove a fixture's external event and its sync record. The record is
    /// kept when the external delete fails so a later call can retry.
    pub async fn unsync(&self, fixture_id: FixtureId) -> Result<UnsyncResult, SyncError> {
        let Some(_claim) = self.claim(fixture_id) else {
            return Ok(UnsyncResult::Busy);
        };

        let Some(record) = self.db.read(|conn| Ok(db::find_sync_record(conn, fixture_id)?))? else {
            return Ok(UnsyncResult::NotSynced);
        };

        let outcome = match self.backend.delete_event(&record.event_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(fixture_id, "Calendar delete of {} failed: {}", record.event_id, e);
                return Err(e.into());
            }
        };

        self.db
            .write(|conn| Ok(db::delete_sync_record(conn, fixture_id)?))?;
        info!(fixture_id, "Calendar event {} removed ({:?})", record.event_id, outcome);
        Ok(UnsyncResult::Removed(outcome))
    }

    /// Delete external events whose fixtures no longer exist. Returns
    /// `(deleted, failed)`; failed entries stay queued for the next pass.
    pub async fn flush_retired(&self) -> Result<(usize, usize), SyncError> {
        let retired = self.db.read(|conn| Ok(db::list_retired_events(conn)?))?;

        let mut deleted = 0;
        let mut failed = 0;
        for event in retired {
            match self.backend.delete_event(&event.event_id).await {
                Ok(outcome) => {
                    self.db
                        .write(|conn| Ok(db::delete_retired_event(conn, &event.event_id)?))?;
                    debug!("Retired event {} removed ({:?})", event.event_id, outcome);
                    deleted += 1;
                }
                Err(e) => {
                    warn!("Could not delete retired event {}: {}", event.event_id, e);
                    failed += 1;
                }
            }
        }
        Ok((deleted, failed))
    }

    /// One sync pass: flush retired events, then push every unsynced fixture
    /// kicking off between `today` and `today + window_days` inclusive.
    ///
    /// Fixtures that fail are left unsynced and reported through
    /// `SyncError::Incomplete` after the rest of the pass has run.
    pub async fn sync_window(&self, today: CalendarDate) -> Result<SyncOutcome, SyncError> {
        let (flushed, mut failed) = self.flush_retired().await?;
        let mut attempted = flushed + failed;

        let from = today.to_naive().and_time(NaiveTime::MIN);
        let until = today
            .plus_days(self.window_days.saturating_add(1))
            .map_err(|e| EngineError::from(Rejection::from(e)))?
            .to_naive()
            .and_time(NaiveTime::MIN);
        let due = self
            .db
            .read(|conn| Ok(db::unsynced_fixtures_between(conn, from, until)?))?;

        let mut pushed = 0;
        for fixture in due {
            attempted += 1;
            match self.sync(fixture.id).await {
                Ok(SyncResult::Pushed { .. }) => pushed += 1,
                // Deleted since the window was read; its event, if any, is
                // retired and flushed next pass.
                Ok(SyncResult::Missing | SyncResult::Orphaned { .. }) => {}
                Ok(SyncResult::AlreadySynced { .. } | SyncResult::Busy) => {}
                Err(SyncError::Backend(_)) => failed += 1,
                Err(e) => return Err(e),
            }
        }

        if failed > 0 {
            return Err(SyncError::Incomplete { attempted, failed });
        }
        if pushed == 0 {
            debug!(flushed, "Sync pass found nothing to push");
            return Ok(SyncOutcome::NothingToDo);
        }
        info!(pushed, flushed, "Sync pass complete");
        Ok(SyncOutcome::Synced(pushed))
    }

    pub fn synced_count(&self) -> EngineResult<usize> {
        self.db.read(|conn| Ok(db::count_sync_records(conn)?))
    }
}

fn event_for(conn: &Connection, fixture: &Fixture) -> EngineResult<CalendarEvent> {
    let team_name = |id| -> EngineResult<String> {
        Ok(db::find_team(conn, id)?
            .ok_or(EngineError::NotFound(Entity::Team, id))?
            .name)
    };
    let title = format!(
        "{} vs {}",
        team_name(fixture.home_team_id)?,
        team_name(fixture.away_team_id)?
    );
    Ok(CalendarEvent {
        fixture_id: fixture.id,
        league_id: fixture.league_id,
        title,
        starts_at: fixture.kickoff,
        ends_at: fixture.kickoff + ChronoDuration::hours(EVENT_LENGTH_HOURS),
    })
}
