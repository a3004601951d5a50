// Schedule generation and maintenance for a league.

pub mod generator;
pub mod scores;

use rand::Rng;
use tracing::info;

use crate::calendar::CalendarDate;
use crate::db::{self, Database, RetireScope};
use crate::error::{EngineResult, Rejection};
use crate::league::phase::require_signup;
use crate::league::{load_league, require_league_admin};
use crate::model::{Actor, Fixture, LeagueId, TeamId};

pub use generator::{generate_fixtures, round_robin_pairs, Pacing, ScheduledFixture, KICKOFF};
pub use scores::{parse_scores, submit_score};

/// Result of a schedule generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Fixtures were created. `replaced` counts the unplayed fixtures of the
    /// previous schedule that were removed first.
    Generated { fixtures: Vec<Fixture>, replaced: usize },
    /// The league has fewer than two teams; nothing was written.
    NotEnoughTeams { teams: usize },
}

impl ScheduleOutcome {
    pub fn fixture_count(&self) -> usize {
        match self {
            ScheduleOutcome::Generated { fixtures, .. } => fixtures.len(),
            ScheduleOutcome::NotEnoughTeams { .. } => 0,
        }
    }
}

/// Generate a double round-robin for `league_id` starting on `start`.
///
/// A league without fixtures can be scheduled in either phase. Replacing an
/// existing schedule needs the signup phase and no recorded results; the old
/// unplayed fixtures are removed in the same transaction.
pub fn generate_schedule<R: Rng + ?Sized>(
    db: &Database,
    actor: &Actor,
    league_id: LeagueId,
    start: CalendarDate,
    pacing: Pacing,
    rng: &mut R,
) -> EngineResult<ScheduleOutcome> {
    pacing.validate()?;

    let outcome = db.write(|conn| {
        let league = load_league(conn, league_id)?;
        require_league_admin(&league, actor)?;

        let existing = db::count_fixtures(conn, league_id)?;
        if existing > 0 {
            require_signup(league.phase, "regenerate the schedule")?;
            if db::has_played_fixtures(conn, league_id)? {
                return Err(Rejection::ScheduleHasResults.into());
            }
        }

        let teams: Vec<TeamId> = db::list_teams(conn, league_id)?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if teams.len() < 2 {
            return Ok(ScheduleOutcome::NotEnoughTeams { teams: teams.len() });
        }

        let planned = generate_fixtures(&teams, start, pacing, rng)?;

        let mut replaced = 0;
        if existing > 0 {
            db::retire_sync_records(conn, RetireScope::UnplayedInLeague(league_id))?;
            replaced = db::delete_unplayed_fixtures(conn, league_id)?;
        }

        let mut fixtures = Vec::with_capacity(planned.len());
        for p in planned {
            let id = db::insert_fixture(conn, league_id, p.home, p.away, p.kickoff)?;
            fixtures.push(Fixture {
                id,
                league_id,
                home_team_id: p.home,
                away_team_id: p.away,
                kickoff: p.kickoff,
                score: None,
            });
        }
        Ok(ScheduleOutcome::Generated { fixtures, replaced })
    })?;

    match &outcome {
        ScheduleOutcome::Generated { fixtures, replaced } => info!(
            league_id,
            fixtures = fixtures.len(),
            replaced,
            "Schedule generated from {}",
            start
        ),
        ScheduleOutcome::NotEnoughTeams { teams } => {
            info!(league_id, teams, "Schedule not generated: fewer than two teams")
        }
    }
    Ok(outcome)
}

/// Remove every unplayed fixture of a signup-phase league. Refused once any
/// result has been recorded. Returns the number of fixtures removed.
pub fn clear_schedule(db: &Database, actor: &Actor, league_id: LeagueId) -> EngineResult<usize> {
    let removed = db.write(|conn| {
        let league = load_league(conn, league_id)?;
        require_league_admin(&league, actor)?;
        require_signup(league.phase, "clear the schedule")?;
        if db::has_played_fixtures(conn, league_id)? {
            return Err(Rejection::ScheduleHasResults.into());
        }
        db::retire_sync_records(conn, RetireScope::UnplayedInLeague(league_id))?;
        Ok(db::delete_unplayed_fixtures(conn, league_id)?)
    })?;

    info!(league_id, removed, "Schedule cleared");
    Ok(removed)
}

/// All fixtures of a league in kickoff order.
pub fn league_schedule(db: &Database, league_id: LeagueId) -> EngineResult<Vec<Fixture>> {
    db.read(|conn| {
        load_league(conn, league_id)?;
        Ok(db::list_fixtures(conn, league_id)?)
    })
}
