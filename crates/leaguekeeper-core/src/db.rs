// SQLite persistence layer for leagues, teams, rosters, fixtures and sync
// bookkeeping.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::EngineResult;
use crate::model::{
    Fixture, FixtureId, League, LeagueId, Membership, NewLeague, Phase, RetiredSyncEvent, Role,
    RosterEntry, Score, SyncRecord, Team, TeamId, User, UserId, DATETIME_FORMAT,
};

/// SQLite-backed store. All access goes through one connection guarded by a
/// mutex, so every engine operation observes and mutates a consistent state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                username     TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                role         TEXT NOT NULL DEFAULT 'user'
            );

            CREATE TABLE IF NOT EXISTS leagues (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                name      TEXT NOT NULL UNIQUE,
                sport     TEXT NOT NULL,
                max_teams INTEGER NOT NULL CHECK (max_teams > 0),
                phase     TEXT NOT NULL DEFAULT 'signup' CHECK (phase IN ('signup', 'active')),
                admin_id  INTEGER REFERENCES users(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS teams (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id  INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
                name       TEXT NOT NULL,
                manager_id INTEGER NOT NULL REFERENCES users(id),
                UNIQUE(league_id, name)
            );

            CREATE TABLE IF NOT EXISTS memberships (
                user_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                team_id   INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                league_id INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, league_id)
            );

            CREATE TABLE IF NOT EXISTS games (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id    INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
                home_team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                away_team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                game_date    TEXT NOT NULL,
                home_score   INTEGER CHECK (home_score >= 0),
                away_score   INTEGER CHECK (away_score >= 0),
                CHECK (home_team_id <> away_team_id),
                CHECK ((home_score IS NULL) = (away_score IS NULL))
            );

            CREATE TABLE IF NOT EXISTS sync_records (
                game_id   INTEGER PRIMARY KEY REFERENCES games(id) ON DELETE CASCADE,
                event_id  TEXT NOT NULL,
                synced_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS retired_sync_events (
                event_id   TEXT PRIMARY KEY,
                retired_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            ",
        )
        .context("failed to create database schema")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_games_league_date ON games(league_id, game_date);
             CREATE INDEX IF NOT EXISTS idx_memberships_team ON memberships(team_id);",
        )
        .context("failed to create indexes")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Run `f` inside a write transaction. The transaction commits only when
    /// `f` returns `Ok`; any error rolls back every write made by `f`.
    pub fn write<T>(&self, f: impl FnOnce(&Connection) -> EngineResult<T>) -> EngineResult<T> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin write transaction")?;
        let out = f(&*tx)?;
        tx.commit().context("failed to commit write transaction")?;
        Ok(out)
    }

    /// Run `f` against a single read snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> EngineResult<T>) -> EngineResult<T> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin read transaction")?;
        let out = f(&*tx)?;
        tx.finish().context("failed to finish read transaction")?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::from_db(&role),
    })
}

fn league_from_row(row: &Row<'_>) -> rusqlite::Result<League> {
    let phase: String = row.get(4)?;
    let phase = phase.parse::<Phase>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into())
    })?;
    Ok(League {
        id: row.get(0)?,
        name: row.get(1)?,
        sport: row.get(2)?,
        max_teams: row.get(3)?,
        phase,
        admin_id: row.get(5)?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        league_id: row.get(1)?,
        name: row.get(2)?,
        manager_id: row.get(3)?,
    })
}

fn fixture_from_row(row: &Row<'_>) -> rusqlite::Result<Fixture> {
    let raw_date: String = row.get(4)?;
    let kickoff = NaiveDateTime::parse_from_str(&raw_date, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let home: Option<u32> = row.get(5)?;
    let away: Option<u32> = row.get(6)?;
    let score = match (home, away) {
        (Some(home), Some(away)) => Some(Score { home, away }),
        _ => None,
    };
    Ok(Fixture {
        id: row.get(0)?,
        league_id: row.get(1)?,
        home_team_id: row.get(2)?,
        away_team_id: row.get(3)?,
        kickoff,
        score,
    })
}

const USER_COLUMNS: &str = "id, username, display_name, role";
const LEAGUE_COLUMNS: &str = "id, name, sport, max_teams, phase, admin_id";
const TEAM_COLUMNS: &str = "id, league_id, name, manager_id";
const FIXTURE_COLUMNS: &str =
    "id, league_id, home_team_id, away_team_id, game_date, home_score, away_score";

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub(crate) fn insert_user(
    conn: &Connection,
    username: &str,
    display_name: &str,
    role: Role,
) -> Result<UserId> {
    conn.execute(
        "INSERT INTO users (username, display_name, role) VALUES (?1, ?2, ?3)",
        params![username, display_name, role.as_str()],
    )
    .context("failed to insert user")?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()
    .context("failed to load user")
}

pub(crate) fn find_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        user_from_row,
    )
    .optional()
    .context("failed to look up user by username")
}

// ---------------------------------------------------------------------------
// Leagues
// ---------------------------------------------------------------------------

pub(crate) fn insert_league(
    conn: &Connection,
    league: &NewLeague,
    admin_id: UserId,
) -> Result<LeagueId> {
    conn.execute(
        "INSERT INTO leagues (name, sport, max_teams, phase, admin_id)
         VALUES (?1, ?2, ?3, 'signup', ?4)",
        params![league.name, league.sport, league.max_teams, admin_id],
    )
    .context("failed to insert league")?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_league(conn: &Connection, id: LeagueId) -> Result<Option<League>> {
    conn.query_row(
        &format!("SELECT {LEAGUE_COLUMNS} FROM leagues WHERE id = ?1"),
        params![id],
        league_from_row,
    )
    .optional()
    .context("failed to load league")
}

pub(crate) fn league_name_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM leagues WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )
    .context("failed to check league name")
}

pub(crate) fn list_leagues(conn: &Connection) -> Result<Vec<League>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {LEAGUE_COLUMNS} FROM leagues ORDER BY id"))
        .context("failed to prepare list_leagues query")?;
    let leagues = stmt
        .query_map([], league_from_row)
        .context("failed to query leagues")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map league rows")?;
    Ok(leagues)
}

/// Signup-phase leagues with at least one open team slot, optionally
/// restricted to one sport.
pub(crate) fn list_open_leagues(conn: &Connection, sport: Option<&str>) -> Result<Vec<League>> {
    let mut stmt = conn
        .prepare(
            "SELECT l.id, l.name, l.sport, l.max_teams, l.phase, l.admin_id
             FROM leagues l
             WHERE l.phase = 'signup'
               AND (?1 IS NULL OR l.sport = ?1 COLLATE NOCASE)
               AND (SELECT COUNT(*) FROM teams t WHERE t.league_id = l.id) < l.max_teams
             ORDER BY l.name",
        )
        .context("failed to prepare list_open_leagues query")?;
    let leagues = stmt
        .query_map(params![sport], league_from_row)
        .context("failed to query open leagues")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map league rows")?;
    Ok(leagues)
}

pub(crate) fn set_league_phase(conn: &Connection, id: LeagueId, phase: Phase) -> Result<()> {
    conn.execute(
        "UPDATE leagues SET phase = ?1 WHERE id = ?2",
        params![phase.as_str(), id],
    )
    .context("failed to update league phase")?;
    Ok(())
}

pub(crate) fn delete_league(conn: &Connection, id: LeagueId) -> Result<usize> {
    conn.execute("DELETE FROM leagues WHERE id = ?1", params![id])
        .context("failed to delete league")
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

pub(crate) fn insert_team(
    conn: &Connection,
    league_id: LeagueId,
    name: &str,
    manager_id: UserId,
) -> Result<TeamId> {
    conn.execute(
        "INSERT INTO teams (league_id, name, manager_id) VALUES (?1, ?2, ?3)",
        params![league_id, name, manager_id],
    )
    .context("failed to insert team")?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_team(conn: &Connection, id: TeamId) -> Result<Option<Team>> {
    conn.query_row(
        &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1"),
        params![id],
        team_from_row,
    )
    .optional()
    .context("failed to load team")
}

pub(crate) fn team_name_exists(conn: &Connection, league_id: LeagueId, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM teams WHERE league_id = ?1 AND name = ?2 COLLATE NOCASE)",
        params![league_id, name],
        |row| row.get(0),
    )
    .context("failed to check team name")
}

pub(crate) fn count_teams(conn: &Connection, league_id: LeagueId) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM teams WHERE league_id = ?1",
            params![league_id],
            |row| row.get(0),
        )
        .context("failed to count teams")?;
    Ok(count as usize)
}

/// Teams of a league in creation order.
pub(crate) fn list_teams(conn: &Connection, league_id: LeagueId) -> Result<Vec<Team>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE league_id = ?1 ORDER BY id"
        ))
        .context("failed to prepare list_teams query")?;
    let teams = stmt
        .query_map(params![league_id], team_from_row)
        .context("failed to query teams")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map team rows")?;
    Ok(teams)
}

pub(crate) fn delete_team(conn: &Connection, id: TeamId) -> Result<usize> {
    conn.execute("DELETE FROM teams WHERE id = ?1", params![id])
        .context("failed to delete team")
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

pub(crate) fn insert_membership(conn: &Connection, membership: &Membership) -> Result<()> {
    conn.execute(
        "INSERT INTO memberships (user_id, team_id, league_id) VALUES (?1, ?2, ?3)",
        params![membership.user_id, membership.team_id, membership.league_id],
    )
    .context("failed to insert membership")?;
    Ok(())
}

pub(crate) fn find_membership_in_league(
    conn: &Connection,
    user_id: UserId,
    league_id: LeagueId,
) -> Result<Option<Membership>> {
    conn.query_row(
        "SELECT user_id, team_id, league_id FROM memberships
         WHERE user_id = ?1 AND league_id = ?2",
        params![user_id, league_id],
        |row| {
            Ok(Membership {
                user_id: row.get(0)?,
                team_id: row.get(1)?,
                league_id: row.get(2)?,
            })
        },
    )
    .optional()
    .context("failed to load membership")
}

pub(crate) fn delete_membership(conn: &Connection, user_id: UserId, team_id: TeamId) -> Result<usize> {
    conn.execute(
        "DELETE FROM memberships WHERE user_id = ?1 AND team_id = ?2",
        params![user_id, team_id],
    )
    .context("failed to delete membership")
}

pub(crate) fn count_memberships_for_team(conn: &Connection, team_id: TeamId) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM memberships WHERE team_id = ?1",
            params![team_id],
            |row| row.get(0),
        )
        .context("failed to count memberships")?;
    Ok(count as usize)
}

pub(crate) fn roster(conn: &Connection, team_id: TeamId) -> Result<Vec<RosterEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT u.id, u.username, u.display_name
             FROM memberships m JOIN users u ON u.id = m.user_id
             WHERE m.team_id = ?1
             ORDER BY u.display_name COLLATE NOCASE, u.id",
        )
        .context("failed to prepare roster query")?;
    let entries = stmt
        .query_map(params![team_id], |row| {
            Ok(RosterEntry {
                user_id: row.get(0)?,
                username: row.get(1)?,
                display_name: row.get(2)?,
            })
        })
        .context("failed to query roster")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map roster rows")?;
    Ok(entries)
}

pub(crate) fn teams_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<Team>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.league_id, t.name, t.manager_id
             FROM memberships m JOIN teams t ON t.id = m.team_id
             WHERE m.user_id = ?1
             ORDER BY t.league_id, t.id",
        )
        .context("failed to prepare teams_for_user query")?;
    let teams = stmt
        .query_map(params![user_id], team_from_row)
        .context("failed to query user teams")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map team rows")?;
    Ok(teams)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn insert_fixture(
    conn: &Connection,
    league_id: LeagueId,
    home_team_id: TeamId,
    away_team_id: TeamId,
    kickoff: NaiveDateTime,
) -> Result<FixtureId> {
    conn.execute(
        "INSERT INTO games (league_id, home_team_id, away_team_id, game_date, home_score, away_score)
         VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
        params![
            league_id,
            home_team_id,
            away_team_id,
            kickoff.format(DATETIME_FORMAT).to_string()
        ],
    )
    .context("failed to insert fixture")?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_fixture(conn: &Connection, id: FixtureId) -> Result<Option<Fixture>> {
    conn.query_row(
        &format!("SELECT {FIXTURE_COLUMNS} FROM games WHERE id = ?1"),
        params![id],
        fixture_from_row,
    )
    .optional()
    .context("failed to load fixture")
}

/// Fixtures of a league ordered by kickoff, then by creation order.
pub(crate) fn list_fixtures(conn: &Connection, league_id: LeagueId) -> Result<Vec<Fixture>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {FIXTURE_COLUMNS} FROM games WHERE league_id = ?1 ORDER BY game_date, id"
        ))
        .context("failed to prepare list_fixtures query")?;
    let fixtures = stmt
        .query_map(params![league_id], fixture_from_row)
        .context("failed to query fixtures")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map fixture rows")?;
    Ok(fixtures)
}

/// Completed fixtures of a league (both scores recorded).
pub(crate) fn list_played_fixtures(conn: &Connection, league_id: LeagueId) -> Result<Vec<Fixture>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {FIXTURE_COLUMNS} FROM games
             WHERE league_id = ?1 AND home_score IS NOT NULL AND away_score IS NOT NULL
             ORDER BY id"
        ))
        .context("failed to prepare list_played_fixtures query")?;
    let fixtures = stmt
        .query_map(params![league_id], fixture_from_row)
        .context("failed to query played fixtures")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map fixture rows")?;
    Ok(fixtures)
}

pub(crate) fn count_fixtures(conn: &Connection, league_id: LeagueId) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM games WHERE league_id = ?1",
            params![league_id],
            |row| row.get(0),
        )
        .context("failed to count fixtures")?;
    Ok(count as usize)
}

pub(crate) fn has_played_fixtures(conn: &Connection, league_id: LeagueId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM games WHERE league_id = ?1 AND home_score IS NOT NULL)",
        params![league_id],
        |row| row.get(0),
    )
    .context("failed to check for played fixtures")
}

pub(crate) fn team_has_played_fixtures(conn: &Connection, team_id: TeamId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM games
                       WHERE (home_team_id = ?1 OR away_team_id = ?1) AND home_score IS NOT NULL)",
        params![team_id],
        |row| row.get(0),
    )
    .context("failed to check team results")
}

pub(crate) fn set_fixture_score(conn: &Connection, id: FixtureId, score: Score) -> Result<usize> {
    conn.execute(
        "UPDATE games SET home_score = ?1, away_score = ?2 WHERE id = ?3",
        params![score.home, score.away, id],
    )
    .context("failed to record score")
}

pub(crate) fn delete_unplayed_fixtures(conn: &Connection, league_id: LeagueId) -> Result<usize> {
    conn.execute(
        "DELETE FROM games WHERE league_id = ?1 AND home_score IS NULL",
        params![league_id],
    )
    .context("failed to delete unplayed fixtures")
}

/// Fixtures with kickoff in `[from, until)` that have no sync record yet.
pub(crate) fn unsynced_fixtures_between(
    conn: &Connection,
    from: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<Fixture>> {
    let mut stmt = conn
        .prepare(
            "SELECT g.id, g.league_id, g.home_team_id, g.away_team_id, g.game_date,
                    g.home_score, g.away_score
             FROM games g LEFT JOIN sync_records s ON s.game_id = g.id
             WHERE s.game_id IS NULL AND g.game_date >= ?1 AND g.game_date < ?2
             ORDER BY g.game_date, g.id",
        )
        .context("failed to prepare unsynced fixture query")?;
    let fixtures = stmt
        .query_map(
            params![
                from.format(DATETIME_FORMAT).to_string(),
                until.format(DATETIME_FORMAT).to_string()
            ],
            fixture_from_row,
        )
        .context("failed to query unsynced fixtures")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map fixture rows")?;
    Ok(fixtures)
}

// ---------------------------------------------------------------------------
// Sync records
// ---------------------------------------------------------------------------

pub(crate) fn find_sync_record(conn: &Connection, fixture_id: FixtureId) -> Result<Option<SyncRecord>> {
    conn.query_row(
        "SELECT game_id, event_id FROM sync_records WHERE game_id = ?1",
        params![fixture_id],
        |row| {
            Ok(SyncRecord {
                fixture_id: row.get(0)?,
                event_id: row.get(1)?,
            })
        },
    )
    .optional()
    .context("failed to load sync record")
}

/// Insert a sync record. Returns `false` when one already exists for the
/// fixture (the existing record wins).
pub(crate) fn insert_sync_record(conn: &Connection, record: &SyncRecord) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO sync_records (game_id, event_id) VALUES (?1, ?2)",
            params![record.fixture_id, record.event_id],
        )
        .context("failed to insert sync record")?;
    Ok(inserted == 1)
}

pub(crate) fn delete_sync_record(conn: &Connection, fixture_id: FixtureId) -> Result<usize> {
    conn.execute(
        "DELETE FROM sync_records WHERE game_id = ?1",
        params![fixture_id],
    )
    .context("failed to delete sync record")
}

pub(crate) fn count_sync_records(conn: &Connection) -> Result<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM sync_records", [], |row| row.get(0))
        .context("failed to count sync records")?;
    Ok(count as usize)
}

/// Which fixtures are about to be deleted, for retiring their sync records.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RetireScope {
    League(LeagueId),
    Team(TeamId),
    UnplayedInLeague(LeagueId),
}

/// Move the external event ids of fixtures in `scope` into the retired set so
/// the ledger can delete them externally after the local delete commits.
pub(crate) fn retire_sync_records(conn: &Connection, scope: RetireScope) -> Result<usize> {
    let (filter, id) = match scope {
        RetireScope::League(id) => ("g.league_id = ?1", id),
        RetireScope::Team(id) => ("(g.home_team_id = ?1 OR g.away_team_id = ?1)", id),
        RetireScope::UnplayedInLeague(id) => ("g.league_id = ?1 AND g.home_score IS NULL", id),
    };
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO retired_sync_events (event_id)
             SELECT s.event_id FROM sync_records s JOIN games g ON g.id = s.game_id
             WHERE {filter}"
        ),
        params![id],
    )
    .context("failed to retire sync records")
}

/// Retire a single external event id, e.g. one pushed for a fixture that was
/// deleted before its sync record could be written.
pub(crate) fn retire_event(conn: &Connection, event_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO retired_sync_events (event_id) VALUES (?1)",
        params![event_id],
    )
    .context("failed to retire event")?;
    Ok(())
}

pub(crate) fn list_retired_events(conn: &Connection) -> Result<Vec<RetiredSyncEvent>> {
    let mut stmt = conn
        .prepare("SELECT event_id, retired_at FROM retired_sync_events ORDER BY retired_at, event_id")
        .context("failed to prepare retired events query")?;
    let events = stmt
        .query_map([], |row| {
            Ok(RetiredSyncEvent {
                event_id: row.get(0)?,
                retired_at: row.get(1)?,
            })
        })
        .context("failed to query retired events")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map retired event rows")?;
    Ok(events)
}

pub(crate) fn delete_retired_event(conn: &Connection, event_id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM retired_sync_events WHERE event_id = ?1",
        params![event_id],
    )
    .context("failed to delete retired event")
}
