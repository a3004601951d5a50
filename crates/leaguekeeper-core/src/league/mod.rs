// League lifecycle: creation, phase changes, team management and deletion.
//
// Every mutating operation runs as one write transaction: the league is
// loaded, every guard is checked, and only then is anything written. A
// failed guard rolls back the whole transaction.

pub mod phase;
pub mod roster;

use rusqlite::Connection;
use tracing::info;

use crate::db::{self, Database, RetireScope};
use crate::error::{EngineError, EngineResult, Entity, Rejection};
use crate::model::{Actor, League, LeagueId, NewLeague, Phase, Role, Team, TeamId, User, UserId};

use phase::{require_signup, Transition};

const MIN_USERNAME_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Shared loaders and guards
// ---------------------------------------------------------------------------

pub(crate) fn load_league(conn: &Connection, id: LeagueId) -> EngineResult<League> {
    db::find_league(conn, id)?.ok_or(EngineError::NotFound(Entity::League, id))
}

pub(crate) fn load_team(conn: &Connection, id: TeamId) -> EngineResult<Team> {
    db::find_team(conn, id)?.ok_or(EngineError::NotFound(Entity::Team, id))
}

pub(crate) fn load_user(conn: &Connection, id: UserId) -> EngineResult<User> {
    db::find_user(conn, id)?.ok_or(EngineError::NotFound(Entity::User, id))
}

pub(crate) fn require_league_admin(league: &League, actor: &Actor) -> EngineResult<()> {
    if league.is_administered_by(actor) {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "only the administrator of `{}` can do that",
            league.name
        )))
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, Rejection> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Rejection::InvalidInput {
            field,
            message: "must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Register a user. Usernames are unique and at least three characters.
pub fn create_user(db: &Database, username: &str, display_name: &str, role: Role) -> EngineResult<User> {
    let username = non_empty("username", username)?;
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(Rejection::InvalidInput {
            field: "username",
            message: format!("must be at least {MIN_USERNAME_LEN} characters"),
        }
        .into());
    }
    let display_name = match display_name.trim() {
        "" => username.clone(),
        name => name.to_string(),
    };

    db.write(|conn| {
        if db::find_user_by_username(conn, &username)?.is_some() {
            return Err(Rejection::DuplicateUsername(username.clone()).into());
        }
        let id = db::insert_user(conn, &username, &display_name, role)?;
        Ok(User {
            id,
            username: username.clone(),
            display_name: display_name.clone(),
            role,
        })
    })
}

pub fn find_user_by_username(db: &Database, username: &str) -> EngineResult<Option<User>> {
    db.read(|conn| Ok(db::find_user_by_username(conn, username.trim())?))
}

// ---------------------------------------------------------------------------
// Leagues
// ---------------------------------------------------------------------------

/// Create a league in the signup phase, administered by `actor`.
pub fn create_league(db: &Database, actor: &Actor, new: NewLeague) -> EngineResult<League> {
    let name = non_empty("league name", &new.name)?;
    let sport = non_empty("sport", &new.sport)?;
    if new.max_teams == 0 {
        return Err(Rejection::InvalidInput {
            field: "max_teams",
            message: "must be greater than 0".into(),
        }
        .into());
    }
    let new = NewLeague {
        name,
        sport,
        max_teams: new.max_teams,
    };

    let league = db.write(|conn| {
        load_user(conn, actor.user_id)?;
        if db::league_name_exists(conn, &new.name)? {
            return Err(Rejection::DuplicateLeagueName(new.name.clone()).into());
        }
        let id = db::insert_league(conn, &new, actor.user_id)?;
        load_league(conn, id)
    })?;

    info!(
        league_id = league.id,
        "League created: {} ({}, max {} teams)", league.name, league.sport, league.max_teams
    );
    Ok(league)
}

pub fn get_league(db: &Database, id: LeagueId) -> EngineResult<League> {
    db.read(|conn| load_league(conn, id))
}

pub fn list_leagues(db: &Database) -> EngineResult<Vec<League>> {
    db.read(|conn| Ok(db::list_leagues(conn)?))
}

/// Leagues a player can still join: signup phase with open team slots,
/// optionally filtered by sport. Active leagues never appear.
pub fn joinable_leagues(db: &Database, sport: Option<&str>) -> EngineResult<Vec<League>> {
    let sport = sport.map(str::trim).filter(|s| !s.is_empty());
    db.read(|conn| Ok(db::list_open_leagues(conn, sport)?))
}

/// Move a league to `target`. Activation requires at least three teams;
/// returning to signup is always allowed.
pub fn change_phase(
    db: &Database,
    actor: &Actor,
    league_id: LeagueId,
    target: Phase,
) -> EngineResult<Transition> {
    let outcome = db.write(|conn| {
        let league = load_league(conn, league_id)?;
        require_league_admin(&league, actor)?;
        let team_count = db::count_teams(conn, league_id)?;
        let outcome = phase::transition(league.phase, target, team_count)?;
        if let Transition::Changed { to, .. } = outcome {
            db::set_league_phase(conn, league_id, to)?;
        }
        Ok(outcome)
    })?;

    if let Transition::Changed { from, to } = outcome {
        info!(league_id, "League phase changed: {} -> {}", from, to);
    }
    Ok(outcome)
}

/// Delete a league and everything it owns. Only allowed during signup.
/// External calendar events of its fixtures are retired for the sync ledger.
pub fn delete_league(db: &Database, actor: &Actor, league_id: LeagueId) -> EngineResult<()> {
    let retired = db.write(|conn| {
        let league = load_league(conn, league_id)?;
        require_league_admin(&league, actor)?;
        require_signup(league.phase, "delete the league")?;
        let retired = db::retire_sync_records(conn, RetireScope::League(league_id))?;
        db::delete_league(conn, league_id)?;
        Ok(retired)
    })?;

    info!(league_id, retired_events = retired, "League deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Register a team in a signup-phase league.
///
/// Players register their own team (`manager_id == actor`); the league
/// administrator may register a team on behalf of another manager.
pub fn create_team(
    db: &Database,
    actor: &Actor,
    league_id: LeagueId,
    name: &str,
    manager_id: UserId,
) -> EngineResult<Team> {
    let name = non_empty("team name", name)?;

    let team = db.write(|conn| {
        let league = load_league(conn, league_id)?;
        if manager_id != actor.user_id {
            require_league_admin(&league, actor)?;
        }
        load_user(conn, manager_id)?;
        require_signup(league.phase, "create a team")?;
        if db::team_name_exists(conn, league_id, &name)? {
            return Err(Rejection::DuplicateTeamName(name.clone()).into());
        }
        if db::count_teams(conn, league_id)? >= league.max_teams as usize {
            return Err(Rejection::LeagueFull {
                max_teams: league.max_teams,
            }
            .into());
        }
        let id = db::insert_team(conn, league_id, &name, manager_id)?;
        load_team(conn, id)
    })?;

    info!(league_id, team_id = team.id, "Team created: {}", team.name);
    Ok(team)
}

pub fn get_team(db: &Database, id: TeamId) -> EngineResult<Team> {
    db.read(|conn| load_team(conn, id))
}

/// Teams of a league in registration order.
pub fn list_teams(db: &Database, league_id: LeagueId) -> EngineResult<Vec<Team>> {
    db.read(|conn| {
        load_league(conn, league_id)?;
        Ok(db::list_teams(conn, league_id)?)
    })
}

/// Delete a team during signup. Its memberships and unplayed fixtures go
/// with it; a team with recorded results cannot be deleted.
pub fn delete_team(db: &Database, actor: &Actor, team_id: TeamId) -> EngineResult<()> {
    let (league_id, members) = db.write(|conn| {
        let team = load_team(conn, team_id)?;
        let league = load_league(conn, team.league_id)?;
        if team.manager_id != actor.user_id {
            require_league_admin(&league, actor)?;
        }
        require_signup(league.phase, "delete a team")?;
        if db::team_has_played_fixtures(conn, team_id)? {
            return Err(Rejection::TeamHasResults.into());
        }
        let members = db::count_memberships_for_team(conn, team_id)?;
        db::retire_sync_records(conn, RetireScope::Team(team_id))?;
        db::delete_team(conn, team_id)?;
        Ok((league.id, members))
    })?;

    info!(league_id, team_id, removed_members = members, "Team deleted");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    /// Helper: a league administrator and a fresh signup league.
    pub(crate) fn league_with_admin(db: &Database) -> (Actor, League) {
        let admin = create_user(db, "testuser", "Test User", Role::User).unwrap();
        let actor = Actor::from(&admin);
        let league = create_league(
            db,
            &actor,
            NewLeague {
                name: "Test".into(),
                sport: "Soccer".into(),
                max_teams: 10,
            },
        )
        .unwrap();
        (actor, league)
    }

    pub(crate) fn add_teams(db: &Database, actor: &Actor, league: LeagueId, count: usize) -> Vec<Team> {
        (1..=count)
            .map(|i| create_team(db, actor, league, &format!("T{i}"), actor.user_id).unwrap())
            .collect()
    }

    #[test]
    fn new_league_starts_in_signup() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        assert_eq!(league.phase, Phase::Signup);
        assert_eq!(league.admin_id, Some(actor.user_id));
    }

    #[test]
    fn duplicate_league_name_rejected() {
        let db = test_db();
        let (actor, _) = league_with_admin(&db);
        let err = create_league(
            &db,
            &actor,
            NewLeague {
                name: "Test".into(),
                sport: "Hockey".into(),
                max_teams: 4,
            },
        )
        .unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::DuplicateLeagueName("Test".into()))
        );
    }

    #[test]
    fn activation_fails_below_three_teams() {
        for teams in 0..3 {
            let db = test_db();
            let (actor, league) = league_with_admin(&db);
            add_teams(&db, &actor, league.id, teams);

            let err = change_phase(&db, &actor, league.id, Phase::Active).unwrap_err();
            assert!(matches!(
                err.rejection(),
                Some(Rejection::NotEnoughTeams { .. })
            ));
            assert!(err.to_string().contains("League does not have enough teams"));
            assert_eq!(get_league(&db, league.id).unwrap().phase, Phase::Signup);
        }
    }

    #[test]
    fn activation_succeeds_with_three_teams_and_can_revert() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        add_teams(&db, &actor, league.id, 3);

        let outcome = change_phase(&db, &actor, league.id, Phase::Active).unwrap();
        assert_eq!(outcome.phase(), Phase::Active);
        assert_eq!(get_league(&db, league.id).unwrap().phase, Phase::Active);

        let outcome = change_phase(&db, &actor, league.id, Phase::Signup).unwrap();
        assert_eq!(outcome, Transition::Changed { from: Phase::Active, to: Phase::Signup });
    }

    #[test]
    fn phase_change_requires_league_admin() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        add_teams(&db, &actor, league.id, 3);
        let ethan = create_user(&db, "Ethan", "Ethan", Role::User).unwrap();

        let err = change_phase(&db, &Actor::from(&ethan), league.id, Phase::Active).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert_eq!(get_league(&db, league.id).unwrap().phase, Phase::Signup);
    }

    #[test]
    fn missing_league_is_not_found() {
        let db = test_db();
        let (actor, _) = league_with_admin(&db);
        let err = change_phase(&db, &actor, 404, Phase::Active).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn team_names_unique_within_league() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        create_team(&db, &actor, league.id, "Cheese", actor.user_id).unwrap();
        let err = create_team(&db, &actor, league.id, "cheese", actor.user_id).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::DuplicateTeamName("cheese".into()))
        );
    }

    #[test]
    fn league_capacity_enforced() {
        let db = test_db();
        let (actor, _) = league_with_admin(&db);
        let small = create_league(
            &db,
            &actor,
            NewLeague {
                name: "Small".into(),
                sport: "Volleyball".into(),
                max_teams: 2,
            },
        )
        .unwrap();
        add_teams(&db, &actor, small.id, 2);
        let err = create_team(&db, &actor, small.id, "Extra", actor.user_id).unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::LeagueFull { max_teams: 2 }));
    }

    #[test]
    fn team_creation_blocked_while_active() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        add_teams(&db, &actor, league.id, 3);
        change_phase(&db, &actor, league.id, Phase::Active).unwrap();

        let err = create_team(&db, &actor, league.id, "Late", actor.user_id).unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::WrongPhase { .. })));
        assert_eq!(list_teams(&db, league.id).unwrap().len(), 3);
    }

    #[test]
    fn registering_for_someone_else_needs_admin() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        let casey = create_user(&db, "casey", "Casey", Role::User).unwrap();
        let elle = create_user(&db, "elle", "Elle", Role::User).unwrap();

        let err = create_team(&db, &Actor::from(&casey), league.id, "Mine", elle.id).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        let team = create_team(&db, &actor, league.id, "Theirs", elle.id).unwrap();
        assert_eq!(team.manager_id, elle.id);
    }

    #[test]
    fn delete_team_rejected_while_active() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        let teams = add_teams(&db, &actor, league.id, 3);
        change_phase(&db, &actor, league.id, Phase::Active).unwrap();

        let err = delete_team(&db, &actor, teams[0].id).unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::WrongPhase { .. })));
        assert_eq!(list_teams(&db, league.id).unwrap().len(), 3);
    }

    #[test]
    fn delete_league_only_in_signup() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        add_teams(&db, &actor, league.id, 3);
        change_phase(&db, &actor, league.id, Phase::Active).unwrap();

        let err = delete_league(&db, &actor, league.id).unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::WrongPhase { .. })));

        change_phase(&db, &actor, league.id, Phase::Signup).unwrap();
        delete_league(&db, &actor, league.id).unwrap();
        assert!(get_league(&db, league.id).unwrap_err().is_not_found());
    }

    #[test]
    fn joinable_leagues_exclude_active_and_full() {
        let db = test_db();
        let (actor, league) = league_with_admin(&db);
        let hoops = create_league(
            &db,
            &actor,
            NewLeague {
                name: "Hoops".into(),
                sport: "Basketball".into(),
                max_teams: 3,
            },
        )
        .unwrap();
        let full = create_league(
            &db,
            &actor,
            NewLeague {
                name: "Full".into(),
                sport: "Basketball".into(),
                max_teams: 1,
            },
        )
        .unwrap();
        add_teams(&db, &actor, full.id, 1);
        add_teams(&db, &actor, hoops.id, 3);
        change_phase(&db, &actor, hoops.id, Phase::Active).unwrap();

        let names: Vec<String> = joinable_leagues(&db, None)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec![league.name.clone()]);
        assert!(joinable_leagues(&db, Some("basketball")).unwrap().is_empty());
        assert_eq!(joinable_leagues(&db, Some("Soccer")).unwrap().len(), 1);
    }

    #[test]
    fn short_username_rejected() {
        let db = test_db();
        let err = create_user(&db, "ab", "", Role::User).unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::InvalidInput { field: "username", .. })));
        let user = create_user(&db, "abc", "", Role::User).unwrap();
        assert_eq!(user.display_name, "abc");
        assert!(create_user(&db, "abc", "", Role::User).is_err());
    }
}
