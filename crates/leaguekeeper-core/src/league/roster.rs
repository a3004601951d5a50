// Team rosters: joining, adding and removing members.
//
// A user belongs to at most one team per league. The memberships table
// enforces that with its primary key; the checks here turn it into a
// rejection before the insert is attempted.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::{self, Database};
use crate::error::{EngineError, EngineResult, Entity, Rejection};
use crate::model::{Actor, League, Membership, Phase, RosterEntry, Team, TeamId, User, UserId};

use super::phase::require_signup;
use super::{load_league, load_team, load_user};

/// Everything a team page shows in one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TeamView {
    pub team: Team,
    pub league: League,
    pub manager: User,
    pub roster: Vec<RosterEntry>,
    /// Whether new players may still join (the league is in signup).
    pub accepting_players: bool,
}

fn require_team_manager(team: &Team, league: &League, actor: &Actor) -> EngineResult<()> {
    if team.manager_id == actor.user_id || league.is_administered_by(actor) {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "only the manager of `{}` can change its roster",
            team.name
        )))
    }
}

fn insert_member(conn: &Connection, league: &League, team: &Team, user_id: UserId) -> EngineResult<Membership> {
    require_signup(league.phase, "join a team")?;
    if db::find_membership_in_league(conn, user_id, league.id)?.is_some() {
        return Err(Rejection::AlreadyInLeague.into());
    }
    let membership = Membership {
        user_id,
        team_id: team.id,
        league_id: league.id,
    };
    db::insert_membership(conn, &membership)?;
    Ok(membership)
}

/// The acting user joins `team_id`.
pub fn join_team(db: &Database, actor: &Actor, team_id: TeamId) -> EngineResult<Membership> {
    let membership = db.write(|conn| {
        let team = load_team(conn, team_id)?;
        let league = load_league(conn, team.league_id)?;
        insert_member(conn, &league, &team, actor.user_id)
    })?;

    info!(user_id = membership.user_id, team_id, "User joined team");
    Ok(membership)
}

/// A team manager (or league administrator) adds `user_id` to the roster.
pub fn add_member(db: &Database, actor: &Actor, team_id: TeamId, user_id: UserId) -> EngineResult<Membership> {
    let membership = db.write(|conn| {
        let team = load_team(conn, team_id)?;
        let league = load_league(conn, team.league_id)?;
        require_team_manager(&team, &league, actor)?;
        load_user(conn, user_id)?;
        insert_member(conn, &league, &team, user_id)
    })?;

    info!(user_id, team_id, "Member added to team");
    Ok(membership)
}

/// A team manager (or league administrator) removes `user_id` from the roster.
pub fn remove_member(db: &Database, actor: &Actor, team_id: TeamId, user_id: UserId) -> EngineResult<()> {
    db.write(|conn| {
        let team = load_team(conn, team_id)?;
        let league = load_league(conn, team.league_id)?;
        require_team_manager(&team, &league, actor)?;
        if db::delete_membership(conn, user_id, team_id)? == 0 {
            return Err(EngineError::NotFound(Entity::Membership, user_id));
        }
        Ok(())
    })?;

    info!(user_id, team_id, "Member removed from team");
    Ok(())
}

/// The acting user leaves `team_id`.
pub fn leave_team(db: &Database, actor: &Actor, team_id: TeamId) -> EngineResult<()> {
    db.write(|conn| {
        load_team(conn, team_id)?;
        if db::delete_membership(conn, actor.user_id, team_id)? == 0 {
            return Err(EngineError::NotFound(Entity::Membership, actor.user_id));
        }
        Ok(())
    })?;

    debug!(user_id = actor.user_id, team_id, "User left team");
    Ok(())
}

pub fn roster(db: &Database, team_id: TeamId) -> EngineResult<Vec<RosterEntry>> {
    db.read(|conn| {
        load_team(conn, team_id)?;
        Ok(db::roster(conn, team_id)?)
    })
}

/// Teams `user_id` plays for, across all leagues.
pub fn teams_for_user(db: &Database, user_id: UserId) -> EngineResult<Vec<Team>> {
    db.read(|conn| {
        load_user(conn, user_id)?;
        Ok(db::teams_for_user(conn, user_id)?)
    })
}

pub fn team_view(db: &Database, team_id: TeamId) -> EngineResult<TeamView> {
    db.read(|conn| {
        let team = load_team(conn, team_id)?;
        let league = load_league(conn, team.league_id)?;
        let manager = load_user(conn, team.manager_id)?;
        let roster = db::roster(conn, team_id)?;
        Ok(TeamView {
            accepting_players: league.phase == Phase::Signup,
            team,
            league,
            manager,
            roster,
        })
    })
}
