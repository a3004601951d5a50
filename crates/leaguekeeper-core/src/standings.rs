// League standings, recomputed from recorded results on every call.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::{self, Database};
use crate::error::EngineResult;
use crate::league::load_league;
use crate::model::{Fixture, LeagueId, Team, TeamId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub team_id: TeamId,
    pub team_name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl Standing {
    pub fn played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }
}

/// Ordering applied to a standings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Most wins first; teams level on wins keep registration order.
    Wins,
    /// Team name, case-insensitive.
    Name,
    /// Registration order.
    #[default]
    Registration,
}

impl SortKey {
    /// Unrecognized keys fall back to registration order.
    pub fn parse(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "wins" => SortKey::Wins,
            "name" => SortKey::Name,
            _ => SortKey::Registration,
        }
    }
}

/// Build a standings table for `teams` (in registration order) from the
/// league's fixtures. Unplayed fixtures are ignored; every team gets a row.
pub fn compute_standings(teams: &[Team], fixtures: &[Fixture], key: SortKey) -> Vec<Standing> {
    let mut table: Vec<Standing> = teams
        .iter()
        .map(|t| Standing {
            team_id: t.id,
            team_name: t.name.clone(),
            wins: 0,
            losses: 0,
            ties: 0,
        })
        .collect();
    let index: HashMap<TeamId, usize> = table
        .iter()
        .enumerate()
        .map(|(i, s)| (s.team_id, i))
        .collect();

    for fixture in fixtures {
        let Some(score) = fixture.score else { continue };
        let (Some(&home), Some(&away)) = (
            index.get(&fixture.home_team_id),
            index.get(&fixture.away_team_id),
        ) else {
            continue;
        };
        match score.home.cmp(&score.away) {
            std::cmp::Ordering::Greater => {
                table[home].wins += 1;
                table[away].losses += 1;
            }
            std::cmp::Ordering::Less => {
                table[away].wins += 1;
                table[home].losses += 1;
            }
            std::cmp::Ordering::Equal => {
                table[home].ties += 1;
                table[away].ties += 1;
            }
        }
    }

    match key {
        SortKey::Wins => table.sort_by(|a, b| b.wins.cmp(&a.wins)),
        SortKey::Name => table.sort_by_key(|s| s.team_name.to_lowercase()),
        SortKey::Registration => {}
    }
    table
}

/// Standings for a league, read from one consistent snapshot.
pub fn league_standings(db: &Database, league_id: LeagueId, key: SortKey) -> EngineResult<Vec<Standing>> {
    db.read(|conn| {
        load_league(conn, league_id)?;
        let teams = db::list_teams(conn, league_id)?;
        let played = db::list_played_fixtures(conn, league_id)?;
        Ok(compute_standings(&teams, &played, key))
    })
}
