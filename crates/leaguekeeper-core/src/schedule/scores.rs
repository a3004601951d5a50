// Recording fixture results.

use tracing::info;

use crate::db::{self, Database};
use crate::error::{EngineError, EngineResult, Entity, Rejection};
use crate::league::load_league;
use crate::model::{Actor, Fixture, FixtureId, Score};

/// Parse raw form input into a score.
pub fn parse_scores(home: &str, away: &str) -> Result<Score, Rejection> {
    let parse = |raw: &str| {
        raw.trim()
            .parse::<i64>()
            .map_err(|_| Rejection::InvalidScore("Scores must be numbers".into()))
    };
    score_from(parse(home)?, parse(away)?)
}

fn score_from(home: i64, away: i64) -> Result<Score, Rejection> {
    let side = |value: i64| {
        if value < 0 {
            return Err(Rejection::InvalidScore("Scores cannot be negative".into()));
        }
        u32::try_from(value).map_err(|_| Rejection::InvalidScore("Score is too large".into()))
    };
    Ok(Score {
        home: side(home)?,
        away: side(away)?,
    })
}

/// Record (or overwrite) the result of a fixture.
///
/// Allowed for a site admin, the league administrator, or the manager of
/// either team. Not phase-gated.
pub fn submit_score(
    db: &Database,
    actor: &Actor,
    fixture_id: FixtureId,
    home: i64,
    away: i64,
) -> EngineResult<Fixture> {
    let score = score_from(home, away)?;

    let fixture = db.write(|conn| {
        let mut fixture =
            db::find_fixture(conn, fixture_id)?.ok_or(EngineError::NotFound(Entity::Fixture, fixture_id))?;
        let league = load_league(conn, fixture.league_id)?;

        if !league.is_administered_by(actor) {
            let managed = db::list_teams(conn, league.id)?
                .iter()
                .any(|team| team.manager_id == actor.user_id && fixture.involves(team.id));
            if !managed {
                return Err(EngineError::Forbidden(
                    "only a league administrator or one of the team managers can submit scores"
                        .into(),
                ));
            }
        }

        db::set_fixture_score(conn, fixture_id, score)?;
        fixture.score = Some(score);
        Ok(fixture)
    })?;

    info!(
        fixture_id,
        league_id = fixture.league_id,
        "Score recorded: {}-{}",
        score.home,
        score.away
    );
    Ok(fixture)
}
