// Double round-robin fixture generation.
//
// Pure: takes the team list, a start date, pacing and a random source, and
// returns the fixtures in the order they should be stored. Nothing here
// touches the database.

use std::collections::HashSet;

use chrono::{NaiveDateTime, NaiveTime};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarDate;
use crate::error::Rejection;
use crate::model::TeamId;

/// Every generated fixture kicks off at 19:00.
pub const KICKOFF: NaiveTime = match NaiveTime::from_hms_opt(19, 0, 0) {
    Some(t) => t,
    None => panic!("invalid kickoff time"),
};

/// Days in one scheduling week.
const WEEK_DAYS: u32 = 7;

/// How fixtures are spread over the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    /// Fixtures per week before the week anchor advances by seven days.
    pub games_per_week: u32,
    /// Days between consecutive fixtures inside one week. Zero stacks the
    /// whole week on its first day.
    #[serde(default)]
    pub spread_days: u32,
}

impl Pacing {
    pub fn weekly(games_per_week: u32) -> Self {
        Self {
            games_per_week,
            spread_days: 0,
        }
    }

    pub fn validate(&self) -> Result<(), Rejection> {
        if self.games_per_week == 0 {
            return Err(Rejection::InvalidPacing(
                "games per week must be at least 1".into(),
            ));
        }
        if self.spread_days >= WEEK_DAYS {
            return Err(Rejection::InvalidPacing(format!(
                "spread days must be less than {WEEK_DAYS}"
            )));
        }
        Ok(())
    }

    /// Day offset from the week anchor for the `slot`-th fixture of a week.
    /// Capped so a week never spills into the next one.
    fn offset_in_week(&self, slot: u32) -> u32 {
        slot.saturating_mul(self.spread_days).min(WEEK_DAYS - 1)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::weekly(2)
    }
}

/// A fixture ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledFixture {
    pub home: TeamId,
    pub away: TeamId,
    pub kickoff: NaiveDateTime,
}

/// Every ordered pair of distinct teams: each unordered pair appears twice,
/// once with each side at home.
pub fn round_robin_pairs(teams: &[TeamId]) -> Vec<(TeamId, TeamId)> {
    let mut pairs = Vec::with_capacity(teams.len() * teams.len().saturating_sub(1));
    for (i, &home) in teams.iter().enumerate() {
        for (j, &away) in teams.iter().enumerate() {
            if i != j {
                pairs.push((home, away));
            }
        }
    }
    pairs
}

/// Shuffle the double round-robin and assign kickoff dates from `start`.
///
/// Returns an empty list when fewer than two teams are given. A team listed
/// twice would be paired with itself and is rejected. Dates are
/// non-decreasing in the returned order.
pub fn generate_fixtures<R: Rng + ?Sized>(
    teams: &[TeamId],
    start: CalendarDate,
    pacing: Pacing,
    rng: &mut R,
) -> Result<Vec<ScheduledFixture>, Rejection> {
    pacing.validate()?;
    if teams.len() < 2 {
        return Ok(Vec::new());
    }
    let mut seen = HashSet::with_capacity(teams.len());
    if !teams.iter().all(|id| seen.insert(*id)) {
        return Err(Rejection::SelfFixture);
    }

    let mut pairs = round_robin_pairs(teams);
    pairs.shuffle(rng);

    let mut week_start = start;
    let mut slot = 0;
    let mut fixtures = Vec::with_capacity(pairs.len());
    for (home, away) in pairs {
        if slot == pacing.games_per_week {
            week_start = week_start.plus_days(WEEK_DAYS)?;
            slot = 0;
        }
        let date = week_start.plus_days(pacing.offset_in_week(slot))?;
        fixtures.push(ScheduledFixture {
            home,
            away,
            kickoff: date.to_naive().and_time(KICKOFF),
        });
        slot += 1;
    }
    Ok(fixtures)
}
