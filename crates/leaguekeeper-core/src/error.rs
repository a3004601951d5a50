// Error taxonomy for engine operations.
//
// Precondition violations, missing entities and permission failures are
// reported as distinct variants so callers can map them to user-facing
// messages; storage failures carry anyhow context from the db layer.

use std::fmt;

use thiserror::Error;

use crate::calendar::CalendarError;
use crate::model::Phase;

/// The kind of record an operation referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    League,
    Team,
    Fixture,
    User,
    Membership,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::League => "league",
            Entity::Team => "team",
            Entity::Fixture => "fixture",
            Entity::User => "user",
            Entity::Membership => "membership",
        };
        f.write_str(name)
    }
}

/// An expected, recoverable precondition violation. State is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("League does not have enough teams to start (has {have}, needs {need})")]
    NotEnoughTeams { have: usize, need: usize },

    #[error("cannot {operation} while the league is {phase}")]
    WrongPhase { operation: &'static str, phase: Phase },

    #[error("user is already a member of a team in this league")]
    AlreadyInLeague,

    #[error("a team named `{0}` already exists in this league")]
    DuplicateTeamName(String),

    #[error("a league named `{0}` already exists")]
    DuplicateLeagueName(String),

    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),

    #[error("league is full ({max_teams} teams)")]
    LeagueFull { max_teams: u32 },

    #[error("a team cannot play itself")]
    SelfFixture,

    #[error("{0}")]
    InvalidScore(String),

    #[error("schedule already has recorded results and cannot be replaced")]
    ScheduleHasResults,

    #[error("team has recorded results and cannot be deleted")]
    TeamHasResults,

    #[error("invalid schedule settings: {0}")]
    InvalidPacing(String),

    #[error("invalid {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("{0} {1} not found")]
    NotFound(Entity, i64),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    /// The rejection, if this error is a precondition violation.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            EngineError::Rejected(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(..))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
