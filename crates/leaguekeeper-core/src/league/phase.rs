// League phase transitions and the phase guards other operations rely on.

use crate::error::Rejection;
use crate::model::Phase;

/// Minimum number of teams a league needs before it can become active.
pub const MIN_TEAMS_TO_ACTIVATE: usize = 3;

/// Outcome of a permitted transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The phase changed from `from` to `to`.
    Changed { from: Phase, to: Phase },
    /// The league was already in the requested phase.
    Unchanged(Phase),
}

impl Transition {
    pub fn phase(&self) -> Phase {
        match self {
            Transition::Changed { to, .. } => *to,
            Transition::Unchanged(phase) => *phase,
        }
    }
}

/// Decide whether a league in `current` with `team_count` teams may move to
/// `target`. Pure: the caller persists the result.
pub fn transition(current: Phase, target: Phase, team_count: usize) -> Result<Transition, Rejection> {
    match (current, target) {
        (Phase::Signup, Phase::Signup) | (Phase::Active, Phase::Active) => {
            Ok(Transition::Unchanged(current))
        }
        (Phase::Signup, Phase::Active) => {
            if team_count < MIN_TEAMS_TO_ACTIVATE {
                return Err(Rejection::NotEnoughTeams {
                    have: team_count,
                    need: MIN_TEAMS_TO_ACTIVATE,
                });
            }
            Ok(Transition::Changed {
                from: Phase::Signup,
                to: Phase::Active,
            })
        }
        (Phase::Active, Phase::Signup) => Ok(Transition::Changed {
            from: Phase::Active,
            to: Phase::Signup,
        }),
    }
}

/// Reject `operation` unless the league is still taking signups.
pub fn require_signup(phase: Phase, operation: &'static str) -> Result<(), Rejection> {
    match phase {
        Phase::Signup => Ok(()),
        Phase::Active => Err(Rejection::WrongPhase { operation, phase }),
    }
}
