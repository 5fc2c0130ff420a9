use std::fmt::{self, Display};

use serde::Serialize;

pub const NOT_STARTED: i64 = -2;
pub const FINISHED: i64 = -1;
pub const START: i64 = 0;

/// A value of the state field of a state machine instance.
///
/// The start of the body is resume point 0; suspension points are numbered from 1.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateId {
    /// Created by an iterable-returning method and not yet handed out as an iterator.
    NotStarted,
    Finished,
    Start,
    Suspended(u32),
}

impl StateId {
    pub fn raw(self) -> i64 {
        match self {
            Self::NotStarted => NOT_STARTED,
            Self::Finished => FINISHED,
            Self::Start => START,
            Self::Suspended(k) => k as i64,
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        Some(match raw {
            NOT_STARTED => Self::NotStarted,
            FINISHED => Self::Finished,
            START => Self::Start,
            k if k > 0 => Self::Suspended(u32::try_from(k).ok()?),
            _ => return None,
        })
    }

    /// Returns `true` if `Resume` may continue execution from this state.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Start | Self::Suspended(_))
    }
}

impl Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started({})", NOT_STARTED),
            Self::Finished => write!(f, "finished({})", FINISHED),
            Self::Start => write!(f, "start({})", START),
            Self::Suspended(k) => write!(f, "suspended({})", k),
        }
    }
}
