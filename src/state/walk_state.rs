//! Feed walk state definitions
//!
//! A walk over one tag's feed moves through a small state machine:
//!
//! ```text
//! Loading -> Scrolling -> { Scrolling, Stalled, Done }
//!            Stalled   -> { Scrolling, Done }
//! ```
//!
//! `Done` carries no data; why the walk ended is a separate [`StopReason`].
use std::fmt;

/// Current phase of a feed walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkPhase {
    /// Navigating to the feed and waiting for initial content
    Loading,

    /// The last pass found new records; keep reading and scrolling
    Scrolling,

    /// The last pass found nothing new, but the stall limit is not reached
    Stalled,

    /// Terminal
    Done,
}

impl WalkPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: WalkPhase) -> bool {
        matches!(
            (self, next),
            (Self::Loading, Self::Scrolling)
                | (Self::Scrolling, Self::Scrolling)
                | (Self::Scrolling, Self::Stalled)
                | (Self::Scrolling, Self::Done)
                | (Self::Stalled, Self::Scrolling)
                | (Self::Stalled, Self::Stalled)
                | (Self::Stalled, Self::Done)
        )
    }
}

impl fmt::Display for WalkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Scrolling => "scrolling",
            Self::Stalled => "stalled",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Why a feed walk ended
///
/// Every reason is an expected outcome; none of them is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A record older than the recency cutoff was reached
    Cutoff,

    /// The requested number of records was collected
    MaxReached,

    /// Too many consecutive passes produced no new records
    Stalled,

    /// The scroll-attempt cap was used up
    AttemptCap,
}

impl StopReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Cutoff => "cutoff",
            Self::MaxReached => "max_reached",
            Self::Stalled => "stalled",
            Self::AttemptCap => "attempt_cap",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "cutoff" => Some(Self::Cutoff),
            "max_reached" => Some(Self::MaxReached),
            "stalled" => Some(Self::Stalled),
            "attempt_cap" => Some(Self::AttemptCap),
            _ => None,
        }
    }

    pub fn all_reasons() -> [Self; 4] {
        [Self::Cutoff, Self::MaxReached, Self::Stalled, Self::AttemptCap]
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
