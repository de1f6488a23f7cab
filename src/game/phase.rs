//! Match Phase
//!
//! Timed state machine for a session:
//! `Waiting -> Countdown -> Live <-> ScoredPause -> Ended`.
//!
//! Timers are counted in ticks, so tests can step time by hand.

use std::time::Duration;

use serde::{Serialize, Deserialize};

/// Where a match is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Fewer than two participants.
    #[default]
    Waiting,
    /// Both present, ball held until the countdown elapses.
    Countdown {
        /// Timer fires left before the ball goes live
        ticks_remaining: u32,
    },
    /// Ball in play.
    Live,
    /// Short hold after a point.
    ScoredPause {
        /// Timer fires left before play resumes
        ticks_remaining: u32,
    },
    /// A side has won. Terminal.
    Ended,
}

impl MatchPhase {
    /// Countdown lasting `duration` at `tick_rate`.
    pub fn countdown(duration: Duration, tick_rate: u32) -> Self {
        MatchPhase::Countdown { ticks_remaining: ticks_for(duration, tick_rate) }
    }

    /// Post-point pause lasting `duration` at `tick_rate`.
    pub fn scored_pause(duration: Duration, tick_rate: u32) -> Self {
        MatchPhase::ScoredPause { ticks_remaining: ticks_for(duration, tick_rate) }
    }

    /// Advance one timer fire.
    ///
    /// Returns true when this call moved the phase into `Live`.
    pub fn advance(&mut self) -> bool {
        match *self {
            MatchPhase::Countdown { ticks_remaining } | MatchPhase::ScoredPause { ticks_remaining } => {
                if ticks_remaining <= 1 {
                    *self = MatchPhase::Live;
                    true
                } else if matches!(self, MatchPhase::Countdown { .. }) {
                    *self = MatchPhase::Countdown { ticks_remaining: ticks_remaining - 1 };
                    false
                } else {
                    *self = MatchPhase::ScoredPause { ticks_remaining: ticks_remaining - 1 };
                    false
                }
            }
            MatchPhase::Waiting | MatchPhase::Live | MatchPhase::Ended => false,
        }
    }

    /// Is the ball in play?
    pub fn is_live(&self) -> bool {
        matches!(self, MatchPhase::Live)
    }

    /// Has the match been decided?
    pub fn is_ended(&self) -> bool {
        matches!(self, MatchPhase::Ended)
    }

    /// Does the tick driver still need to fire?
    pub fn needs_clock(&self) -> bool {
        !matches!(self, MatchPhase::Waiting | MatchPhase::Ended)
    }
}

/// Number of ticks covering `duration`, rounded up.
pub fn ticks_for(duration: Duration, tick_rate: u32) -> u32 {
    let scaled = duration.as_nanos() * u128::from(tick_rate);
    let ticks = (scaled + 999_999_999) / 1_000_000_000;
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

// =============================================================================
// TESTS
// =============================================================================
