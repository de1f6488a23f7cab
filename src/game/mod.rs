//! Game Logic Module
//!
//! The physics kernel and the match state it mutates. No I/O.
//!
//! ## Module Structure
//!
//! - `state`: Game state, paddles, ball, board constants
//! - `input`: Paddle intent
//! - `collision`: Wall and paddle collision resolution
//! - `tick`: Authoritative simulation step
//! - `phase`: Countdown / pause state machine

pub mod input;
pub mod state;
pub mod tick;
pub mod collision;
pub mod phase;

// Re-export key types
pub use input::PaddleIntent;
pub use state::{GameState, Paddle, Ball, Side};
pub use tick::{MatchConfig, TickResult};
pub use phase::MatchPhase;
