//! Game State Definitions
//!
//! The authoritative match state, serialized verbatim into every
//! `init` and `state` snapshot.

use serde::{Serialize, Deserialize};

use crate::core::rng::SeededRng;
use crate::game::input::PaddleIntent;
use crate::game::tick::MatchConfig;

// =============================================================================
// BOARD CONSTANTS
// =============================================================================

/// Board width in pixels.
pub const BOARD_WIDTH: f64 = 800.0;

/// Board height in pixels.
pub const BOARD_HEIGHT: f64 = 400.0;

/// Paddle width in pixels.
pub const PADDLE_WIDTH: f64 = 15.0;

/// Paddle height in pixels.
pub const PADDLE_HEIGHT: f64 = 80.0;

/// Distance from a goal line to the outer face of its paddle.
pub const PADDLE_INSET: f64 = 30.0;

/// Edge length of the (square) ball.
pub const BALL_SIZE: f64 = 15.0;

// =============================================================================
// SIDE
// =============================================================================

/// Which half of the board a participant defends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left paddle, assigned to the first arrival.
    Left,
    /// Right paddle, assigned to the second arrival.
    Right,
}

impl Side {
    /// The other side.
    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Wire name (`"left"` / `"right"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Horizontal sign pointing from this side's goal into the board.
    pub fn outward(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PADDLE
// =============================================================================

/// A paddle: fixed x, vertically movable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    /// Left edge (fixed per side).
    pub x: f64,
    /// Top edge, always within `[0, board_height - paddle_height]`.
    pub y: f64,
    /// Points scored by this side.
    pub score: u32,
    /// Held "up" intent (server-side only).
    #[serde(skip)]
    pub up: bool,
    /// Held "down" intent (server-side only).
    #[serde(skip)]
    pub down: bool,
}

impl Paddle {
    /// Create a vertically centred paddle for a side.
    pub fn new(side: Side, config: &MatchConfig) -> Self {
        let x = match side {
            Side::Left => config.paddle_inset,
            Side::Right => config.board_width - config.paddle_inset - config.paddle_width,
        };
        Self {
            x,
            y: config.board_height / 2.0 - config.paddle_height / 2.0,
            score: 0,
            up: false,
            down: false,
        }
    }

    /// Overwrite the held intent.
    pub fn set_intent(&mut self, intent: PaddleIntent) {
        self.up = intent.up;
        self.down = intent.down;
    }

    /// Currently held intent.
    pub fn intent(&self) -> PaddleIntent {
        PaddleIntent { up: self.up, down: self.down }
    }

    /// Vertical centre.
    pub fn center_y(&self, config: &MatchConfig) -> f64 {
        self.y + config.paddle_height / 2.0
    }
}

// =============================================================================
// BALL
// =============================================================================

/// The ball. `(x, y)` is its top-left corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal velocity per tick.
    pub dx: f64,
    /// Vertical velocity per tick.
    pub dy: f64,
    /// Magnitude of `(dx, dy)`.
    pub speed: f64,
}

impl Ball {
    /// A stationary ball in the middle of the board.
    pub fn centered(config: &MatchConfig) -> Self {
        Self {
            x: config.board_width / 2.0 - config.ball_size / 2.0,
            y: config.board_height / 2.0 - config.ball_size / 2.0,
            dx: 0.0,
            dy: 0.0,
            speed: config.initial_ball_speed,
        }
    }

    /// Re-centre and launch toward `toward` at initial speed with a
    /// random angle within the configured serve cone.
    pub fn serve(&mut self, toward: Side, config: &MatchConfig, rng: &mut SeededRng) {
        *self = Self::centered(config);
        let angle = rng.next_f64_range(-config.max_serve_angle, config.max_serve_angle);
        let dir = match toward {
            Side::Left => -1.0,
            Side::Right => 1.0,
        };
        self.dx = dir * angle.cos() * self.speed;
        self.dy = angle.sin() * self.speed;
    }

    /// Vertical centre.
    pub fn center_y(&self, config: &MatchConfig) -> f64 {
        self.y + config.ball_size / 2.0
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete authoritative state of one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Paddle of the first participant.
    pub left_paddle: Paddle,
    /// Paddle of the second participant.
    pub right_paddle: Paddle,
    /// The ball.
    pub ball: Ball,
    /// Whether the ball is live.
    pub running: bool,
    /// Set exactly once, when a side reaches the win threshold.
    pub winner: Option<Side>,
}

impl GameState {
    /// Fresh pre-match state with the first serve already aimed.
    pub fn new(config: &MatchConfig, rng: &mut SeededRng) -> Self {
        let mut ball = Ball::centered(config);
        let toward = if rng.next_bool() { Side::Right } else { Side::Left };
        ball.serve(toward, config, rng);

        Self {
            left_paddle: Paddle::new(Side::Left, config),
            right_paddle: Paddle::new(Side::Right, config),
            ball,
            running: false,
            winner: None,
        }
    }

    /// Paddle for a side.
    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::Left => &self.left_paddle,
            Side::Right => &self.right_paddle,
        }
    }

    /// Mutable paddle for a side.
    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Left => &mut self.left_paddle,
            Side::Right => &mut self.right_paddle,
        }
    }

    /// Score for a side.
    pub fn score(&self, side: Side) -> u32 {
        self.paddle(side).score
    }

    /// Has the match been decided?
    pub fn is_ended(&self) -> bool {
        self.winner.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================
