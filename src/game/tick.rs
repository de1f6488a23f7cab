//! Physics Kernel
//!
//! One fixed-rate step of the match: paddles, ball, walls, paddles
//! again for collision, then scoring. Pure and deterministic given the
//! state, the config, and the room's RNG. No I/O, no timers.

use std::f64::consts::PI;

use crate::core::rng::SeededRng;
use crate::game::collision::{resolve_paddle_collision, resolve_wall_collision};
use crate::game::state::{
    Side, GameState,
    BOARD_WIDTH, BOARD_HEIGHT, PADDLE_WIDTH, PADDLE_HEIGHT, PADDLE_INSET, BALL_SIZE,
};

/// Result of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickResult {
    /// Side that scored this tick
    pub scored: Option<Side>,
    /// Ball bounced off a wall
    pub wall_bounce: bool,
    /// Paddle that returned the ball
    pub paddle_hit: Option<Side>,
    /// Set on the tick the match was decided
    pub winner: Option<Side>,
}

/// Configuration for match simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Board width in pixels
    pub board_width: f64,
    /// Board height in pixels
    pub board_height: f64,
    /// Paddle width
    pub paddle_width: f64,
    /// Paddle height
    pub paddle_height: f64,
    /// Gap between goal line and paddle
    pub paddle_inset: f64,
    /// Ball edge length
    pub ball_size: f64,
    /// Paddle movement per tick
    pub paddle_speed: f64,
    /// Ball speed at every serve
    pub initial_ball_speed: f64,
    /// Speed multiplier per paddle hit
    pub speed_growth: f64,
    /// Cap on ball speed, as a multiple of the initial speed
    pub max_speed_multiplier: f64,
    /// Half-width of the serve cone, in radians
    pub max_serve_angle: f64,
    /// Points needed to win
    pub win_score: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            board_width: BOARD_WIDTH,
            board_height: BOARD_HEIGHT,
            paddle_width: PADDLE_WIDTH,
            paddle_height: PADDLE_HEIGHT,
            paddle_inset: PADDLE_INSET,
            ball_size: BALL_SIZE,
            paddle_speed: 8.0,
            initial_ball_speed: 5.0,
            speed_growth: 1.05,
            max_speed_multiplier: 2.0,
            max_serve_angle: PI / 6.0, // 30 degrees
            win_score: 5,
        }
    }
}

/// Run one simulation tick.
///
/// Does nothing unless the ball is live and the match is undecided,
/// so calling it while paused or after the end leaves the state
/// untouched.
pub fn tick(state: &mut GameState, config: &MatchConfig, rng: &mut SeededRng) -> TickResult {
    let mut result = TickResult::default();

    if !state.running || state.winner.is_some() {
        return result;
    }

    // 1. Paddles
    move_paddles(state, config);

    // 2. Ball
    move_ball(state);

    // 3. Walls
    result.wall_bounce = resolve_wall_collision(&mut state.ball, config);

    // 4. Paddles, each gated by the ball's direction of travel
    if resolve_paddle_collision(&mut state.ball, &state.left_paddle, Side::Left, config) {
        result.paddle_hit = Some(Side::Left);
    }
    if resolve_paddle_collision(&mut state.ball, &state.right_paddle, Side::Right, config) {
        result.paddle_hit = Some(Side::Right);
    }

    // 5. Goals
    if let Some(scorer) = resolve_scoring(state, config, rng) {
        result.scored = Some(scorer);
        result.winner = state.winner;
    }

    result
}

/// Move both paddles by their held intent, clamped to the board.
pub fn move_paddles(state: &mut GameState, config: &MatchConfig) {
    let max_y = config.board_height - config.paddle_height;

    for side in [Side::Left, Side::Right] {
        let paddle = state.paddle_mut(side);
        if paddle.up {
            paddle.y = (paddle.y - config.paddle_speed).max(0.0);
        }
        if paddle.down {
            paddle.y = (paddle.y + config.paddle_speed).min(max_y);
        }
        paddle.y = paddle.y.clamp(0.0, max_y);
    }
}

/// Single integration step, no sub-stepping.
#[inline]
pub fn move_ball(state: &mut GameState) {
    state.ball.x += state.ball.dx;
    state.ball.y += state.ball.dy;
}

/// Award a point if the ball has fully left the board.
///
/// Returns the scoring side. Reaching the win score decides the match
/// and leaves the ball where it is; any other point re-serves toward
/// the scorer. Either way the ball stops until the session resumes it.
pub fn resolve_scoring(
    state: &mut GameState,
    config: &MatchConfig,
    rng: &mut SeededRng,
) -> Option<Side> {
    let scorer = if state.ball.x + config.ball_size < 0.0 {
        Side::Right
    } else if state.ball.x > config.board_width {
        Side::Left
    } else {
        return None;
    };

    state.paddle_mut(scorer).score += 1;
    state.running = false;

    let left = state.left_paddle.score;
    let right = state.right_paddle.score;
    if left >= config.win_score || right >= config.win_score {
        state.winner = Some(if left > right { Side::Left } else { Side::Right });
        return Some(scorer);
    }

    state.ball.serve(scorer, config, rng);
    Some(scorer)
}

/// Run up to `dt_ticks` ticks, stopping early once the ball stops.
///
/// Returns the result of every tick that ran.
pub fn run_ticks(
    state: &mut GameState,
    dt_ticks: u32,
    config: &MatchConfig,
    rng: &mut SeededRng,
) -> Vec<TickResult> {
    let mut results = Vec::new();

    for _ in 0..dt_ticks {
        if !state.running {
            break;
        }
        results.push(tick(state, config, rng));
    }

    results
}

// =============================================================================
// TESTS
// =============================================================================
