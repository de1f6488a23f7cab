//! Collision Resolution
//!
//! Post-hoc rectangle tests against the already-integrated ball
//! position. There is no swept test, so a fast enough ball can pass
//! through a paddle between two ticks.

use std::f64::consts::FRAC_PI_2;

use crate::game::state::{Ball, Paddle, Side};
use crate::game::tick::MatchConfig;

/// Axis-aligned overlap between the ball and a paddle.
#[inline]
pub fn ball_overlaps_paddle(ball: &Ball, paddle: &Paddle, config: &MatchConfig) -> bool {
    ball.x < paddle.x + config.paddle_width
        && ball.x + config.ball_size > paddle.x
        && ball.y < paddle.y + config.paddle_height
        && ball.y + config.ball_size > paddle.y
}

/// Bounce off the top or bottom wall.
///
/// Inverts `dy` only and pulls the ball back inside the board.
/// Returns true if a bounce happened.
pub fn resolve_wall_collision(ball: &mut Ball, config: &MatchConfig) -> bool {
    let floor = config.board_height - config.ball_size;
    if ball.y > 0.0 && ball.y < floor {
        return false;
    }

    ball.dy = -ball.dy;
    ball.y = ball.y.clamp(0.0, floor);
    true
}

/// Bounce off the paddle defending `side`.
///
/// Only a ball travelling toward that paddle's goal can hit it. On a
/// hit the ball is snapped to the paddle face, sent back out at an
/// angle set by where it struck, and sped up. Returns true on a hit.
pub fn resolve_paddle_collision(
    ball: &mut Ball,
    paddle: &Paddle,
    side: Side,
    config: &MatchConfig,
) -> bool {
    let approaching = match side {
        Side::Left => ball.dx < 0.0,
        Side::Right => ball.dx > 0.0,
    };
    if !approaching || !ball_overlaps_paddle(ball, paddle, config) {
        return false;
    }

    // Snap the leading edge to the paddle face
    ball.x = match side {
        Side::Left => paddle.x + config.paddle_width,
        Side::Right => paddle.x - config.ball_size,
    };

    let hit = ((ball.center_y(config) - paddle.y) / config.paddle_height).clamp(0.0, 1.0);
    let angle = (hit - 0.5) * FRAC_PI_2;

    ball.dx = side.outward() * angle.cos() * ball.speed;
    ball.dy = angle.sin() * ball.speed;

    speed_up(ball, config);
    true
}

/// Grow the scalar speed by the configured factor, capped at twice the
/// initial speed, and rescale `(dx, dy)` to match.
pub fn speed_up(ball: &mut Ball, config: &MatchConfig) {
    let cap = config.initial_ball_speed * config.max_speed_multiplier;
    ball.speed = (ball.speed * config.speed_growth).min(cap);

    let magnitude = ball.dx.hypot(ball.dy);
    if magnitude > 0.0 {
        let scale = ball.speed / magnitude;
        ball.dx *= scale;
        ball.dy *= scale;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> MatchConfig {
        MatchConfig::default()
    }

    fn ball_at(x: f64, y: f64, dx: f64, dy: f64) -> Ball {
        Ball { x, y, dx, dy, speed: dx.hypot(dy) }
    }

    #[test]
    fn test_top_wall_bounce() {
        let config = config();
        let mut ball = ball_at(400.0, -2.0, 3.0, -4.0);

        assert!(resolve_wall_collision(&mut ball, &config));
        assert_eq!(ball.dx, 3.0);
        assert_eq!(ball.dy, 4.0);
        assert_eq!(ball.y, 0.0);
    }

    #[test]
    fn test_bottom_wall_bounce() {
        let config = config();
        let mut ball = ball_at(400.0, 390.0, -3.0, 4.0);

        assert!(resolve_wall_collision(&mut ball, &config));
        assert_eq!(ball.dy, -4.0);
        assert_eq!(ball.y, 400.0 - 15.0);
    }

    #[test]
    fn test_no_wall_contact() {
        let config = config();
        let mut ball = ball_at(400.0, 200.0, 3.0, 4.0);
        let before = ball.clone();

        assert!(!resolve_wall_collision(&mut ball, &config));
        assert_eq!(ball, before);
    }

    #[test]
    fn test_left_paddle_center_hit() {
        let config = config();
        let paddle = Paddle::new(Side::Left, &config);
        // Ball centre level with paddle centre, overlapping the face
        let mut ball = ball_at(40.0, paddle.y + 40.0 - 7.5, -5.0, 0.0);

        assert!(resolve_paddle_collision(&mut ball, &paddle, Side::Left, &config));
        assert_eq!(ball.x, 45.0);
        assert!(ball.dx > 0.0);
        assert!(ball.dy.abs() < 1e-9);
        assert!((ball.speed - 5.25).abs() < 1e-9);
    }

    #[test]
    fn test_hit_near_top_goes_up() {
        let config = config();
        let paddle = Paddle::new(Side::Right, &config);
        let mut ball = ball_at(paddle.x - 5.0, paddle.y - 5.0, 5.0, 0.0);

        assert!(resolve_paddle_collision(&mut ball, &paddle, Side::Right, &config));
        assert!(ball.dx < 0.0);
        assert!(ball.dy < 0.0);
        assert_eq!(ball.x, paddle.x - 15.0);
        // Exit angle never exceeds 45 degrees
        assert!(ball.dy.abs() <= ball.dx.abs() + 1e-9);
    }

    #[test]
    fn test_receding_ball_ignored() {
        let config = config();
        let paddle = Paddle::new(Side::Left, &config);
        let mut ball = ball_at(40.0, paddle.y + 10.0, 5.0, 0.0);
        let before = ball.clone();

        assert!(!resolve_paddle_collision(&mut ball, &paddle, Side::Left, &config));
        assert_eq!(ball, before);
    }

    #[test]
    fn test_speed_cap() {
        let config = config();
        let mut ball = ball_at(0.0, 0.0, 9.9, 0.0);

        speed_up(&mut ball, &config);
        assert_eq!(ball.speed, 10.0);
        assert!((ball.dx - 10.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_wall_bounce_only_flips_dy(
            y in -20.0f64..420.0,
            dx in -10.0f64..10.0,
            dy in -10.0f64..10.0,
        ) {
            let config = config();
            let mut ball = ball_at(400.0, y, dx, dy);

            if resolve_wall_collision(&mut ball, &config) {
                prop_assert_eq!(ball.dx, dx);
                prop_assert_eq!(ball.dy, -dy);
            } else {
                prop_assert_eq!(ball.dy, dy);
            }
            prop_assert!(ball.y >= 0.0 && ball.y <= 385.0);
        }

        #[test]
        fn prop_paddle_hit_speed_and_norm(
            offset in -14.0f64..80.0,
            speed in 5.0f64..10.0,
            angle in -0.7f64..0.7,
        ) {
            let config = config();
            let paddle = Paddle::new(Side::Left, &config);
            let mut ball = Ball {
                x: 40.0,
                y: paddle.y + offset,
                dx: -angle.cos() * speed,
                dy: angle.sin() * speed,
                speed,
            };

            prop_assert!(resolve_paddle_collision(&mut ball, &paddle, Side::Left, &config));
            let expected = (speed * 1.05).min(10.0);
            prop_assert!((ball.speed - expected).abs() < 1e-9);
            prop_assert!((ball.dx.hypot(ball.dy) - ball.speed).abs() < 1e-9);
            prop_assert!(ball.dx > 0.0);
        }
    }
}
