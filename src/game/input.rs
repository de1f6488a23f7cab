//! Paddle Intent
//!
//! A participant's held direction. Intent is state, not a command:
//! every new value overwrites the previous one and nothing is queued.

use serde::{Serialize, Deserialize};

/// Held up/down keys for one paddle.
///
/// Missing fields deserialize as `false`, so `{"up": true}` is a
/// valid intent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaddleIntent {
    /// Move toward `y = 0`.
    #[serde(default)]
    pub up: bool,
    /// Move toward the bottom wall.
    #[serde(default)]
    pub down: bool,
}

impl PaddleIntent {
    /// No keys held.
    pub const IDLE: PaddleIntent = PaddleIntent { up: false, down: false };

    /// Construct from raw flags.
    pub const fn new(up: bool, down: bool) -> Self {
        Self { up, down }
    }

    /// Net vertical direction: `-1` up, `1` down, `0` idle or both held.
    pub fn direction(self) -> f64 {
        match (self.up, self.down) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    /// Is any key held?
    pub fn is_active(self) -> bool {
        self.up || self.down
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        assert_eq!(PaddleIntent::new(true, false).direction(), -1.0);
        assert_eq!(PaddleIntent::new(false, true).direction(), 1.0);
        assert_eq!(PaddleIntent::new(true, true).direction(), 0.0);
        assert_eq!(PaddleIntent::IDLE.direction(), 0.0);
    }

    #[test]
    fn test_partial_payload_defaults() {
        let intent: PaddleIntent = serde_json::from_str(r#"{"down":true}"#).unwrap();
        assert_eq!(intent, PaddleIntent::new(false, true));

        let intent: PaddleIntent = serde_json::from_str("{}").unwrap();
        assert!(!intent.is_active());
    }

    #[test]
    fn test_non_boolean_rejected() {
        assert!(serde_json::from_str::<PaddleIntent>(r#"{"up":"yes"}"#).is_err());
    }
}
