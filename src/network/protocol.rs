//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is one JSON object tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::game::input::PaddleIntent;
use crate::game::state::{GameState, Side};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Current held keys, sent on change and as a keep-alive.
    Input(PaddleIntent),
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Side assignment plus the current state.
    Init(InitInfo),

    /// Both seats filled, countdown starting.
    Ready(ReadyInfo),

    /// Authoritative snapshot, once per tick while the ball is live.
    State {
        /// Full game state
        state: GameState,
    },

    /// Terminal result.
    GameOver(GameOverInfo),
}

/// Payload of `init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitInfo {
    /// Side the receiver controls.
    pub side: Side,
    /// Receiver's display name.
    pub name_you: String,
    /// Opponent's display name, null while waiting.
    pub name_opponent: Option<String>,
    /// State at the time of sending.
    pub state: GameState,
}

/// Payload of `ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyInfo {
    /// Opponent's display name.
    pub name_opponent: Option<String>,
    /// Countdown length in seconds.
    pub countdown: u32,
}

/// Payload of `gameOver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverInfo {
    /// Display name of the winner.
    pub winner: String,
    /// Left paddle's final score.
    pub score1: u32,
    /// Right paddle's final score.
    pub score2: u32,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Deserialize from a UTF-8 JSON byte frame.
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Init(_) => "init",
            ServerMessage::Ready(_) => "ready",
            ServerMessage::State { .. } => "state",
            ServerMessage::GameOver(_) => "gameOver",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::SeededRng;
    use crate::game::tick::MatchConfig;

    fn sample_state() -> GameState {
        GameState::new(&MatchConfig::default(), &mut SeededRng::new(9))
    }

    #[test]
    fn test_input_wire_format() {
        let msg = ClientMessage::from_json(r#"{"type":"input","up":true,"down":false}"#).unwrap();
        assert_eq!(msg, ClientMessage::Input(PaddleIntent::new(true, false)));

        let json = ClientMessage::Input(PaddleIntent::new(false, true)).to_json().unwrap();
        assert!(json.contains(r#""type":"input""#));
        assert!(json.contains(r#""down":true"#));
    }

    #[test]
    fn test_unknown_client_messages_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"chat","text":"hi"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"up":true}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_slice(&[0xff, 0x00]).is_err());
    }

    #[test]
    fn test_binary_frame_input() {
        let msg = ClientMessage::from_slice(br#"{"type":"input","down":true}"#).unwrap();
        assert_eq!(msg, ClientMessage::Input(PaddleIntent::new(false, true)));
    }

    #[test]
    fn test_init_wire_format() {
        let msg = ServerMessage::Init(InitInfo {
            side: Side::Left,
            name_you: "alice".to_string(),
            name_opponent: None,
            state: sample_state(),
        });

        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["side"], "left");
        assert_eq!(value["nameYou"], "alice");
        assert!(value["nameOpponent"].is_null());
        assert!(value["state"]["leftPaddle"].is_object());
    }

    #[test]
    fn test_ready_and_game_over_wire_format() {
        let ready = ServerMessage::Ready(ReadyInfo {
            name_opponent: Some("bob".to_string()),
            countdown: 3,
        });
        let value: serde_json::Value = serde_json::from_str(&ready.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ready");
        assert_eq!(value["nameOpponent"], "bob");
        assert_eq!(value["countdown"], 3);

        let over = ServerMessage::GameOver(GameOverInfo {
            winner: "bob".to_string(),
            score1: 2,
            score2: 5,
        });
        let json = over.to_json().unwrap();
        assert!(json.contains(r#""type":"gameOver""#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), over);
    }

    #[test]
    fn test_state_message_parses_back() {
        let msg = ServerMessage::State { state: sample_state() };
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed.kind(), "state");
    }
}
