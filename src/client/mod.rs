//! Client Side
//!
//! A WebSocket client for the match server and the local predictor
//! that renders own-paddle movement ahead of server snapshots.

pub mod connection;
pub mod predictor;

pub use connection::{ClientError, ClientEvent, MatchClient};
pub use predictor::{ClientPhase, Predictor, PredictorConfig};
