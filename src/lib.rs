//! # Pong Arena Server
//!
//! Authoritative realtime server for two-player Pong, plus the client
//! pieces needed to play against it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PONG ARENA SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Seeded randomness                         │
//! │  └── rng.rs      - Xorshift PRNG, per-room seed derivation   │
//! │                                                              │
//! │  game/           - Physics kernel (no I/O)                   │
//! │  ├── state.rs    - Board, paddles, ball                      │
//! │  ├── input.rs    - Paddle intent                             │
//! │  ├── collision.rs- Wall and paddle bounces                   │
//! │  ├── tick.rs     - One simulation step, scoring              │
//! │  └── phase.rs    - Countdown / pause state machine           │
//! │                                                              │
//! │  network/        - Server side                               │
//! │  ├── protocol.rs - JSON wire messages                        │
//! │  ├── identity.rs - Handshake parsing, display names          │
//! │  ├── session.rs  - Match sessions and the room registry      │
//! │  └── server.rs   - WebSocket accept loop and tick drivers    │
//! │                                                              │
//! │  history.rs      - Finished-match sinks                      │
//! │                                                              │
//! │  client/         - Client side                               │
//! │  ├── connection.rs - WebSocket client                        │
//! │  └── predictor.rs  - Local prediction and reconciliation     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Only the server advances the ball and keeps score. Clients send
//! paddle intent and render snapshots; the own paddle is predicted
//! locally and corrected when it drifts too far from the server.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod core;
pub mod game;
pub mod history;
pub mod network;

// Re-export commonly used types
pub use core::rng::SeededRng;
pub use game::input::PaddleIntent;
pub use game::state::{Ball, GameState, Paddle, Side};
pub use game::tick::MatchConfig;
pub use network::protocol::{ClientMessage, ServerMessage};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
