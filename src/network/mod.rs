//! Network Layer
//!
//! WebSocket server, rooms, and the wire protocol.
//! All physics runs through `game/`; this layer owns timing and I/O.

pub mod identity;
pub mod protocol;
pub mod session;
pub mod server;

pub use identity::{
    AuthConfig, Handshake, IdentityLookup, JwtNameLookup, QueryNameLookup, TokenClaims,
    TokenError, TokenVerifier,
};
pub use protocol::{ClientMessage, ServerMessage, InitInfo, ReadyInfo, GameOverInfo};
pub use session::{MatchSession, RoomRegistry, SessionConfig, SessionError, TickOutcome};
pub use server::{GameServer, ServerConfig, GameServerError};
