//! Core primitives.
//!
//! Reproducible randomness shared by the simulation and the session layer.

pub mod rng;

// Re-export core types
pub use rng::{SeededRng, derive_room_seed};
