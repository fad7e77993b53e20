//! Table Spectate Server Library
//!
//! Delayed spectator broadcast for live poker tables: per-room spectator
//! policy and capacity, a rolling snapshot history, and fan-out to
//! registered spectators that runs outside the room lock.

pub mod config;
pub mod metrics;
pub mod spectate;
