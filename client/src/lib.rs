//! Client-side core for the room-partitioned multiplayer game.
//!
//! The client keeps a predictive/interpolated model of the world: the
//! server connection is polled non-blockingly once per frame, broadcasts
//! update stored interpolation targets, and local input passes through
//! the collision resolver before becoming an outgoing update. Rendering
//! and raw input polling live outside this crate.

pub mod game;
pub mod input;
pub mod interp;
pub mod network;
