//! Authoritative server for the room-partitioned multiplayer core.
//!
//! The server owns the canonical world state (room -> players, objects,
//! enemies) and the registry of live sessions across both transports.
//! Session handlers mutate the world under its single store lock, room
//! transitions and broadcasts publish the result, and the pursuit AI runs
//! against the same store on its own tick.
//!
//! Shared mutable state is guarded by exactly two locks - one for the
//! world store, one for the session registry - and the two are never held
//! at the same time. Everything reaches the components through an owned
//! [`ServerContext`] rather than globals.

pub mod ai;
pub mod net;
pub mod registry;
pub mod world;

use registry::SessionRegistry;
use std::sync::atomic::AtomicBool;
use tokio::sync::Mutex;
use world::World;

/// Shared server state handed to every task by `Arc`.
pub struct ServerContext {
    pub world: Mutex<World>,
    pub sessions: Mutex<SessionRegistry>,
    /// Cooperative shutdown flag; background tasks observe it at their
    /// next polling point.
    pub shutdown: AtomicBool,
}

impl ServerContext {
    pub fn new() -> Self {
        Self {
            world: Mutex::new(World::new()),
            sessions: Mutex::new(SessionRegistry::new()),
            shutdown: AtomicBool::new(false),
        }
    }
}

impl Default for ServerContext {
    fn default() -> Self {
        Self::new()
    }
}
