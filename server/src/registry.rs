//! Live connection tracking and broadcast fan-out.
//!
//! Both transports (newline-delimited TCP stream and discrete WebSocket
//! messages) register here behind the same outbound-queue capability: a
//! session is a per-connection sender whose writer task adapts payloads to
//! the concrete transport. A second `Mutex` (separate from the world lock)
//! guards the registry; the two are never held at the same time.

use log::info;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// How the payload leaves the process once the writer task dequeues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Newline-terminated messages over a raw byte stream.
    Stream,
    /// Self-delimited discrete messages (WebSocket text frames).
    Message,
}

#[derive(Debug)]
pub struct Session {
    pub id: u32,
    pub kind: TransportKind,
    pub outbound: mpsc::UnboundedSender<String>,
    pub player_id: Option<u32>,
    pub last_seen: Instant,
}

impl Session {
    pub fn new(id: u32, kind: TransportKind, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            kind,
            outbound,
            player_id: None,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<u32, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        info!("Session {} registered ({:?})", session.id, session.kind);
        self.sessions.insert(session.id, session);
    }

    /// Removes and returns a session. Teardown funnels through this call:
    /// the first caller gets the session, every later caller gets `None`,
    /// which makes repeated or concurrent teardown of one id a no-op.
    pub fn take(&mut self, id: u32) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn touch(&mut self, id: u32) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.last_seen = Instant::now();
        }
    }

    pub fn set_player(&mut self, id: u32, player_id: u32) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.player_id = Some(player_id);
        }
    }

    pub fn player_of(&self, id: u32) -> Option<u32> {
        self.sessions.get(&id).and_then(|s| s.player_id)
    }

    /// Queues a payload for one session. Returns false if the session is
    /// gone or its writer task has exited.
    pub fn send_to(&self, id: u32, payload: &str) -> bool {
        match self.sessions.get(&id) {
            Some(session) => session.outbound.send(payload.to_string()).is_ok(),
            None => false,
        }
    }

    /// Delivers a pre-serialized event to every live session across both
    /// transport kinds. A failed delivery never aborts the pass; the failed
    /// session ids are returned for teardown after the iteration completes.
    /// Each session observes its broadcasts in enqueue order.
    pub fn broadcast(&self, payload: &str) -> Vec<u32> {
        let mut failed = Vec::new();
        for session in self.sessions.values() {
            if session.outbound.send(payload.to_string()).is_err() {
                failed.push(session.id);
            }
        }
        failed
    }

    /// Same as `broadcast`, skipping one session (the event's originator).
    pub fn broadcast_except(&self, payload: &str, except: u32) -> Vec<u32> {
        let mut failed = Vec::new();
        for session in self.sessions.values() {
            if session.id == except {
                continue;
            }
            if session.outbound.send(payload.to_string()).is_err() {
                failed.push(session.id);
            }
        }
        failed
    }

    /// Sessions idle past the heartbeat timeout.
    pub fn timed_out(&self, timeout: Duration) -> Vec<u32> {
        self.sessions
            .values()
            .filter(|s| s.is_timed_out(timeout))
            .map(|s| s.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u32) -> (Session, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(id, TransportKind::Stream, tx), rx)
    }

    #[test]
    fn test_insert_and_take() {
        let mut registry = SessionRegistry::new();
        let (s, _rx) = session(1);
        registry.insert(s);
        assert_eq!(registry.len(), 1);

        assert!(registry.take(1).is_some());
        // Second take of the same id is a no-op.
        assert!(registry.take(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_unknown_session_fails() {
        let registry = SessionRegistry::new();
        assert!(!registry.send_to(99, "x"));
    }

    #[test]
    fn test_broadcast_reaches_every_live_session() {
        let mut registry = SessionRegistry::new();
        let (s1, mut rx1) = session(1);
        let (s2, mut rx2) = session(2);
        registry.insert(s1);
        registry.insert(s2);

        let failed = registry.broadcast("hello");
        assert!(failed.is_empty());
        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_broadcast_tolerates_partial_failure() {
        let mut registry = SessionRegistry::new();
        let (s1, rx1) = session(1);
        let (s2, mut rx2) = session(2);
        registry.insert(s1);
        registry.insert(s2);

        // Session 1's writer task is gone.
        drop(rx1);

        let failed = registry.broadcast("event");
        assert_eq!(failed, vec![1]);
        // Delivery to session 2 still happened.
        assert_eq!(rx2.try_recv().unwrap(), "event");
        // Failing sessions are only reported, never removed mid-iteration.
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_broadcast_except_skips_originator() {
        let mut registry = SessionRegistry::new();
        let (s1, mut rx1) = session(1);
        let (s2, mut rx2) = session(2);
        registry.insert(s1);
        registry.insert(s2);

        registry.broadcast_except("event", 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), "event");
    }

    #[test]
    fn test_per_session_fifo_order() {
        let mut registry = SessionRegistry::new();
        let (s1, mut rx1) = session(1);
        registry.insert(s1);

        registry.broadcast("first");
        registry.broadcast("second");
        registry.send_to(1, "third");

        assert_eq!(rx1.try_recv().unwrap(), "first");
        assert_eq!(rx1.try_recv().unwrap(), "second");
        assert_eq!(rx1.try_recv().unwrap(), "third");
    }

    #[test]
    fn test_timed_out_sessions_are_reported() {
        let mut registry = SessionRegistry::new();
        let (mut s1, _rx1) = session(1);
        let (s2, _rx2) = session(2);
        s1.last_seen = Instant::now() - Duration::from_secs(60);
        registry.insert(s1);
        registry.insert(s2);

        let stale = registry.timed_out(Duration::from_secs(15));
        assert_eq!(stale, vec![1]);
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let mut registry = SessionRegistry::new();
        let (mut s1, _rx1) = session(1);
        s1.last_seen = Instant::now() - Duration::from_secs(60);
        registry.insert(s1);

        registry.touch(1);
        assert!(registry.timed_out(Duration::from_secs(15)).is_empty());
    }
}
