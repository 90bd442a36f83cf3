//! Watch sessions: which socket is interested in which entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::frame;

/// Identifier of one live-reload socket.
pub(crate) type SessionId = u64;

struct Session {
    entry: Option<String>,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
}

/// Registry of connected live-reload sockets.
///
/// A socket's entry interest is only changed by that socket's own
/// connection task; notifications only read the registry.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// Register a socket. Frames pushed to `outbox` are written to it.
    pub fn connect(&self, outbox: mpsc::UnboundedSender<Vec<u8>>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .lock()
            .unwrap()
            .insert(id, Session { entry: None, outbox });
        id
    }

    /// Set the entry a socket watches, replacing any earlier interest.
    pub fn watch(&self, id: SessionId, entry: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&id) {
            session.entry = Some(entry.to_owned());
        }
    }

    pub fn disconnect(&self, id: SessionId) {
        self.sessions.lock().unwrap().remove(&id);
    }

    /// Entry watched by a socket.
    pub fn watched(&self, id: SessionId) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|s| s.entry.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Send an `update` frame to every socket watching `entry`.
    ///
    /// Returns the number of sockets notified.
    pub fn notify(&self, entry: &str) -> usize {
        let Ok(update) = frame::text("update") else {
            return 0;
        };

        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .filter(|s| s.entry.as_deref() == Some(entry))
            .filter(|s| s.outbox.send(update.clone()).is_ok())
            .count()
    }
}
