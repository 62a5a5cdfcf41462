//! Connection registry
//!
//! Bounded, insertion-ordered list of registered sessions behind one lock.

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};

use crate::error::RegistryError;
use crate::protocol::{DisplayName, Handle};

/// A registered connection
#[derive(Debug)]
pub struct Session {
    pub handle: Handle,
    /// Peer IP address, no port
    pub remote_address: String,
    pub display_name: DisplayName,
    /// Frames queued here are written to the socket by the connection's writer task
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl Session {
    pub fn new(
        handle: Handle,
        remote_address: String,
        display_name: DisplayName,
        outbound: mpsc::UnboundedSender<Bytes>,
    ) -> Self {
        Self {
            handle,
            remote_address,
            display_name,
            outbound,
        }
    }

    /// Queue a frame for this session. False if the connection is already gone.
    pub fn deliver(&self, frame: Bytes) -> bool {
        self.outbound.send(frame).is_ok()
    }
}

/// Outcome of [`Registry::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed { remaining: usize },
    /// Handle was not registered; nothing changed
    Absent,
}

impl Removal {
    /// True if this removal took the last session out
    pub fn emptied(&self) -> bool {
        matches!(self, Removal::Removed { remaining: 0 })
    }
}

/// Registry of live sessions
pub struct Registry {
    capacity: usize,
    sessions: Mutex<Vec<Session>>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sessions: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a session. Returns the new session count.
    pub async fn add(&self, session: Session) -> Result<usize, RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.iter().any(|s| s.handle == session.handle) {
            warn!("Session {} already registered", session.handle);
            return Err(RegistryError::DuplicateHandle(session.handle));
        }
        if sessions.len() >= self.capacity {
            warn!(
                "Registry full ({}), refusing {} from {}",
                self.capacity, session.display_name, session.remote_address
            );
            return Err(RegistryError::Full { capacity: self.capacity });
        }

        debug!("Registered session {}", session.handle);
        sessions.push(session);
        Ok(sessions.len())
    }

    /// Deregister a session, keeping the relative order of the rest
    pub async fn remove(&self, handle: Handle) -> Removal {
        let mut sessions = self.sessions.lock().await;
        match sessions.iter().position(|s| s.handle == handle) {
            Some(idx) => {
                sessions.remove(idx);
                Removal::Removed {
                    remaining: sessions.len(),
                }
            }
            None => Removal::Absent,
        }
    }

    /// Run `f` on every session except `handle`, with the lock held throughout
    pub async fn for_each_except<F>(&self, handle: Handle, mut f: F)
    where
        F: FnMut(&Session),
    {
        self.with_sessions(|sessions| {
            sessions.iter().filter(|s| s.handle != handle).for_each(|s| f(s));
        })
        .await
    }

    /// Run `f` on the whole session list with the lock held
    pub async fn with_sessions<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&[Session]) -> T,
    {
        let sessions = self.sessions.lock().await;
        f(&sessions)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn contains(&self, handle: Handle) -> bool {
        self.sessions.lock().await.iter().any(|s| s.handle == handle)
    }

    /// Registered handles in insertion order
    pub async fn handles(&self) -> Vec<Handle> {
        self.sessions.lock().await.iter().map(|s| s.handle).collect()
    }
}
