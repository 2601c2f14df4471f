//! Server-side sessions keyed by a cookie id.
//!
//! A request holds its session's lock from `open` until `commit`, so two
//! requests carrying the same session cookie run one after the other.
//!
//! Sessions idle for longer than the store's lifetime are dropped: the
//! expired id is refused when it comes back, and every new session sweeps
//! the store of the ones nobody has touched in time.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Session key holding the signed-in flag
pub const AUTHENTICATED_KEY: &str = "_authenticated";

pub type SessionData = Map<String, Value>;

/// Idle time after which a session is forgotten, unless configured
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(1440);

type SessionCell = Arc<Mutex<SessionData>>;

struct Entry {
    cell: SessionCell,
    last_access: Instant,
}

impl Entry {
    fn new(cell: SessionCell) -> Self {
        Self {
            cell,
            last_access: Instant::now(),
        }
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Process-wide session storage
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    lifetime: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_lifetime(DEFAULT_LIFETIME)
    }
}

/// What the transport must tell the client after a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCookie {
    /// Client already holds the right id
    Unchanged,
    /// Send this id to the client
    Set(String),
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Open the session for a cookie value, or start a new one
    ///
    /// Ids not known to the store, or expired, are never adopted; a fresh id
    /// is issued.
    pub async fn open(&self, id: Option<&str>) -> Session {
        let existing = match id {
            Some(id) => self.touch(id).await.map(|cell| (id.to_string(), cell)),
            None => None,
        };

        match existing {
            Some((id, cell)) => {
                let data = cell.clone().lock_owned().await;
                Session::from_parts(id, cell, data, false)
            }
            None => {
                let id = new_session_id();
                let cell: SessionCell = Arc::new(Mutex::new(SessionData::new()));
                let data = cell.clone().lock_owned().await;

                let mut sessions = self.sessions.write().await;
                self.evict_expired(&mut sessions);
                sessions.insert(id.clone(), Entry::new(cell.clone()));
                drop(sessions);

                tracing::debug!(session_id = %id, "Started new session");
                Session::from_parts(id, cell, data, true)
            }
        }
    }

    /// Live session for `id`, marked as used now
    async fn touch(&self, id: &str) -> Option<SessionCell> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;

        if entry.last_access.elapsed() >= self.lifetime {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "Session expired");
            return None;
        }

        entry.last_access = Instant::now();
        Some(entry.cell.clone())
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, Entry>) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_access.elapsed() < self.lifetime);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, live = sessions.len(), "Evicted expired sessions");
        }
        evicted
    }

    /// Drop every session idle past the lifetime; returns how many went
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions)
    }

    /// Persist id changes and release the session lock
    ///
    /// A kept session is (re)inserted, so one evicted while its request
    /// was still running survives.
    pub async fn commit(&self, session: Session) -> SessionCookie {
        let Session {
            id,
            previous_id,
            cell,
            data,
            is_new,
        } = session;

        let mut sessions = self.sessions.write().await;
        if let Some(previous) = &previous_id {
            sessions.remove(previous);
        }

        // Brand-new sessions that never stored anything are not kept
        if is_new && data.is_empty() {
            sessions.remove(&id);
            return SessionCookie::Unchanged;
        }

        sessions.insert(id.clone(), Entry::new(cell));
        drop(data);

        if previous_id.is_some() {
            tracing::debug!(session_id = %id, "Session id regenerated");
            SessionCookie::Set(id)
        } else if is_new {
            SessionCookie::Set(id)
        } else {
            SessionCookie::Unchanged
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }
}

/// One client's session, locked for the duration of a request
pub struct Session {
    id: String,
    /// Id before `regenerate`, removed from the store on commit
    previous_id: Option<String>,
    cell: SessionCell,
    data: OwnedMutexGuard<SessionData>,
    is_new: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("is_new", &self.is_new)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Session {
    fn from_parts(
        id: String,
        cell: SessionCell,
        data: OwnedMutexGuard<SessionData>,
        is_new: bool,
    ) -> Self {
        Self {
            id,
            previous_id: None,
            cell,
            data,
            is_new,
        }
    }

    /// A session not backed by any store
    pub async fn detached() -> Self {
        let cell: SessionCell = Arc::new(Mutex::new(SessionData::new()));
        let data = cell.clone().lock_owned().await;
        Self::from_parts(new_session_id(), cell, data, true)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Raw JSON value stored under `key`
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Typed value stored under `key`; `None` if absent or of another shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key, value);
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Value not stored in session"),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Issue a new session id, keeping the data
    ///
    /// Only the first call per request has an effect.
    pub fn regenerate(&mut self) {
        if self.previous_id.is_some() {
            return;
        }
        let previous = std::mem::replace(&mut self.id, new_session_id());
        self.previous_id = Some(previous);
    }

    pub fn is_regenerated(&self) -> bool {
        self.previous_id.is_some()
    }

    /// Mark the session signed in (or out) and rotate its id
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.set(AUTHENTICATED_KEY, authenticated);
        self.regenerate();
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_or(AUTHENTICATED_KEY, false)
    }
}
