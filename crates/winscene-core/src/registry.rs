//! Session registry: id allocation and ownership of live sessions.
//!
//! The registry holds the only long-lived strong handles. A session removes
//! itself when it reaches END, which lets its worker stop once the last
//! outside handle is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::property::WindowProperty;
use crate::session::{Session, SessionId, SessionSnapshot};
use crate::state::SessionState;

pub(crate) struct RegistryShared {
    sessions: RwLock<BTreeMap<SessionId, Session>>,
    next_id: AtomicU64,
    config: Arc<SessionConfig>,
}

impl RegistryShared {
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SessionId, Session>> {
        match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SessionId, Session>> {
        match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn remove(&self, id: SessionId) -> Option<Session> {
        let removed = self.write().remove(&id);
        if removed.is_some() {
            debug!(session_id = %id, "session removed from registry");
        }
        removed
    }
}

/// Owner of every live session.
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<RegistryShared>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                sessions: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                config: Arc::new(config),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Create a session in CREATED. The category follows the property's
    /// window type and never changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(&self, property: WindowProperty) -> Session {
        let id = SessionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Session::spawn(
            id,
            property,
            Arc::clone(&self.shared.config),
            Arc::downgrade(&self.shared),
            SessionState::Created,
        );
        self.shared.write().insert(id, session.clone());
        info!(session_id = %id, category = %session.category(), "session registered");
        session
    }

    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.shared.read().get(&id).cloned()
    }

    /// Drop the registry's handle without tearing the session down.
    pub fn remove(&self, id: SessionId) -> Option<Session> {
        self.shared.remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.shared.read().keys().copied().collect()
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions().iter().map(Session::snapshot).collect()
    }

    fn sessions(&self) -> Vec<Session> {
        self.shared.read().values().cloned().collect()
    }

    pub async fn bind_dialog(&self, parent: SessionId, dialog: SessionId) -> SessionResult<()> {
        let parent = self.get(parent).ok_or(SessionError::InvalidSession(parent.0))?;
        let dialog = self.get(dialog).ok_or(SessionError::InvalidSession(dialog.0))?;
        parent.bind_dialog(&dialog).await
    }

    /// Flush every registered session's queue.
    pub async fn flush_all(&self) -> SessionResult<()> {
        for session in self.sessions() {
            match session.flush().await {
                Ok(()) | Err(SessionError::DestroyedObject) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
