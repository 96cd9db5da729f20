//! Window sessions.
//!
//! A [`Session`] is a cheap, cloneable handle. The state it controls lives
//! in a [`SessionInner`] owned exclusively by the session's worker task;
//! every operation is posted to that worker's queue and runs in submission
//! order. Other sessions observe a session only through its published
//! [`SessionSnapshot`] or by posting jobs to its queue.
//!
//! Operations are split by window category:
//!
//! - `inner`: state storage, transitions, active/focus, rect check
//! - `scene`: connect/reconnect, foreground/background, disconnect, teardown
//! - `main_window`: dialog binding and top-level window rules
//! - `system_window`: permission-gated show/hide and overlay input rules
//! - `floating_ball`: the floating-ball sub-lifecycle
//! - `dispatch`: the keyed property-update dispatcher

mod dispatch;
mod floating_ball;
mod inner;
mod main_window;
mod scene;
mod system_window;

use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use self::floating_ball::{FloatingBall, FloatingBallState};
pub use self::dispatch::SUB_WINDOW_Z_LEVEL_RANGE;
pub use self::main_window::MAX_LABEL_LEN;
pub(crate) use self::inner::SessionInner;

use crate::category::WindowCategory;
use crate::collaborators::{
    EventChannel, IdentityToken, RenderSurfaceHandle, SessionStage, SurfaceNode,
};
use crate::config::{LimitsConfig, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::notify::{EventKind, Handler};
use crate::property::{WindowProperty, WindowType};
use crate::queue::TaskQueue;
use crate::rect::Rect;
use crate::registry::RegistryShared;
use crate::state::{RecentSessionState, SessionState};

/// Stable identifier assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collaborators and client state handed over by connect and reconnect.
///
/// Every collaborator is optional so a missing one can be reported as
/// [`SessionError::NullArgument`] instead of being unrepresentable.
#[derive(Clone, Default)]
pub struct ConnectParams {
    pub stage: Option<Arc<dyn SessionStage>>,
    pub channel: Option<Arc<dyn EventChannel>>,
    pub surface_node: Option<Arc<dyn SurfaceNode>>,
    pub property: Option<WindowProperty>,
    pub token: Option<IdentityToken>,
    /// `-1` when unknown
    pub pid: i32,
    pub uid: i32,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("stage", &self.stage.is_some())
            .field("channel", &self.channel.is_some())
            .field("surface_node", &self.surface_node.is_some())
            .field("property", &self.property.as_ref().map(|p| p.window_type))
            .field("token", &self.token)
            .field("pid", &self.pid)
            .field("uid", &self.uid)
            .finish()
    }
}

impl ConnectParams {
    pub fn new(
        stage: Arc<dyn SessionStage>,
        channel: Arc<dyn EventChannel>,
        property: WindowProperty,
    ) -> Self {
        Self {
            stage: Some(stage),
            channel: Some(channel),
            surface_node: None,
            property: Some(property),
            token: None,
            pid: -1,
            uid: -1,
        }
    }

    #[must_use]
    pub fn with_surface(mut self, node: Arc<dyn SurfaceNode>) -> Self {
        self.surface_node = Some(node);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: IdentityToken) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn with_pid(mut self, pid: i32, uid: i32) -> Self {
        self.pid = pid;
        self.uid = uid;
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: WindowProperty) -> Self {
        self.property = Some(property);
        self
    }
}

/// System configuration handed back to the client on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectReply {
    pub session_id: SessionId,
    pub limits: LimitsConfig,
    pub is_pc_window: bool,
}

/// Client-reported exception.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(default)]
    pub token: Option<IdentityToken>,
    #[serde(default)]
    pub error_code: i32,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub need_remove_session: bool,
}

/// Termination request from the client runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TerminateInfo {
    #[serde(default)]
    pub token: Option<IdentityToken>,
    #[serde(default)]
    pub reason: String,
}

/// Read-only view of a session, published after every job.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub category: WindowCategory,
    pub state: SessionState,
    pub recent_state: RecentSessionState,
    pub is_active: bool,
    pub is_focused: bool,
    pub surface: Option<RenderSurfaceHandle>,
    pub parent: Option<SessionId>,
    pub dialogs: Vec<SessionId>,
    pub is_terminating: bool,
    pub exception_reported: bool,
    pub need_remove: bool,
    pub lock_state: bool,
    pub label: String,
    pub specified_flag: String,
    pub foreground_interactive: bool,
    pub exit_split_on_background: bool,
    pub pointer_area: Option<Rect>,
    pub floating_ball: FloatingBallState,
    pub property: WindowProperty,
}

impl SessionSnapshot {
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// A dialog in this state keeps its parent from receiving input.
    #[must_use]
    pub fn blocks_parent(&self) -> bool {
        self.category == WindowCategory::Dialog
            && !self.state.is_terminal()
            && (self.state.is_visible() || self.is_active)
    }
}

/// Non-owning reference to another session.
#[derive(Clone)]
pub struct Link {
    pub id: SessionId,
    pub handle: WeakSession,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Link({})", self.id)
    }
}

/// Parent/dialog relations; written only by the owning session's worker.
#[derive(Debug, Clone, Default)]
pub struct SessionLinks {
    pub parent: Option<Link>,
    pub dialogs: Vec<Link>,
}

pub(crate) struct SessionShared {
    id: SessionId,
    category: WindowCategory,
    window_type: WindowType,
    queue: TaskQueue<SessionInner>,
    snapshot: watch::Receiver<SessionSnapshot>,
    links: Arc<RwLock<SessionLinks>>,
}

/// Handle to one window session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("category", &self.shared.category)
            .field("state", &self.state())
            .finish()
    }
}

/// Weak counterpart of [`Session`].
#[derive(Clone)]
pub struct WeakSession(Weak<SessionShared>);

impl WeakSession {
    #[must_use]
    pub fn upgrade(&self) -> Option<Session> {
        self.0.upgrade().map(|shared| Session { shared })
    }
}

impl Session {
    /// Create a standalone session in `Initial`, outside any registry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(id: SessionId, property: WindowProperty, config: Arc<SessionConfig>) -> Self {
        Self::spawn(id, property, config, Weak::new(), SessionState::Initial)
    }

    pub(crate) fn spawn(
        id: SessionId,
        property: WindowProperty,
        config: Arc<SessionConfig>,
        registry: Weak<RegistryShared>,
        initial: SessionState,
    ) -> Self {
        let category = WindowCategory::from_window_type(property.window_type);
        let window_type = property.window_type;
        let links = Arc::new(RwLock::new(SessionLinks::default()));
        let (queue, worker) = TaskQueue::new();
        let (inner, snapshot) = SessionInner::new(
            id,
            property,
            config,
            initial,
            Arc::clone(&links),
            queue.downgrade(),
            registry,
        );
        worker.spawn_in(inner, crate::logging::session_span(id, category, window_type));
        tracing::debug!(session_id = %id, category = %category, state = %initial, "session created");
        Self {
            shared: Arc::new(SessionShared {
                id,
                category,
                window_type,
                queue,
                snapshot,
                links,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    #[must_use]
    pub fn category(&self) -> WindowCategory {
        self.shared.category
    }

    #[must_use]
    pub fn window_type(&self) -> WindowType {
        self.shared.window_type
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakSession {
        WeakSession(Arc::downgrade(&self.shared))
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.snapshot.borrow().state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.snapshot.borrow().is_active
    }

    pub(crate) fn blocks_parent(&self) -> bool {
        self.shared.snapshot.borrow().blocks_parent()
    }

    pub(crate) fn queue(&self) -> &TaskQueue<SessionInner> {
        &self.shared.queue
    }

    fn links(&self) -> RwLockReadGuard<'_, SessionLinks> {
        match self.shared.links.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Currently bound parent, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Session> {
        self.links().parent.as_ref().and_then(|link| link.handle.upgrade())
    }

    /// Bound dialogs that are still alive, in binding order.
    #[must_use]
    pub fn dialogs(&self) -> Vec<Session> {
        self.links()
            .dialogs
            .iter()
            .filter_map(|link| link.handle.upgrade())
            .collect()
    }

    /// Wait until every job queued so far, and its follow-ups, has run.
    pub async fn flush(&self) -> SessionResult<()> {
        self.shared.queue.flush().await
    }

    /// Wait until the published state equals `state`.
    pub async fn wait_for_state(&self, state: SessionState) -> SessionResult<()> {
        let mut rx = self.shared.snapshot.clone();
        rx.wait_for(|snapshot| snapshot.state == state)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::DestroyedObject)
    }

    /// Install the handler for `kind`, replacing any previous one.
    pub async fn set_callback(&self, kind: EventKind, handler: Handler) -> SessionResult<()> {
        self.shared
            .queue
            .call(move |inner| {
                inner.set_callback(kind, handler);
                Ok(())
            })
            .await
    }

    pub async fn clear_callback(&self, kind: EventKind) -> SessionResult<()> {
        self.shared
            .queue
            .call(move |inner| {
                inner.callbacks.clear(kind);
                Ok(())
            })
            .await
    }
}
