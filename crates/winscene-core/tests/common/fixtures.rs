//! Recording collaborators and session builders.
//!
//! The stage, channel and surface doubles record every call so tests can
//! assert on what the session pushed outward. `EventLog` subscribes to all
//! notification kinds of a session.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use winscene_core::collaborators::{
    EventChannel, IdentityToken, RenderSurfaceHandle, SessionStage, SurfaceNode,
};
use winscene_core::config::SessionConfig;
use winscene_core::error::{SessionError, SessionResult};
use winscene_core::input::{KeyEvent, PointerEvent};
use winscene_core::notify::{EventKind, SessionEvent};
use winscene_core::property::{WindowProperty, WindowType};
use winscene_core::rect::{Rect, SizeChangeReason};
use winscene_core::session::{ConnectParams, SessionId};
use winscene_core::{Session, SessionRegistry, SessionState};

static NEXT_NODE: AtomicU64 = AtomicU64::new(100);

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// RecordingStage
// ---------------------------------------------------------------------------

/// One call made into the client stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageCall {
    SetActive(bool),
    Focus(bool),
    Rect(Rect, SizeChangeReason),
    Foreground,
    Background,
    Interactive(bool),
    Back,
}

#[derive(Default)]
pub struct RecordingStage {
    calls: Mutex<Vec<StageCall>>,
    fail_back: AtomicBool,
}

impl RecordingStage {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<StageCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &StageCall) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    pub fn fail_back_events(&self) {
        self.fail_back.store(true, Ordering::SeqCst);
    }

    fn push(&self, call: StageCall) {
        lock(&self.calls).push(call);
    }
}

impl SessionStage for RecordingStage {
    fn set_active(&self, active: bool) {
        self.push(StageCall::SetActive(active));
    }

    fn update_focus(&self, focused: bool) {
        self.push(StageCall::Focus(focused));
    }

    fn update_rect(&self, rect: Rect, reason: SizeChangeReason) {
        self.push(StageCall::Rect(rect, reason));
    }

    fn notify_session_foreground(&self) {
        self.push(StageCall::Foreground);
    }

    fn notify_session_background(&self) {
        self.push(StageCall::Background);
    }

    fn notify_foreground_interactive_status(&self, interactive: bool) {
        self.push(StageCall::Interactive(interactive));
    }

    fn handle_back_event(&self) -> SessionResult<()> {
        self.push(StageCall::Back);
        if self.fail_back.load(Ordering::SeqCst) {
            return Err(SessionError::InvalidOperation("stage refused back".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingChannel
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingChannel {
    keys: Mutex<Vec<KeyEvent>>,
    pointers: Mutex<Vec<PointerEvent>>,
}

impl RecordingChannel {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keys(&self) -> Vec<KeyEvent> {
        lock(&self.keys).clone()
    }

    pub fn pointers(&self) -> Vec<PointerEvent> {
        lock(&self.pointers).clone()
    }
}

impl EventChannel for RecordingChannel {
    fn transfer_key_event(&self, event: &KeyEvent) -> SessionResult<()> {
        lock(&self.keys).push(*event);
        Ok(())
    }

    fn transfer_pointer_event(&self, event: &PointerEvent) -> SessionResult<()> {
        lock(&self.pointers).push(*event);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSurface
// ---------------------------------------------------------------------------

pub struct RecordingSurface {
    id: u64,
    attached: Mutex<Option<RenderSurfaceHandle>>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    fail_attach: AtomicBool,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_NODE.fetch_add(1, Ordering::Relaxed),
            attached: Mutex::new(None),
            attaches: AtomicUsize::new(0),
            detaches: AtomicUsize::new(0),
            fail_attach: AtomicBool::new(false),
        })
    }

    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.attached).is_some()
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detaches(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

impl SurfaceNode for RecordingSurface {
    fn id(&self) -> u64 {
        self.id
    }

    fn attach(&self, handle: &RenderSurfaceHandle) -> SessionResult<()> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(SessionError::Surface("attach refused".to_string()));
        }
        self.attaches.fetch_add(1, Ordering::SeqCst);
        *lock(&self.attached) = Some(*handle);
        Ok(())
    }

    fn detach(&self) {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        *lock(&self.attached) = None;
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Every notification fired by the sessions it is attached to.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(SessionId, SessionEvent)>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every kind on `session`.
    pub async fn attach(&self, session: &Session) {
        for kind in EventKind::ALL {
            let events = Arc::clone(&self.events);
            session
                .set_callback(
                    kind,
                    Arc::new(move |id, event| lock(&events).push((id, event.clone()))),
                )
                .await
                .expect("register callback");
        }
    }

    pub fn events(&self) -> Vec<(SessionId, SessionEvent)> {
        lock(&self.events).clone()
    }

    pub fn of(&self, id: SessionId) -> Vec<SessionEvent> {
        lock(&self.events)
            .iter()
            .filter(|(owner, _)| *owner == id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self, id: SessionId, kind: EventKind) -> usize {
        self.of(id).iter().filter(|e| e.kind() == kind).count()
    }

    /// States entered by `id`, in order.
    pub fn states(&self, id: SessionId) -> Vec<SessionState> {
        self.of(id)
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::StateChange { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

// ---------------------------------------------------------------------------
// Client: one connected client's collaborators
// ---------------------------------------------------------------------------

pub struct Client {
    pub stage: Arc<RecordingStage>,
    pub channel: Arc<RecordingChannel>,
    pub surface: Arc<RecordingSurface>,
    pub token: IdentityToken,
    pub pid: i32,
}

impl Client {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            stage: RecordingStage::new(),
            channel: RecordingChannel::new(),
            surface: RecordingSurface::new(),
            token: IdentityToken::new(token),
            pid: 4242,
        }
    }

    pub fn params(&self, property: WindowProperty) -> ConnectParams {
        ConnectParams::new(self.stage.clone(), self.channel.clone(), property)
            .with_surface(self.surface.clone())
            .with_token(self.token.clone())
            .with_pid(self.pid, 1000)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub const SCREEN: Rect = Rect::new(0, 0, 1280, 800);

#[must_use]
pub fn registry() -> SessionRegistry {
    SessionRegistry::new(SessionConfig::default())
}

#[must_use]
pub fn pc_registry() -> SessionRegistry {
    let mut config = SessionConfig::default();
    config.device.is_pc_window = true;
    SessionRegistry::new(config)
}

/// Default rect per window type: mains fill the screen, the rest are small.
#[must_use]
pub fn property(window_type: WindowType) -> WindowProperty {
    let rect = match window_type {
        WindowType::AppMainWindow => SCREEN,
        _ => Rect::new(100, 100, 400, 300),
    };
    WindowProperty::new(window_type).with_rect(rect)
}

/// A registered, connected session with its own event log attached.
pub async fn connected(
    registry: &SessionRegistry,
    window_type: WindowType,
    token: &str,
) -> (Session, Client, EventLog) {
    let log = EventLog::new();
    let (session, client) = connected_with(registry, window_type, token, &log).await;
    (session, client, log)
}

/// Like [`connected`], recording into a log shared with other sessions.
pub async fn connected_with(
    registry: &SessionRegistry,
    window_type: WindowType,
    token: &str,
    log: &EventLog,
) -> (Session, Client) {
    let session = registry.create(property(window_type));
    log.attach(&session).await;
    let client = Client::new(token);
    session
        .connect(client.params(property(window_type)))
        .await
        .expect("connect");
    (session, client)
}

/// Foreground an already connected session and drain its queue.
pub async fn show(session: &Session) {
    session
        .foreground(Some(property(session.window_type())), false)
        .await
        .expect("foreground");
    session.flush().await.expect("flush");
    assert_eq!(session.state(), SessionState::Foreground);
}

/// Connected, then foregrounded with the queue drained.
pub async fn shown(
    registry: &SessionRegistry,
    window_type: WindowType,
    token: &str,
) -> (Session, Client, EventLog) {
    let (session, client, log) = connected(registry, window_type, token).await;
    show(&session).await;
    (session, client, log)
}

/// Run `flush` until every session's queue and follow-up jobs are drained.
pub async fn settle(registry: &SessionRegistry, sessions: &[&Session]) {
    for _ in 0..3 {
        registry.flush_all().await.expect("flush registry");
        for session in sessions {
            match session.flush().await {
                Ok(()) | Err(SessionError::DestroyedObject) => {}
                Err(err) => panic!("flush failed: {err}"),
            }
        }
    }
}
