//! Session state owned by the worker task, plus the helpers every category
//! shares: transitions, active/focus propagation, the rect check and
//! snapshot publication.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::floating_ball::FloatingBall;
use super::{Link, Session, SessionId, SessionLinks, SessionSnapshot};
use crate::category::{CategoryRules, WindowCategory};
use crate::collaborators::{
    EventChannel, IdentityToken, RenderSurfaceHandle, SessionStage, SurfaceNode,
};
use crate::config::SessionConfig;
use crate::error::{ResultCode, SessionError, SessionResult};
use crate::notify::{EventKind, Handler, SessionCallbacks, SessionEvent};
use crate::property::WindowProperty;
use crate::queue::{Job, QueueOwner, Step, WeakTaskQueue};
use crate::rect::{Rect, SizeBounds, SizeChangeReason};
use crate::registry::RegistryShared;
use crate::session::ExceptionInfo;
use crate::state::SessionState;

/// Top-level window attributes that live outside the property bag.
#[derive(Debug, Clone, Default)]
pub(crate) struct MainWindowState {
    pub(crate) lock_state: bool,
    pub(crate) label: String,
    pub(crate) specified_flag: String,
    pub(crate) foreground_interactive: bool,
    pub(crate) exit_split_on_background: bool,
}

/// Everything a session mutates. Only the session's worker touches it.
pub struct SessionInner {
    pub(crate) id: SessionId,
    pub(crate) category: WindowCategory,
    pub(crate) rules: &'static CategoryRules,
    pub(crate) config: Arc<SessionConfig>,
    pub(crate) state: SessionState,
    pub(crate) is_active: bool,
    pub(crate) is_focused: bool,
    pub(crate) property: WindowProperty,
    pub(crate) stage: Option<Arc<dyn SessionStage>>,
    pub(crate) channel: Option<Arc<dyn EventChannel>>,
    pub(crate) surface_node: Option<Arc<dyn SurfaceNode>>,
    pub(crate) surface: Option<RenderSurfaceHandle>,
    pub(crate) token: Option<IdentityToken>,
    pub(crate) calling_pid: i32,
    pub(crate) calling_uid: i32,
    pub(crate) callbacks: SessionCallbacks,
    pub(crate) exception_reported: bool,
    pub(crate) need_remove: bool,
    pub(crate) is_terminating: bool,
    /// Set once disconnect (or an internal failure) has queued teardown
    pub(crate) teardown_started: bool,
    pub(crate) main: MainWindowState,
    pub(crate) pointer_area: Option<Rect>,
    pub(crate) floating_ball: FloatingBall,
    links: Arc<RwLock<SessionLinks>>,
    queue: WeakTaskQueue<SessionInner>,
    registry: Weak<RegistryShared>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("state", &self.state)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    pub(crate) fn new(
        id: SessionId,
        property: WindowProperty,
        config: Arc<SessionConfig>,
        initial: SessionState,
        links: Arc<RwLock<SessionLinks>>,
        queue: WeakTaskQueue<SessionInner>,
        registry: Weak<RegistryShared>,
    ) -> (Self, watch::Receiver<SessionSnapshot>) {
        let category = WindowCategory::from_window_type(property.window_type);
        let placeholder = SessionSnapshot {
            id,
            category,
            state: initial,
            recent_state: initial.into(),
            is_active: false,
            is_focused: false,
            surface: None,
            parent: None,
            dialogs: Vec::new(),
            is_terminating: false,
            exception_reported: false,
            need_remove: false,
            lock_state: false,
            label: String::new(),
            specified_flag: String::new(),
            foreground_interactive: false,
            exit_split_on_background: false,
            pointer_area: None,
            floating_ball: Default::default(),
            property: property.clone(),
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(placeholder);
        let inner = Self {
            id,
            category,
            rules: category.rules(),
            config,
            state: initial,
            is_active: false,
            is_focused: false,
            property,
            stage: None,
            channel: None,
            surface_node: None,
            surface: None,
            token: None,
            calling_pid: -1,
            calling_uid: -1,
            callbacks: SessionCallbacks::default(),
            exception_reported: false,
            need_remove: false,
            is_terminating: false,
            teardown_started: false,
            main: MainWindowState::default(),
            pointer_area: None,
            floating_ball: FloatingBall::default(),
            links,
            queue,
            registry,
            snapshot_tx,
        };
        (inner, snapshot_rx)
    }

    // ── Notifications ────────────────────────────────────────────────

    pub(crate) fn fire(&self, event: SessionEvent) {
        self.callbacks.fire(self.id, &event);
    }

    pub(crate) fn set_callback(&mut self, kind: EventKind, handler: Handler) {
        self.callbacks.set(kind, handler);
        // Late LockState registrations learn the current lock immediately.
        if kind == EventKind::LockState && self.main.lock_state {
            self.fire(SessionEvent::LockState(true));
        }
    }

    // ── State machine ────────────────────────────────────────────────

    /// Move to `next`, firing StateChange. Equal states are a no-op.
    ///
    /// A missing edge is an internal invariant violation: the session
    /// reports it as an exception and tears itself down.
    pub(crate) fn transition(&mut self, next: SessionState) -> SessionResult<()> {
        let from = self.state;
        if from == next {
            return Ok(());
        }
        if !from.can_transition_to(next) {
            let message = format!("illegal transition {from} -> {next}");
            self.fail_internal(&message);
            return Err(SessionError::Internal(message));
        }
        self.state = next;
        info!(
            session_id = %self.id,
            category = %self.category,
            from = %from,
            to = %next,
            "session state changed"
        );
        self.fire(SessionEvent::StateChange { from, to: next });
        Ok(())
    }

    pub(crate) fn fail_internal(&mut self, message: &str) {
        error!(session_id = %self.id, state = %self.state, message, "session invariant violated");
        self.exception_reported = true;
        self.need_remove = true;
        self.fire(SessionEvent::Exception(ExceptionInfo {
            token: None,
            error_code: ResultCode::Internal.as_i32(),
            reason: message.to_string(),
            need_remove_session: true,
        }));
        if !self.teardown_started {
            self.teardown_started = true;
            self.post_self(Box::new(|inner: &mut SessionInner| inner.begin_teardown()));
        }
    }

    pub(crate) fn ensure_not_ended(&self) -> SessionResult<()> {
        if self.state.is_terminal() {
            return Err(SessionError::InvalidSession(self.id.0));
        }
        Ok(())
    }

    /// Connected and not torn down.
    pub(crate) fn ensure_valid(&self) -> SessionResult<()> {
        if !self.state.is_valid() {
            return Err(SessionError::InvalidSession(self.id.0));
        }
        Ok(())
    }

    pub(crate) fn require_category(
        &self,
        operation: &'static str,
        allowed: &[WindowCategory],
    ) -> SessionResult<()> {
        if allowed.contains(&self.category) {
            Ok(())
        } else {
            Err(SessionError::OperationNotSupported {
                operation,
                category: self.category,
            })
        }
    }

    pub(crate) fn check_token(&self, supplied: Option<&IdentityToken>) -> SessionResult<()> {
        let supplied = supplied.ok_or(SessionError::NullArgument("identity token"))?;
        if self.token.as_ref() != Some(supplied) {
            warn!(session_id = %self.id, "identity token mismatch");
            return Err(SessionError::IdentityMismatch);
        }
        Ok(())
    }

    // ── Active / focus ───────────────────────────────────────────────

    /// Record a new active flag, notify, and push it down to dialogs.
    pub(crate) fn apply_active(&mut self, active: bool) {
        if self.is_active == active {
            return;
        }
        self.is_active = active;
        debug!(session_id = %self.id, active, "active status changed");
        self.fire(SessionEvent::ActiveStatus(active));
        if self.category == WindowCategory::Main {
            for dialog in self.dialog_sessions() {
                let posted = dialog.queue().post(Box::new(move |child: &mut SessionInner| {
                    child.update_active_status(active);
                    Step::Done
                }));
                if posted.is_err() {
                    debug!(session_id = %self.id, dialog = %dialog.id(), "dialog gone, active not propagated");
                }
            }
        }
    }

    /// Change the active flag without a state transition.
    pub(crate) fn update_active_status(&mut self, active: bool) {
        if !self.state.is_valid() || self.is_active == active {
            return;
        }
        self.apply_active(active);
    }

    /// Activate or deactivate, moving between FOREGROUND/ACTIVE/INACTIVE.
    pub(crate) fn set_active(&mut self, active: bool) -> SessionResult<()> {
        self.ensure_valid()?;
        let edge = match (active, self.state) {
            (true, SessionState::Foreground | SessionState::Inactive) => Some(SessionState::Active),
            (false, SessionState::Active) => Some(SessionState::Inactive),
            _ => None,
        };
        if edge.is_none() && self.is_active == active {
            debug!(session_id = %self.id, active, "set_active unchanged");
            return Ok(());
        }
        if let Some(next) = edge {
            self.transition(next)?;
        }
        if let Some(stage) = &self.stage {
            stage.set_active(active);
        }
        self.apply_active(active);
        Ok(())
    }

    pub(crate) fn update_focus(&mut self, focused: bool) {
        if self.is_focused == focused {
            return;
        }
        self.is_focused = focused;
        if let Some(stage) = &self.stage {
            stage.update_focus(focused);
        }
        self.fire(SessionEvent::FocusChange(focused));
        if self.category == WindowCategory::Main {
            for dialog in self.dialog_sessions() {
                let _ = dialog.queue().post(Box::new(move |child: &mut SessionInner| {
                    child.update_focus(focused);
                    Step::Done
                }));
            }
        }
    }

    // ── Geometry ─────────────────────────────────────────────────────

    /// Clamp `(width, height)` against category minimums, the floating cap,
    /// client limits and `parent`. Never fails.
    pub(crate) fn rect_check_within(&self, width: u32, height: u32, parent: Option<Rect>) -> Rect {
        let limits = &self.config.limits;
        let bounds = SizeBounds::resolve(
            (self.rules.min_size)(limits),
            limits.max_floating_window_size,
            &self.property.limits,
            parent.as_ref(),
        );
        let (w, h) = bounds.clamp(width, height);
        if (w, h) != (width, height) {
            debug!(
                session_id = %self.id,
                requested_width = width,
                requested_height = height,
                width = w,
                height = h,
                "rect clamped"
            );
        }
        self.property.rect.with_size(w, h)
    }

    pub(crate) fn parent_rect(&self) -> Option<Rect> {
        self.parent_session().map(|parent| parent.snapshot().property.rect)
    }

    pub(crate) fn rect_check(&self, width: u32, height: u32) -> Rect {
        self.rect_check_within(width, height, self.parent_rect())
    }

    /// Apply a rect update; rect-affecting reasons pass through the check.
    pub(crate) fn update_rect(&mut self, rect: Rect, reason: SizeChangeReason) -> SessionResult<Rect> {
        self.ensure_not_ended()?;
        let applied = if reason.is_rect_affecting() {
            let parent = self.parent_rect();
            Rect {
                x: rect.x,
                y: rect.y,
                ..self.rect_check_within(rect.width, rect.height, parent)
            }
        } else {
            rect
        };
        self.apply_rect(applied, reason);
        Ok(applied)
    }

    pub(crate) fn apply_rect(&mut self, rect: Rect, reason: SizeChangeReason) {
        if self.property.rect == rect {
            return;
        }
        self.property.rect = rect;
        if let Some(stage) = &self.stage {
            stage.update_rect(rect, reason);
        }
        self.fire(SessionEvent::RectChange { rect, reason });
        if self.category == WindowCategory::Main {
            for dialog in self.dialog_sessions() {
                let _ = dialog.queue().post(Box::new(move |child: &mut SessionInner| {
                    child.reclamp_within(rect);
                    Step::Done
                }));
            }
        }
    }

    /// Re-run the rect check after the parent's rect changed.
    pub(crate) fn reclamp_within(&mut self, parent: Rect) {
        if self.state.is_terminal() || self.property.rect.is_empty() {
            return;
        }
        let current = self.property.rect;
        let clamped = self.rect_check_within(current.width, current.height, Some(parent));
        self.apply_rect(clamped, SizeChangeReason::Resize);
    }

    // ── Surface ──────────────────────────────────────────────────────

    /// Allocate and attach a render surface if one is not held yet.
    pub(crate) fn attach_surface(&mut self) -> SessionResult<()> {
        let Some(node) = self.surface_node.clone() else {
            return Ok(());
        };
        let handle = match self.surface {
            Some(handle) => handle,
            None => RenderSurfaceHandle::allocate(node.id()),
        };
        node.attach(&handle)?;
        if self.surface.is_none() {
            debug!(session_id = %self.id, surface = handle.id, "render surface attached");
        }
        self.surface = Some(handle);
        Ok(())
    }

    pub(crate) fn release_surface(&mut self) {
        if let Some(handle) = self.surface.take() {
            if let Some(node) = &self.surface_node {
                node.detach();
            }
            debug!(session_id = %self.id, surface = handle.id, "render surface released");
        }
    }

    // ── Links ────────────────────────────────────────────────────────

    pub(crate) fn read_links(&self) -> RwLockReadGuard<'_, SessionLinks> {
        match self.links.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn write_links(&self) -> RwLockWriteGuard<'_, SessionLinks> {
        match self.links.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn parent_session(&self) -> Option<Session> {
        self.read_links()
            .parent
            .as_ref()
            .and_then(|link| link.handle.upgrade())
    }

    pub(crate) fn dialog_sessions(&self) -> Vec<Session> {
        self.read_links()
            .dialogs
            .iter()
            .filter_map(|link| link.handle.upgrade())
            .collect()
    }

    pub(crate) fn set_parent(&self, parent: Option<Link>) {
        self.write_links().parent = parent;
    }

    // ── Queue plumbing ───────────────────────────────────────────────

    /// Queue a follow-up job on this session's own queue.
    pub(crate) fn post_self(&self, job: Job<SessionInner>) {
        if self.queue.post(job).is_err() {
            debug!(session_id = %self.id, "queue closed, follow-up dropped");
        }
    }

    pub(crate) fn registry(&self) -> Option<Arc<RegistryShared>> {
        self.registry.upgrade()
    }

    fn snapshot(&self) -> SessionSnapshot {
        let links = self.read_links();
        SessionSnapshot {
            id: self.id,
            category: self.category,
            state: self.state,
            recent_state: self.state.into(),
            is_active: self.is_active,
            is_focused: self.is_focused,
            surface: self.surface,
            parent: links.parent.as_ref().map(|link| link.id),
            dialogs: links.dialogs.iter().map(|link| link.id).collect(),
            is_terminating: self.is_terminating,
            exception_reported: self.exception_reported,
            need_remove: self.need_remove,
            lock_state: self.main.lock_state,
            label: self.main.label.clone(),
            specified_flag: self.main.specified_flag.clone(),
            foreground_interactive: self.main.foreground_interactive,
            exit_split_on_background: self.main.exit_split_on_background,
            pointer_area: self.pointer_area,
            floating_ball: self.floating_ball.state,
            property: self.property.clone(),
        }
    }
}

impl QueueOwner for SessionInner {
    fn after_job(&mut self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_replace(snapshot);
    }

    fn on_queue_closed(&mut self) {
        debug!(session_id = %self.id, state = %self.state, "session worker stopped");
    }
}
