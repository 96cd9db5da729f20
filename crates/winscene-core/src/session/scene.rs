//! Lifecycle operations shared by every window category.
//!
//! Transitions that touch the render surface are split in two jobs: the
//! admission job validates and returns the result to the caller, then queues
//! an apply job on the same session. Anything submitted after the admission
//! therefore observes the applied state.

use tracing::{debug, error, info, warn};

use super::{ConnectParams, ConnectReply, ExceptionInfo, Session, SessionInner, TerminateInfo};
use crate::category::WindowCategory;
use crate::collaborators::IdentityToken;
use crate::error::{SessionError, SessionResult};
use crate::input::{Dispatch, KeyEvent, PointDown, PointerEvent};
use crate::notify::SessionEvent;
use crate::property::{WindowAnimation, WindowProperty, WindowType};
use crate::queue::Step;
use crate::rect::{Rect, SizeChangeReason};
use crate::state::{SessionState, WindowState};

impl SessionInner {
    // ── Connect ──────────────────────────────────────────────────────

    /// Adopt the client's property; the window type stays the one the
    /// session was created with.
    fn adopt_property(&mut self, mut property: WindowProperty) {
        if property.window_type != self.property.window_type {
            warn!(
                session_id = %self.id,
                requested = ?property.window_type,
                kept = ?self.property.window_type,
                "window type is fixed at creation"
            );
            property.window_type = self.property.window_type;
        }
        self.property = property;
        let rect = self.property.rect;
        if !rect.is_empty() {
            let clamped = self.rect_check(rect.width, rect.height);
            self.property.rect = clamped;
        }
    }

    fn connect(&mut self, params: ConnectParams) -> SessionResult<ConnectReply> {
        let stage = params.stage.ok_or(SessionError::NullArgument("session stage"))?;
        let channel = params.channel.ok_or(SessionError::NullArgument("event channel"))?;
        let property = params
            .property
            .ok_or(SessionError::NullArgument("window property"))?;
        self.ensure_not_ended()?;
        if !self.state.accepts_connect() {
            return Err(SessionError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        self.stage = Some(stage);
        self.channel = Some(channel);
        self.surface_node = params.surface_node;
        self.token = params.token;
        self.calling_pid = params.pid;
        self.calling_uid = params.uid;
        self.adopt_property(property);
        self.exception_reported = false;
        self.need_remove = false;
        self.is_terminating = false;
        self.transition(SessionState::Connect)?;
        info!(
            session_id = %self.id,
            pid = self.calling_pid,
            uid = self.calling_uid,
            "session connected"
        );
        Ok(ConnectReply {
            session_id: self.id,
            limits: self.config.limits.clone(),
            is_pc_window: self.config.device.is_pc_window,
        })
    }

    /// Re-bind a surviving session to a restarted client and restore the
    /// visibility it reported, all in one job.
    fn reconnect(&mut self, params: ConnectParams) -> SessionResult<()> {
        self.ensure_not_ended()?;
        let stage = params.stage.ok_or(SessionError::NullArgument("session stage"))?;
        let channel = params.channel.ok_or(SessionError::NullArgument("event channel"))?;
        let property = params
            .property
            .ok_or(SessionError::NullArgument("window property"))?;
        if let Some(token) = &params.token {
            if self.token.as_ref() != Some(token) {
                warn!(session_id = %self.id, "reconnect with foreign identity token");
                return Err(SessionError::IdentityMismatch);
            }
        }
        if property.window_state == WindowState::Destroyed {
            return Err(SessionError::InvalidParam(
                "cannot reconnect a destroyed window".to_string(),
            ));
        }
        if self.teardown_started {
            return Err(SessionError::InvalidSession(self.id.0));
        }

        let window_state = property.window_state;
        let aspect_ratio = property.aspect_ratio;
        self.stage = Some(stage);
        self.channel = Some(channel);
        if params.surface_node.is_some() {
            self.surface_node = params.surface_node;
        }
        if params.token.is_some() {
            self.token = params.token;
        }
        self.calling_pid = params.pid;
        self.calling_uid = params.uid;
        self.adopt_property(property);
        self.exception_reported = false;
        self.is_terminating = false;
        if self.state.accepts_connect() {
            self.transition(SessionState::Connect)?;
        }

        match window_state {
            WindowState::Shown => {
                self.show_now()?;
                self.restore_active(true);
                if self.property.window_type == WindowType::InputMethodFloat {
                    self.transition(SessionState::Active)?;
                }
            }
            WindowState::Hidden => {
                self.restore_active(false);
                if self.state == SessionState::Connect {
                    self.transition(SessionState::Background)?;
                } else if self.state.is_visible() {
                    self.hide_now(false);
                }
            }
            _ => {}
        }
        if self.category == WindowCategory::Main {
            self.restore_aspect_ratio(aspect_ratio);
        }
        info!(session_id = %self.id, state = %self.state, ?window_state, "session reconnected");
        Ok(())
    }

    /// Bring the active flag in line with what the restarted client
    /// reported, informing the stage and bound dialogs.
    fn restore_active(&mut self, active: bool) {
        if self.is_active == active {
            return;
        }
        if let Some(stage) = &self.stage {
            stage.set_active(active);
        }
        self.apply_active(active);
    }

    // ── Foreground / background ──────────────────────────────────────

    pub(crate) fn foreground(
        &mut self,
        property: Option<WindowProperty>,
        with_animation: bool,
    ) -> SessionResult<()> {
        let property = property.ok_or(SessionError::NullArgument("window property"))?;
        self.ensure_not_ended()?;
        if matches!(
            self.state,
            SessionState::Initial | SessionState::Created | SessionState::Disconnect
        ) {
            return Err(SessionError::InvalidState {
                operation: "foreground",
                state: self.state,
            });
        }

        let mut view = self.property.clone();
        view.window_state = property.window_state;
        if !(self.rules.eligible_for_foreground)(&view) {
            debug!(session_id = %self.id, window_state = ?view.window_state, "foreground declined by category");
            return Ok(());
        }
        if property.animation_flag == WindowAnimation::Custom {
            self.property.animation_flag = WindowAnimation::Custom;
        }
        debug!(session_id = %self.id, with_animation, "foreground admitted");
        self.post_self(Box::new(|inner: &mut SessionInner| {
            inner.apply_foreground();
            Step::Done
        }));
        Ok(())
    }

    fn apply_foreground(&mut self) {
        if !self.state.is_valid() {
            debug!(session_id = %self.id, state = %self.state, "foreground superseded");
            return;
        }
        if self.state.is_visible() {
            return;
        }
        if let Err(err) = self.show_now() {
            error!(session_id = %self.id, error = %err, "foreground apply failed");
            self.fire(SessionEvent::ApplyFailed {
                operation: "foreground",
                error: err,
            });
        }
    }

    /// Attach the surface and move to FOREGROUND.
    fn show_now(&mut self) -> SessionResult<()> {
        if self.state.is_visible() {
            return self.attach_surface();
        }
        self.attach_surface()?;
        self.transition(SessionState::Foreground)?;
        if let Some(stage) = &self.stage {
            stage.notify_session_foreground();
        }
        self.fire(SessionEvent::Foreground);
        Ok(())
    }

    pub(crate) fn background(&mut self, from_client: bool) -> SessionResult<()> {
        self.ensure_not_ended()?;
        match self.state {
            SessionState::Background => {
                debug!(session_id = %self.id, "already in background");
                Ok(())
            }
            SessionState::Foreground | SessionState::Active | SessionState::Inactive => {
                self.post_self(Box::new(move |inner: &mut SessionInner| {
                    inner.apply_background(from_client);
                    Step::Done
                }));
                Ok(())
            }
            state => Err(SessionError::InvalidState {
                operation: "background",
                state,
            }),
        }
    }

    fn apply_background(&mut self, from_client: bool) {
        if !self.state.is_visible() {
            debug!(session_id = %self.id, state = %self.state, "background superseded");
            return;
        }
        self.hide_now(from_client);
    }

    /// Deactivate, move to BACKGROUND and schedule the surface release.
    fn hide_now(&mut self, from_client: bool) {
        if self.is_active {
            if let Some(stage) = &self.stage {
                stage.set_active(false);
            }
            self.apply_active(false);
        }
        if self.transition(SessionState::Background).is_err() {
            return;
        }
        if let Some(stage) = &self.stage {
            stage.notify_session_background();
        }
        self.fire(SessionEvent::Background { from_client });
        if self.category == WindowCategory::Main && self.main.exit_split_on_background {
            debug!(session_id = %self.id, "leaving split mode on background");
        }
        if !(self.rules.keeps_snapshot)(&self.config) {
            self.post_self(Box::new(|inner: &mut SessionInner| {
                if !inner.state.is_visible() {
                    inner.release_surface();
                }
                Step::Done
            }));
        }
    }

    fn notify_first_frame(&mut self) -> SessionResult<()> {
        self.ensure_not_ended()?;
        if self.state == SessionState::Foreground && self.config.lifecycle.auto_activate_on_first_frame
        {
            self.set_active(true)?;
        }
        Ok(())
    }

    // ── Disconnect / teardown ────────────────────────────────────────

    fn disconnect(&mut self, from_client: bool, token: Option<IdentityToken>) -> SessionResult<()> {
        if from_client {
            self.check_token(token.as_ref())?;
        }
        if self.state.is_terminal() || self.teardown_started {
            debug!(session_id = %self.id, state = %self.state, "disconnect already handled");
            return Ok(());
        }
        self.teardown_started = true;
        if self.state.is_visible() {
            if let Some(stage) = &self.stage {
                stage.notify_session_background();
            }
            self.fire(SessionEvent::Background { from_client });
        }
        self.release_surface();
        if self.is_active {
            self.apply_active(false);
        }
        if self.state.can_transition_to(SessionState::Disconnect) {
            self.transition(SessionState::Disconnect)?;
        }
        self.update_camera_status(false);
        info!(session_id = %self.id, from_client, "session disconnecting");
        self.post_self(Box::new(|inner: &mut SessionInner| inner.begin_teardown()));
        Ok(())
    }

    /// Force-end every bound dialog, wait for them, then end this session.
    pub(crate) fn begin_teardown(&mut self) -> Step<SessionInner> {
        if self.state.is_terminal() {
            return Step::Done;
        }
        self.teardown_started = true;
        self.release_surface();
        if self.is_active {
            self.apply_active(false);
        }
        let waits: Vec<_> = self
            .dialog_sessions()
            .into_iter()
            .filter_map(|dialog| {
                dialog
                    .queue()
                    .post_with_signal(|child: &mut SessionInner| child.begin_teardown())
                    .ok()
            })
            .collect();
        debug!(session_id = %self.id, dialogs = waits.len(), "tearing down session");
        Step::AwaitThen {
            waits,
            then: Box::new(|inner: &mut SessionInner| {
                inner.finish_teardown();
                Step::Done
            }),
        }
    }

    fn finish_teardown(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.transition(SessionState::End).is_err() {
            return;
        }
        self.is_terminating = false;
        self.is_focused = false;
        let parent = {
            let mut links = self.write_links();
            links.dialogs.clear();
            links.parent.take()
        };
        if let Some(parent) = parent.and_then(|link| link.handle.upgrade()) {
            let id = self.id;
            let _ = parent.queue().post(Box::new(move |owner: &mut SessionInner| {
                owner.unbind_dialog(id);
                Step::Done
            }));
        }
        self.stage = None;
        self.channel = None;
        self.surface_node = None;
        if let Some(registry) = self.registry() {
            registry.remove(self.id);
        }
        info!(session_id = %self.id, "session ended");
    }

    // ── Exceptions ───────────────────────────────────────────────────

    fn notify_session_exception(&mut self, info: ExceptionInfo) -> SessionResult<()> {
        self.check_token(info.token.as_ref())?;
        if self.exception_reported {
            debug!(session_id = %self.id, "exception already reported");
            return Ok(());
        }
        self.exception_reported = true;
        self.need_remove |= info.need_remove_session;
        warn!(
            session_id = %self.id,
            error_code = info.error_code,
            reason = %info.reason,
            need_remove = info.need_remove_session,
            "client reported exception"
        );
        self.fire(SessionEvent::Exception(info));
        Ok(())
    }

    fn terminate_session(&mut self, info: TerminateInfo) -> SessionResult<()> {
        self.ensure_not_ended()?;
        self.check_token(info.token.as_ref())?;
        if self.is_terminating {
            debug!(session_id = %self.id, "terminate already in progress");
            return Ok(());
        }
        self.is_terminating = true;
        info!(session_id = %self.id, reason = %info.reason, "session terminating");
        self.fire(SessionEvent::Terminate(info));
        Ok(())
    }

    /// Release client resources but keep the session for a later reconnect.
    fn suspend_for_recovery(&mut self) -> SessionResult<()> {
        self.ensure_not_ended()?;
        if !self.state.is_valid() {
            return Err(SessionError::InvalidState {
                operation: "suspend_for_recovery",
                state: self.state,
            });
        }
        self.release_surface();
        if self.is_active {
            self.apply_active(false);
        }
        self.transition(SessionState::Disconnect)?;
        info!(session_id = %self.id, "session suspended for recovery");
        Ok(())
    }

    // ── Input ────────────────────────────────────────────────────────

    fn transfer_key_event(&mut self, event: Option<KeyEvent>) -> SessionResult<Dispatch> {
        self.ensure_valid()?;
        let event = event.ok_or(SessionError::NullArgument("key event"))?;
        let allowed = match self.category {
            WindowCategory::Main => self.main_key_gate()?,
            WindowCategory::Sub => true,
            _ => self.overlay_key_gate(&event)?,
        };
        if !allowed {
            debug!(session_id = %self.id, key = ?event.key_code, "key event suppressed");
            return Ok(Dispatch::Suppressed);
        }
        let channel = self
            .channel
            .as_ref()
            .ok_or(SessionError::NullArgument("event channel"))?;
        channel.transfer_key_event(&event)?;
        Ok(Dispatch::Delivered)
    }

    pub(crate) fn check_pointer_event_dispatch(&self, event: &PointerEvent) -> bool {
        (self.rules.pointer_dispatch)(self.state, event.action)
    }

    fn transfer_pointer_event(&mut self, event: Option<PointerEvent>) -> SessionResult<Dispatch> {
        self.ensure_valid()?;
        let event = event.ok_or(SessionError::NullArgument("pointer event"))?;
        if !self.check_pointer_event_dispatch(&event) {
            debug!(session_id = %self.id, action = ?event.action, state = %self.state, "pointer event suppressed");
            return Ok(Dispatch::Suppressed);
        }
        let channel = self
            .channel
            .as_ref()
            .ok_or(SessionError::NullArgument("event channel"))?;
        channel.transfer_pointer_event(&event)?;
        Ok(Dispatch::Delivered)
    }

    fn process_point_down(&mut self, x: i32, y: i32) -> SessionResult<PointDown> {
        self.ensure_valid()?;
        match self.category {
            WindowCategory::Main => Ok(self.main_point_down(x, y)),
            WindowCategory::Sub => Ok(self.present_focus_on_point_down()),
            _ => Ok(self.overlay_point_down()),
        }
    }

    pub(crate) fn present_focus_on_point_down(&mut self) -> PointDown {
        if self.property.focusable {
            self.update_focus(true);
        }
        PointDown::Handled
    }
}

impl Session {
    /// Bind client collaborators and move to CONNECT.
    pub async fn connect(&self, params: ConnectParams) -> SessionResult<ConnectReply> {
        self.queue().call(move |inner| inner.connect(params)).await
    }

    /// Re-bind a surviving session to a restarted client.
    pub async fn reconnect(&self, params: ConnectParams) -> SessionResult<()> {
        self.queue().call(move |inner| inner.reconnect(params)).await
    }

    /// Request FOREGROUND. Returns once admitted; the surface attach and the
    /// transition follow on the session's queue.
    pub async fn foreground(
        &self,
        property: Option<WindowProperty>,
        with_animation: bool,
    ) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.foreground(property, with_animation))
            .await
    }

    /// Request BACKGROUND.
    pub async fn background(&self, is_from_innerkits: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.background(is_from_innerkits))
            .await
    }

    /// Start teardown. Client-originated requests must present the token
    /// stored at connect.
    pub async fn disconnect(
        &self,
        is_from_client: bool,
        token: Option<IdentityToken>,
    ) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.disconnect(is_from_client, token))
            .await
    }

    pub async fn notify_session_exception(&self, info: ExceptionInfo) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.notify_session_exception(info))
            .await
    }

    pub async fn terminate_session(&self, info: TerminateInfo) -> SessionResult<()> {
        self.queue()
            .call(move |inner| inner.terminate_session(info))
            .await
    }

    pub async fn suspend_for_recovery(&self) -> SessionResult<()> {
        self.queue().call(SessionInner::suspend_for_recovery).await
    }

    /// The client drew its first frame.
    pub async fn notify_first_frame(&self) -> SessionResult<()> {
        self.queue().call(SessionInner::notify_first_frame).await
    }

    pub async fn set_active(&self, active: bool) -> SessionResult<()> {
        self.queue().call(move |inner| inner.set_active(active)).await
    }

    /// Change the active flag without a state transition.
    pub async fn update_active_status(&self, active: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| {
                inner.update_active_status(active);
                Ok(())
            })
            .await
    }

    pub async fn update_focus(&self, focused: bool) -> SessionResult<()> {
        self.queue()
            .call(move |inner| {
                inner.update_focus(focused);
                Ok(())
            })
            .await
    }

    /// Apply a rect, returning what was actually applied.
    pub async fn update_rect(&self, rect: Rect, reason: SizeChangeReason) -> SessionResult<Rect> {
        self.queue()
            .call(move |inner| inner.update_rect(rect, reason))
            .await
    }

    /// Clamp a requested size without applying it.
    pub async fn rect_check(&self, width: u32, height: u32) -> SessionResult<Rect> {
        self.queue()
            .call(move |inner| Ok(inner.rect_check(width, height)))
            .await
    }

    pub async fn transfer_key_event(&self, event: Option<KeyEvent>) -> SessionResult<Dispatch> {
        self.queue()
            .call(move |inner| inner.transfer_key_event(event))
            .await
    }

    pub async fn transfer_pointer_event(
        &self,
        event: Option<PointerEvent>,
    ) -> SessionResult<Dispatch> {
        self.queue()
            .call(move |inner| inner.transfer_pointer_event(event))
            .await
    }

    pub async fn check_pointer_event_dispatch(&self, event: PointerEvent) -> SessionResult<bool> {
        self.queue()
            .call(move |inner| Ok(inner.check_pointer_event_dispatch(&event)))
            .await
    }

    pub async fn process_point_down(&self, x: i32, y: i32) -> SessionResult<PointDown> {
        self.queue()
            .call(move |inner| inner.process_point_down(x, y))
            .await
    }
}
